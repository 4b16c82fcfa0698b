/// TF-IDF scorer over one index snapshot.
///
/// Scores are comparable within a single search only; they are not
/// normalized across indexes or generations.
pub struct TfIdfScorer {
    total_docs: u32,
}

impl TfIdfScorer {
    pub fn new(total_docs: u32) -> Self {
        Self { total_docs }
    }

    /// Score one term occurrence: sublinear term frequency times inverse
    /// document frequency. Rarer terms rank higher, repeated occurrences
    /// help with diminishing returns.
    pub fn score(&self, term_freq: u32, doc_freq: u32) -> f32 {
        if term_freq == 0 || doc_freq == 0 {
            return 0.0;
        }
        let tf = 1.0 + (term_freq as f32).log2();
        let idf = (1.0 + self.total_docs as f32 / doc_freq as f32).ln();
        tf * idf
    }
}
