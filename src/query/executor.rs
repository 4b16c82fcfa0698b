use crate::error::Result;
use crate::index::reader::IndexReader;
use crate::index::types::{DocId, FieldKind, SearchField, SearchHit};
use crate::query::parser::{parse_query, Clause, ClauseKind};
use crate::query::scorer::TfIdfScorer;
use crate::utils::Analyzer;
use roaring::RoaringBitmap;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Results of one search: ranked hits plus the total match count before
/// the limit was applied
#[derive(Debug)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub total_matches: u64,
}

impl SearchResults {
    fn empty() -> Self {
        Self {
            hits: Vec::new(),
            total_matches: 0,
        }
    }
}

/// Executes parsed queries against one reader snapshot.
///
/// Clauses combine with implicit AND via bitmap intersection; matching
/// documents are ranked by summed TF-IDF contributions, ties broken by
/// insertion order (ascending doc id).
pub struct QueryExecutor<'a> {
    reader: &'a IndexReader,
    analyzer: &'a dyn Analyzer,
    scorer: TfIdfScorer,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(reader: &'a IndexReader, analyzer: &'a dyn Analyzer) -> Self {
        let scorer = TfIdfScorer::new(reader.doc_count());
        Self {
            reader,
            analyzer,
            scorer,
        }
    }

    /// Parse and run a query, returning at most `limit` hits.
    /// An empty query or a limit of zero yields no results.
    pub fn search(&self, query_str: &str, limit: usize) -> Result<SearchResults> {
        let query = parse_query(query_str)?;

        let mut candidates: Option<RoaringBitmap> = None;
        let mut scores: HashMap<DocId, f32> = HashMap::new();

        for clause in &query.clauses {
            // Clauses whose value analyzes to nothing constrain nothing
            let Some(matches) = self.eval_clause(clause) else {
                continue;
            };

            let bitmap: RoaringBitmap = matches.keys().copied().collect();
            let narrowed = match candidates.take() {
                None => bitmap,
                Some(existing) => existing & bitmap,
            };
            if narrowed.is_empty() {
                return Ok(SearchResults::empty());
            }
            candidates = Some(narrowed);

            for (doc_id, score) in matches {
                *scores.entry(doc_id).or_insert(0.0) += score;
            }
        }

        let Some(candidates) = candidates else {
            return Ok(SearchResults::empty());
        };

        let mut ranked: Vec<(DocId, f32)> = candidates
            .iter()
            .map(|doc_id| (doc_id, scores.get(&doc_id).copied().unwrap_or(0.0)))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(limit);

        let hits = ranked
            .into_iter()
            .filter_map(|(doc_id, score)| {
                let stored = self.reader.document(doc_id)?;
                Some(SearchHit {
                    doc_id,
                    repository: stored.doc.repository.clone(),
                    path: stored.doc.path.clone(),
                    commit_id: stored.doc.commit_id.clone(),
                    commit_author: stored.doc.commit_author.clone(),
                    commit_date: stored.doc.commit_date.clone(),
                    score,
                })
            })
            .collect();

        Ok(SearchResults {
            hits,
            total_matches: candidates.len(),
        })
    }

    /// Evaluate one clause to its matching documents and score
    /// contributions. `None` means the clause dissolved under analysis
    /// (e.g. a value with no alphanumeric characters).
    fn eval_clause(&self, clause: &Clause) -> Option<HashMap<DocId, f32>> {
        match clause.field {
            Some(field) => self.eval_fielded(field, &clause.kind),
            None => {
                // Bare clauses match any free-text field (OR)
                let mut merged: Option<HashMap<DocId, f32>> = None;
                for field in SearchField::FREE_TEXT {
                    if let Some(matches) = self.eval_fielded(field, &clause.kind) {
                        let merged = merged.get_or_insert_with(HashMap::new);
                        for (doc_id, score) in matches {
                            *merged.entry(doc_id).or_insert(0.0) += score;
                        }
                    }
                }
                merged
            }
        }
    }

    fn eval_fielded(&self, field: SearchField, kind: &ClauseKind) -> Option<HashMap<DocId, f32>> {
        match kind {
            ClauseKind::Phrase(text) => {
                let terms = self.analyzer.analyze(text);
                match terms.len() {
                    0 => None,
                    1 => Some(self.term_matches(field, &terms[0])),
                    _ => Some(self.phrase_matches(field, &terms)),
                }
            }
            ClauseKind::Term(value) => match field.kind() {
                FieldKind::ExactMatch if field != SearchField::Path => {
                    Some(self.term_matches(field, &value.to_lowercase()))
                }
                _ => self.text_term_matches(field, value),
            },
        }
    }

    /// A term against a tokenized field: the exact normalized form wins
    /// when present (full paths), otherwise the analyzed form is used and
    /// multi-token values degrade to a phrase (`path:src/main.rs`).
    fn text_term_matches(&self, field: SearchField, value: &str) -> Option<HashMap<DocId, f32>> {
        if field == SearchField::Path {
            let exact = value.to_lowercase();
            let matches = self.term_matches(field, &exact);
            if !matches.is_empty() {
                return Some(matches);
            }
        }

        let terms = self.analyzer.analyze(value);
        match terms.len() {
            0 => None,
            1 => Some(self.term_matches(field, &terms[0])),
            _ => Some(self.phrase_matches(field, &terms)),
        }
    }

    /// Postings for one term, scored
    fn term_matches(&self, field: SearchField, term: &str) -> HashMap<DocId, f32> {
        let doc_freq = self.reader.doc_freq(field, term);
        self.reader
            .postings(field, term)
            .into_iter()
            .map(|p| (p.doc_id, self.scorer.score(p.term_freq, doc_freq)))
            .collect()
    }

    /// Documents where the terms appear at consecutive positions.
    /// Scored by phrase occurrence count against the rarest term's
    /// document frequency.
    fn phrase_matches(&self, field: SearchField, terms: &[String]) -> HashMap<DocId, f32> {
        let mut result = HashMap::new();

        let postings: Vec<_> = terms
            .iter()
            .map(|t| self.reader.postings(field, t))
            .collect();
        if postings.iter().any(|p| p.is_empty()) {
            return result;
        }

        let min_doc_freq = terms
            .iter()
            .map(|t| self.reader.doc_freq(field, t))
            .min()
            .unwrap_or(0);

        // Position lookup for every term after the first
        let rest: Vec<HashMap<DocId, &Vec<u32>>> = postings[1..]
            .iter()
            .map(|ps| ps.iter().map(|p| (p.doc_id, &p.positions)).collect())
            .collect();

        'docs: for first in &postings[0] {
            let mut chains: Vec<&Vec<u32>> = Vec::with_capacity(terms.len() - 1);
            for lookup in &rest {
                match lookup.get(&first.doc_id) {
                    Some(positions) => chains.push(positions),
                    None => continue 'docs,
                }
            }

            let occurrences = first
                .positions
                .iter()
                .filter(|&&start| {
                    chains
                        .iter()
                        .enumerate()
                        .all(|(k, positions)| {
                            positions.binary_search(&(start + k as u32 + 1)).is_ok()
                        })
                })
                .count() as u32;

            if occurrences > 0 {
                result.insert(first.doc_id, self.scorer.score(occurrences, min_doc_freq));
            }
        }

        result
    }
}
