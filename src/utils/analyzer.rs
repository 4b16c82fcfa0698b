use std::fmt::Debug;

/// Turns text into a normalized sequence of terms.
///
/// The same analyzer instance is used when indexing document content and
/// when parsing query terms, so a term is produced identically regardless
/// of which path it comes from. Implementations must be cheap to call and
/// thread-safe: content analysis runs on rayon workers.
pub trait Analyzer: Send + Sync + Debug {
    fn analyze(&self, text: &str) -> Vec<String>;
}

/// Default analyzer: split on non-alphanumeric boundaries, lowercase,
/// drop empty tokens. No stemming, no stop words.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardAnalyzer;

impl Analyzer for StandardAnalyzer {
    fn analyze(&self, text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_and_lowercase() {
        let analyzer = StandardAnalyzer;
        assert_eq!(
            analyzer.analyze("Hello_World 123"),
            vec!["hello", "world", "123"]
        );
    }

    #[test]
    fn test_symmetry_between_index_and_query() {
        // A query for "hello" must match a document containing "Hello_World"
        let analyzer = StandardAnalyzer;
        let indexed = analyzer.analyze("Hello_World");
        let queried = analyzer.analyze("hello");
        assert!(indexed.contains(&queried[0]));
    }

    #[test]
    fn test_drops_empty_tokens() {
        let analyzer = StandardAnalyzer;
        assert_eq!(analyzer.analyze("  ,,  --  "), Vec::<String>::new());
        assert_eq!(analyzer.analyze(""), Vec::<String>::new());
    }

    #[test]
    fn test_path_tokens() {
        let analyzer = StandardAnalyzer;
        assert_eq!(analyzer.analyze("src/main.rs"), vec!["src", "main", "rs"]);
    }

    #[test]
    fn test_keeps_single_char_and_digits() {
        let analyzer = StandardAnalyzer;
        assert_eq!(analyzer.analyze("a.txt"), vec!["a", "txt"]);
    }
}
