use crate::error::{HistixError, Result};
use crate::index::types::SearchField;

/// A parsed query: clauses combined with implicit AND
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub clauses: Vec<Clause>,
}

/// One query clause, optionally restricted to a field
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    /// `None` means the clause matches against all free-text fields
    pub field: Option<SearchField>,
    pub kind: ClauseKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClauseKind {
    /// A single term, e.g. `foo` or `path:main.rs`
    Term(String),
    /// A quoted phrase, e.g. `"fn main"`; matched against consecutive
    /// token positions
    Phrase(String),
}

/// Parse the query grammar: whitespace-separated clauses, each either a
/// bare term, a quoted phrase, or a `field:value` pair where the value may
/// itself be quoted.
///
/// Fails with [`HistixError::InvalidQuery`] on an unknown field qualifier,
/// an unterminated phrase, or a qualifier with no value. An empty or
/// all-whitespace input parses to a query with no clauses.
pub fn parse_query(input: &str) -> Result<Query> {
    let chars: Vec<char> = input.chars().collect();
    let mut clauses = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }

        if chars[i] == '"' {
            let (phrase, next) = read_quoted(&chars, i)?;
            clauses.push(Clause {
                field: None,
                kind: ClauseKind::Phrase(phrase),
            });
            i = next;
            continue;
        }

        // Bare word, possibly a field qualifier
        let start = i;
        while i < chars.len() && !chars[i].is_whitespace() && chars[i] != ':' && chars[i] != '"' {
            i += 1;
        }
        let word: String = chars[start..i].iter().collect();

        if i < chars.len() && chars[i] == ':' {
            let field = SearchField::from_name(&word).ok_or_else(|| {
                HistixError::InvalidQuery(format!("unknown field '{word}'"))
            })?;
            i += 1;

            if i < chars.len() && chars[i] == '"' {
                let (phrase, next) = read_quoted(&chars, i)?;
                clauses.push(Clause {
                    field: Some(field),
                    kind: ClauseKind::Phrase(phrase),
                });
                i = next;
            } else {
                let start = i;
                while i < chars.len() && !chars[i].is_whitespace() {
                    i += 1;
                }
                let value: String = chars[start..i].iter().collect();
                if value.is_empty() {
                    return Err(HistixError::InvalidQuery(format!(
                        "missing value after '{word}:'"
                    )));
                }
                clauses.push(Clause {
                    field: Some(field),
                    kind: ClauseKind::Term(value),
                });
            }
        } else if !word.is_empty() {
            clauses.push(Clause {
                field: None,
                kind: ClauseKind::Term(word),
            });
        }
    }

    Ok(Query { clauses })
}

/// Read a quoted phrase starting at the opening quote.
/// Returns the phrase content and the index past the closing quote.
fn read_quoted(chars: &[char], open: usize) -> Result<(String, usize)> {
    let mut i = open + 1;
    let start = i;
    while i < chars.len() && chars[i] != '"' {
        i += 1;
    }
    if i >= chars.len() {
        return Err(HistixError::InvalidQuery("unterminated phrase".to_string()));
    }
    Ok((chars[start..i].iter().collect(), i + 1))
}
