/// Classification outcome for one file's bytes at one commit.
#[derive(Debug)]
pub enum ContentKind<'a> {
    /// Valid text in the assumed repository encoding (UTF-8).
    Text(&'a str),
    /// Undecodable bytes; excluded from indexing entirely.
    Binary,
}

impl ContentKind<'_> {
    pub fn is_binary(&self) -> bool {
        matches!(self, ContentKind::Binary)
    }
}

/// Decide whether raw bytes are indexable text or binary.
///
/// The rule is a strict UTF-8 decode: any decoding failure classifies the
/// content as binary. Runs once per file-at-commit, before tokenization.
pub fn classify(bytes: &[u8]) -> ContentKind<'_> {
    match std::str::from_utf8(bytes) {
        Ok(text) => ContentKind::Text(text),
        Err(_) => ContentKind::Binary,
    }
}
