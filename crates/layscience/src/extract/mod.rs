//! Text extraction from fetched documents.

use async_trait::async_trait;

use crate::error::ExtractError;

pub mod pdf;

pub use pdf::PdfTextExtractor;

/// Plain text of a document plus the title its own metadata declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub title: Option<String>,
}

impl ExtractedText {
    pub fn untitled(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            title: None,
        }
    }
}

/// Turns document bytes into plain text of at most `max_chars` characters.
///
/// Overlong text is truncated, never rejected.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8], max_chars: usize)
        -> Result<ExtractedText, ExtractError>;
}

/// Collapses runs of spaces and tabs, keeps single line breaks between
/// non-empty lines, and trims the result.
pub fn normalize_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Returns the longest prefix of `text` with at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Number of non-whitespace characters, used to reject near-empty documents.
pub fn meaningful_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_shorter_than_budget() {
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 3), "abc");
    }

    #[test]
    fn test_truncate_chars_respects_code_points() {
        let text = "ñandú über ça";
        let cut = truncate_chars(text, 5);
        assert_eq!(cut, "ñandú");
        assert_eq!(truncate_chars(text, 0), "");
    }

    #[test]
    fn test_normalize_whitespace() {
        let raw = "  Title\t\tline \n\n\n  body   text  \r\n   \nend";
        assert_eq!(normalize_whitespace(raw), "Title line\nbody text\nend");
    }

    #[test]
    fn test_meaningful_chars() {
        assert_eq!(meaningful_chars(" a b\n c "), 3);
        assert_eq!(meaningful_chars("   \n\t"), 0);
    }
}
