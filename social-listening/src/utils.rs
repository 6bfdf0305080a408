/// Bodies Reddit leaves behind for removed content.
const DELETED_MARKERS: &[&str] = &["[deleted]", "[removed]", "deleted", "removed"];

/// Text processing utilities
pub mod text {
    use super::DELETED_MARKERS;

    /// Truncate to at most `max_chars` characters, never splitting a code point.
    pub fn snippet(text: &str, max_chars: usize) -> String {
        match text.char_indices().nth(max_chars) {
            Some((cut, _)) => text[..cut].to_string(),
            None => text.to_string(),
        }
    }

    /// True for empty text and for Reddit's deleted/removed placeholders.
    pub fn is_empty_or_deleted(text: &str) -> bool {
        let trimmed = text.trim();
        trimmed.is_empty()
            || DELETED_MARKERS
                .iter()
                .any(|marker| trimmed.eq_ignore_ascii_case(marker))
    }

    /// Collapse runs of whitespace so snippets stay on one line.
    pub fn normalize_whitespace(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::text::*;

    #[test]
    fn snippet_respects_char_boundaries() {
        assert_eq!(snippet("héllo wörld", 4), "héll");
        assert_eq!(snippet("short", 220), "short");
    }

    #[test]
    fn deleted_markers_are_detected() {
        assert!(is_empty_or_deleted("  "));
        assert!(is_empty_or_deleted("[Removed]"));
        assert!(is_empty_or_deleted("deleted"));
        assert!(!is_empty_or_deleted("I deleted my account"));
    }

    #[test]
    fn whitespace_is_collapsed() {
        assert_eq!(normalize_whitespace("a\n\n b\tc"), "a b c");
    }
}
