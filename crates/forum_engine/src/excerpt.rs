use forum_logging::bounded;

const TRUNCATED_MARKER: &str = "…[truncated]";
pub const DEFAULT_EXCERPT_LEN: usize = 500;

/// Bounded, char-boundary safe prefix of `text` for errors and logs.
pub fn excerpt(text: &str, max_bytes: usize) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= max_bytes {
        return trimmed.to_string();
    }
    format!("{}{TRUNCATED_MARKER}", bounded(trimmed, max_bytes))
}

/// Like [`excerpt`], but `None` for blank input.
pub(crate) fn non_empty_excerpt(text: &str, max_bytes: usize) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(excerpt(text, max_bytes))
    }
}
