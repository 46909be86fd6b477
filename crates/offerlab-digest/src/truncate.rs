//! Char-boundary truncation
use std::borrow::Cow;

/// Appended to every cut value
pub const TRUNCATION_MARKER: &str = " […]";

const MARKER_CHARS: usize = 4;

/// Cut `text` so that the result, marker included, is at most `max_chars`
/// characters. Never splits a multibyte character.
pub fn truncate_chars(text: &str, max_chars: usize) -> Cow<'_, str> {
    if text.chars().count() <= max_chars {
        return Cow::Borrowed(text);
    }
    if max_chars <= MARKER_CHARS {
        return Cow::Owned(text.chars().take(max_chars).collect());
    }
    let keep = max_chars - MARKER_CHARS;
    let cut = text
        .char_indices()
        .nth(keep)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    let mut out = text[..cut].trim_end().to_string();
    out.push_str(TRUNCATION_MARKER);
    Cow::Owned(out)
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
