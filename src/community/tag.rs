//! Hashtag handling shared by the extractor and the rollup engine.
//!
//! Matching is a plain case-insensitive substring test for `#tag`. There is
//! no word-boundary check, so `#rust` also matches `#rustlang`.

/// Strip surrounding whitespace and any leading `#` characters.
#[must_use]
pub fn normalize_tag(tag: &str) -> &str {
    tag.trim().trim_start_matches('#')
}

/// Case-folded tag used as a lookup key.
#[must_use]
pub fn tag_key(tag: &str) -> String {
    normalize_tag(tag).to_lowercase()
}

/// Lowercased `#tag` needle, ready for repeated [`text_has_tag`] checks.
#[must_use]
pub fn tag_needle(tag: &str) -> String {
    format!("#{}", tag_key(tag))
}

/// Whether `text` mentions the needle produced by [`tag_needle`]. The needle is literal text.
#[must_use]
pub fn text_has_tag(text: &str, needle: &str) -> bool {
    text.to_lowercase().contains(needle)
}
