//! Conversation title derivation.

/// Title of a conversation that has no messages yet.
pub const DEFAULT_TITLE: &str = "New conversation";

/// Maximum number of characters kept from the first message.
pub const TITLE_MAX_CHARS: usize = 30;

/// Appended when the first message was shortened.
pub const TRUNCATION_MARKER: &str = "...";

/// Derive a title from the first user message.
///
/// Keeps the first [`TITLE_MAX_CHARS`] characters of the trimmed text and
/// appends [`TRUNCATION_MARKER`] if anything was cut. Blank input yields
/// [`DEFAULT_TITLE`].
#[must_use]
pub fn derive_title(first_message: &str) -> String {
    let text = first_message.trim();
    if text.is_empty() {
        return DEFAULT_TITLE.to_string();
    }

    match text.char_indices().nth(TITLE_MAX_CHARS) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text.to_string(),
    }
}
