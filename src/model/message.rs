//! The assembled, display-ready message record.

use super::address::Address;

/// A message after MIME parsing, body selection, sanitizing and
/// plain-text derivation. Built once per assembly and never mutated.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AssembledMessage {
    /// Opaque identifier used to fetch the message.
    pub id: String,

    /// Decoded subject (encoded-words resolved, line breaks unfolded).
    pub subject: String,

    /// Parsed `From:` addresses, in header order.
    pub from: Vec<Address>,

    /// Parsed `To:` addresses, in header order.
    pub to: Vec<Address>,

    /// RFC 3339 UTC timestamp with millisecond precision.
    pub date: String,

    /// Sanitized HTML, safe to inject into a rendering surface.
    pub html: String,

    /// Plain-text rendering of `html`.
    pub plain: String,

    /// Short preview of `plain` (at most 100 characters plus an ellipsis).
    pub snippet: String,
}

impl AssembledMessage {
    /// First sender formatted for display, or an empty string.
    pub fn sender(&self) -> String {
        self.from.first().map(Address::display).unwrap_or_default()
    }
}
