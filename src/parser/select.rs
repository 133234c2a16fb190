//! Body part selection and content extraction.

use std::collections::VecDeque;

use crate::model::mime::MimeNode;

pub const TEXT_HTML: &str = "text/html";
pub const TEXT_PLAIN: &str = "text/plain";

/// Pick the part to display.
///
/// Breadth-first over the tree, children in order. The first `text/html`
/// leaf wins immediately; otherwise the first `text/plain` leaf seen is
/// returned. Containers (nodes with parts) are only descended into, never
/// returned.
pub fn select_best_part(root: &MimeNode) -> Option<&MimeNode> {
    let mut queue: VecDeque<&MimeNode> = VecDeque::from([root]);
    let mut plain: Option<&MimeNode> = None;

    while let Some(node) = queue.pop_front() {
        if node.has_parts() {
            queue.extend(node.parts.iter());
            continue;
        }
        if node.is_type(TEXT_HTML) {
            return Some(node);
        }
        if plain.is_none() && node.is_type(TEXT_PLAIN) {
            plain = Some(node);
        }
    }

    plain
}

/// Textual content of a part, or an empty string when it has none.
///
/// Transfer encodings are already resolved by the tree builder, so this is
/// the single place where absent content turns into `""`.
pub fn decode_content(part: &MimeNode) -> String {
    part.content.clone().unwrap_or_default()
}
