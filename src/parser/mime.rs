//! MIME tree construction from a raw RFC 5322 message.
//!
//! Two shapes are supported:
//! - **canonical**: the root carries the top-level headers and at most two
//!   leaves, the first HTML alternative followed by the first plain-text
//!   alternative.
//! - **structural**: the real part hierarchy (nested multiparts,
//!   attachments, embedded `message/rfc822`), each part with its own headers.

use mail_parser::{Message, MessagePartId, MessageParser, PartType};
use tracing::{debug, warn};

use crate::error::{MailError, Result};
use crate::model::mime::{HeaderMap, MimeNode};
use crate::parser::header::{decode_header_bytes, media_type, parse_header_block};

/// Root media type used when the message declares none.
pub const DEFAULT_ROOT_TYPE: &str = "multipart/alternative";

/// Maximum nesting depth for the structural walk (adversarial input guard).
const MAX_DEPTH: usize = 10;

/// Which tree shape to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeMode {
    #[default]
    Canonical,
    Structural,
}

/// Build a tree of the requested shape.
pub fn build_tree(raw: &str, mode: TreeMode) -> Result<MimeNode> {
    match mode {
        TreeMode::Canonical => build_mime_tree(raw),
        TreeMode::Structural => build_structural_tree(raw),
    }
}

/// Build the canonical two-alternative tree.
///
/// Fails with [`MailError::MalformedMessage`] when the input has no header
/// section or cannot be parsed at all. Nothing is returned on failure.
pub fn build_mime_tree(raw: &str) -> Result<MimeNode> {
    let (headers, msg) = parse(raw)?;

    let mime_type = headers
        .get("Content-Type")
        .and_then(media_type)
        .unwrap_or_else(|| DEFAULT_ROOT_TYPE.to_string());

    let mut parts = Vec::with_capacity(2);
    if let Some(html) = first_alternative(&msg, &msg.html_body, true) {
        parts.push(MimeNode::leaf("text/html", Some(html)));
    }
    if let Some(text) = first_alternative(&msg, &msg.text_body, false) {
        parts.push(MimeNode::leaf("text/plain", Some(text)));
    }

    debug!(mime_type = %mime_type, leaves = parts.len(), "Built canonical MIME tree");
    Ok(MimeNode {
        mime_type,
        headers,
        content: None,
        parts,
    })
}

/// Build a tree mirroring the message's real part structure.
pub fn build_structural_tree(raw: &str) -> Result<MimeNode> {
    let (headers, msg) = parse(raw)?;
    let root = structural_node(&msg, 0, Some(headers), 0);
    debug!(nodes = root.node_count(), "Built structural MIME tree");
    Ok(root)
}

/// Parse the header section and the MIME structure.
fn parse(raw: &str) -> Result<(HeaderMap, Message<'_>)> {
    let raw = skip_from_line(raw);

    let headers = parse_header_block(raw);
    if headers.is_empty() {
        return Err(MailError::MalformedMessage(
            "no header fields found".to_string(),
        ));
    }

    let msg = MessageParser::default()
        .parse(raw.as_bytes())
        .ok_or_else(|| MailError::MalformedMessage("MIME structure not parseable".to_string()))?;

    Ok((headers, msg))
}

/// Content of the first part in `ids` whose body is of the wanted kind.
fn first_alternative(msg: &Message<'_>, ids: &[MessagePartId], html: bool) -> Option<String> {
    ids.iter()
        .filter_map(|id| msg.parts.get(*id as usize))
        .find_map(|part| match (&part.body, html) {
            (PartType::Html(s), true) | (PartType::Text(s), false) => Some(s.to_string()),
            _ => None,
        })
}

fn structural_node(
    msg: &Message<'_>,
    id: usize,
    known_headers: Option<HeaderMap>,
    depth: usize,
) -> MimeNode {
    let Some(part) = msg.parts.get(id) else {
        return MimeNode::leaf("application/octet-stream", None);
    };

    let headers = known_headers.unwrap_or_else(|| {
        msg.raw_message
            .get(part.offset_header as usize..part.offset_body as usize)
            .map(|bytes| parse_header_block(&decode_header_bytes(bytes)))
            .unwrap_or_default()
    });

    let mime_type = headers
        .get("Content-Type")
        .and_then(media_type)
        .unwrap_or_else(|| implied_type(&part.body).to_string());

    let (content, parts) = match &part.body {
        PartType::Text(text) | PartType::Html(text) => (Some(text.to_string()), Vec::new()),
        PartType::Binary(_) | PartType::InlineBinary(_) => (None, Vec::new()),
        _ if depth >= MAX_DEPTH => {
            warn!(depth, mime_type = %mime_type, "MIME nesting too deep, not descending");
            (None, Vec::new())
        }
        PartType::Message(nested) => (None, vec![structural_node(nested, 0, None, depth + 1)]),
        PartType::Multipart(ids) => (
            None,
            ids.iter()
                .map(|child| structural_node(msg, *child as usize, None, depth + 1))
                .collect(),
        ),
    };

    MimeNode {
        mime_type,
        headers,
        content,
        parts,
    }
}

/// Media type implied by a body when no `Content-Type` is declared.
fn implied_type(body: &PartType<'_>) -> &'static str {
    match body {
        PartType::Text(_) => "text/plain",
        PartType::Html(_) => "text/html",
        PartType::Message(_) => "message/rfc822",
        PartType::Multipart(_) => "multipart/mixed",
        PartType::Binary(_) | PartType::InlineBinary(_) => "application/octet-stream",
    }
}

/// Skip an MBOX `From ` separator line (and a UTF-8 BOM) at the start.
fn skip_from_line(data: &str) -> &str {
    let data = data.strip_prefix('\u{feff}').unwrap_or(data);
    if data.starts_with("From ") {
        if let Some(pos) = data.find('\n') {
            return &data[pos + 1..];
        }
    }
    data
}
