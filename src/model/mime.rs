//! MIME tree types: [`MimeNode`] and its ordered, case-insensitive [`HeaderMap`].

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Separator used when a header name occurs more than once.
pub const HEADER_JOIN: &str = "; ";

/// Header name → single string value.
///
/// Values are unfolded header text as it appeared in the message.
/// RFC 2047 encoded-words are left in place; they are decoded per header
/// kind when the value is consumed (see `parser::header::decode_subject`
/// and `decode_display_name`).
///
/// Lookups ignore ASCII case. Names keep the casing of their first
/// occurrence and the order in which they were first seen. Repeated
/// headers are joined with `"; "`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header value, joining it onto an existing value of the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            Some((_, existing)) => {
                existing.push_str(HEADER_JOIN);
                existing.push_str(&value);
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = HeaderMap::new();
        for (k, v) in iter {
            map.append(k, v);
        }
        map
    }
}

impl Serialize for HeaderMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// One node of a parsed message.
///
/// Multipart containers carry their children in `parts` and never hold
/// `content`. Leaves keep `content` as `None` when the part has no textual
/// payload (attachments), which is distinct from an empty text body.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MimeNode {
    /// Lowercase media type, e.g. `text/html`.
    pub mime_type: String,
    /// Unfolded, not encoded-word-decoded, header values.
    pub headers: HeaderMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<MimeNode>,
}

impl MimeNode {
    /// A leaf node with no headers.
    pub fn leaf(mime_type: &str, content: Option<String>) -> Self {
        Self {
            mime_type: mime_type.to_ascii_lowercase(),
            headers: HeaderMap::new(),
            content,
            parts: Vec::new(),
        }
    }

    /// A container node with no headers.
    pub fn container(mime_type: &str, parts: Vec<MimeNode>) -> Self {
        Self {
            mime_type: mime_type.to_ascii_lowercase(),
            headers: HeaderMap::new(),
            content: None,
            parts,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Case-insensitive media type comparison.
    pub fn is_type(&self, mime_type: &str) -> bool {
        self.mime_type.eq_ignore_ascii_case(mime_type)
    }

    pub fn has_parts(&self) -> bool {
        !self.parts.is_empty()
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.parts.iter().map(MimeNode::node_count).sum::<usize>()
    }
}
