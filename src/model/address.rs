//! Email address parsing (RFC 5322 §3.4).

use tracing::debug;

use crate::parser::header::decode_display_name;

/// A parsed mailbox.
///
/// # Examples
/// - `"Jane Doe <jane@x.com>"` → `name = "Jane Doe"`, `email = "jane@x.com"`
/// - `"<bob@y.com>"` → `name = ""`, `email = "bob@y.com"`
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Address {
    /// Human-readable display name (may be empty).
    pub name: String,
    /// The bare address (`local-part@domain`).
    pub email: String,
}

impl Address {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Format for display: `"Name <email>"` or just `"email"`.
    pub fn display(&self) -> String {
        if self.name.is_empty() {
            self.email.clone()
        } else {
            format!("{} <{}>", self.name, self.email)
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Why an address header could not be parsed. Never leaves this module.
#[derive(Debug)]
enum AddressParseFailure {
    Unbalanced(char),
    NotAnAddress(String),
}

impl std::fmt::Display for AddressParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unbalanced(c) => write!(f, "unbalanced '{c}'"),
            Self::NotAnAddress(s) => write!(f, "not an address: '{s}'"),
        }
    }
}

/// Parse an address header value (`From`, `To`, ...) into mailboxes.
///
/// Handles quoted display names containing commas, RFC 2047 encoded
/// names, `(comment)` names and group syntax (`team: a@b.com, c@d.com;`).
/// A malformed header yields an empty list.
pub fn parse_addresses(header: &str) -> Vec<Address> {
    match try_parse_list(header) {
        Ok(list) => list,
        Err(e) => {
            debug!(header, error = %e, "Unparseable address header");
            Vec::new()
        }
    }
}

fn try_parse_list(raw: &str) -> Result<Vec<Address>, AddressParseFailure> {
    let mut results = Vec::new();
    let mut current = String::new();
    let mut comment = String::new();
    let mut in_quotes = false;
    let mut in_angle = false;
    let mut comment_depth = 0usize;
    let mut escaped = false;

    for ch in raw.chars() {
        if escaped {
            if comment_depth > 0 {
                comment.push(ch);
            } else {
                current.push(ch);
            }
            escaped = false;
            continue;
        }
        if comment_depth > 0 {
            match ch {
                '\\' => escaped = true,
                '(' => {
                    comment_depth += 1;
                    comment.push(ch);
                }
                ')' => {
                    comment_depth -= 1;
                    if comment_depth > 0 {
                        comment.push(ch);
                    }
                }
                _ => comment.push(ch),
            }
            continue;
        }
        match ch {
            '\\' if in_quotes => {
                escaped = true;
                current.push(ch);
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '(' if !in_quotes => comment_depth += 1,
            '<' if !in_quotes => {
                in_angle = true;
                current.push(ch);
            }
            '>' if !in_quotes => {
                in_angle = false;
                current.push(ch);
            }
            // Group display name: drop it, keep the members.
            ':' if !in_quotes && !in_angle => {
                current.clear();
                comment.clear();
            }
            ',' | ';' if !in_quotes && !in_angle => {
                if let Some(addr) = parse_mailbox(&current, &comment)? {
                    results.push(addr);
                }
                current.clear();
                comment.clear();
            }
            _ => current.push(ch),
        }
    }

    if in_quotes {
        return Err(AddressParseFailure::Unbalanced('"'));
    }
    if in_angle {
        return Err(AddressParseFailure::Unbalanced('<'));
    }
    if comment_depth > 0 {
        return Err(AddressParseFailure::Unbalanced('('));
    }

    if let Some(addr) = parse_mailbox(&current, &comment)? {
        results.push(addr);
    }
    Ok(results)
}

/// Parse a single mailbox. Empty segments (`a@b.com,,c@d.com`) are skipped.
fn parse_mailbox(raw: &str, comment: &str) -> Result<Option<Address>, AddressParseFailure> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let (name_part, email) = match (trimmed.rfind('<'), trimmed.rfind('>')) {
        (Some(start), Some(end)) if end > start => {
            (&trimmed[..start], trimmed[start + 1..end].trim().to_string())
        }
        _ => ("", trimmed.to_string()),
    };

    // Null reverse-path `<>`
    if email.is_empty() && name_part.trim().is_empty() {
        return Ok(None);
    }

    if !is_addr_spec(&email) {
        return Err(AddressParseFailure::NotAnAddress(trimmed.to_string()));
    }

    let mut name = unquote(name_part);
    if name.is_empty() {
        name = comment.trim().to_string();
    }

    Ok(Some(Address {
        name: decode_display_name(&name),
        email,
    }))
}

/// `local@domain` with no whitespace and non-empty halves.
fn is_addr_spec(s: &str) -> bool {
    match s.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !s.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Strip surrounding double-quotes, resolve backslash escapes and trim.
fn unquote(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        let inner = &trimmed[1..trimmed.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else {
                out.push(c);
            }
        }
        out.trim().to_string()
    } else {
        trimmed.to_string()
    }
}
