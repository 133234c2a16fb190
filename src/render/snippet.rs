//! Short previews of a message body.

use std::sync::LazyLock;

use regex::Regex;

/// Maximum snippet length in characters, before the ellipsis.
pub const SNIPPET_MAX_CHARS: usize = 100;

const ELLIPSIS: char = '…';

static QUOTE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mR)^> ").expect("quote marker pattern is valid"));

static SIGNATURE_DELIMITER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mR)^--$").expect("signature pattern is valid"));

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Build a preview from plain text.
///
/// In order: drop `"> "` quote markers at line starts, cut at the first
/// line that is exactly `--`, collapse whitespace, then truncate to
/// [`SNIPPET_MAX_CHARS`] on a word boundary and append `…`.
pub fn make_snippet(plain: &str) -> String {
    let unquoted = QUOTE_MARKER.replace_all(plain, "");
    let body = match SIGNATURE_DELIMITER.find(&unquoted) {
        Some(m) => &unquoted[..m.start()],
        None => &unquoted[..],
    };
    let collapsed = WHITESPACE_RUN.replace_all(body, " ");
    truncate_on_word(collapsed.trim())
}

fn truncate_on_word(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= SNIPPET_MAX_CHARS {
        return text.to_string();
    }

    let cut = chars[..=SNIPPET_MAX_CHARS]
        .iter()
        .rposition(|&c| c == ' ')
        .filter(|&idx| idx > 0)
        .unwrap_or(SNIPPET_MAX_CHARS);

    let mut snippet: String = chars[..cut].iter().collect();
    snippet.push(ELLIPSIS);
    snippet
}
