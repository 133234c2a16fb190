//! HTML to plain-text conversion.

use html2text::render::TrivialDecorator;
use tracing::warn;

/// Line width handed to the renderer. Large enough that paragraphs are
/// not re-wrapped.
pub const DEFAULT_PLAIN_WIDTH: usize = 4096;

/// Convert sanitized HTML to plain text.
///
/// Links are rendered as their visible text only; block elements become
/// line breaks; lines are not wrapped.
pub fn html_to_plain(html: &str) -> String {
    html_to_plain_width(html, DEFAULT_PLAIN_WIDTH)
}

/// Same as [`html_to_plain`] with an explicit maximum line width.
pub fn html_to_plain_width(html: &str, width: usize) -> String {
    match html2text::config::with_decorator(TrivialDecorator::new())
        .string_from_read(html.as_bytes(), width)
    {
        Ok(text) => tidy(&text),
        Err(e) => {
            warn!(error = %e, "html2text failed, falling back to tag stripping");
            strip_tags(html)
        }
    }
}

/// Drop trailing spaces on each line and surrounding blank lines.
fn tidy(text: &str) -> String {
    text.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}

/// Minimal reduction used when the renderer rejects its input.
///
/// - Preserves line breaks from `<br>`, `<p>`, `<div>` and friends
/// - Strips all remaining tags
/// - Decodes common HTML entities
fn strip_tags(html: &str) -> String {
    let mut text = html.to_string();

    for tag in ["br", "br/", "br /"] {
        text = text.replace(&format!("<{tag}>"), "\n");
    }
    for tag in ["p", "div", "tr", "li", "pre", "h1", "h2", "h3", "h4", "h5", "h6"] {
        text = text.replace(&format!("<{tag}>"), "\n");
        text = text.replace(&format!("<{tag} "), "\n<");
        text = text.replace(&format!("</{tag}>"), "\n");
    }

    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }

    result = result
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&amp;", "&");

    tidy(&result)
}
