//! HTML sanitizing before display.
//!
//! Built on `ammonia`'s allow-list cleaner: `<script>` and `<style>`
//! contents are dropped, no `on*` attribute is ever allowed, and URL
//! attributes must use one of [`ALLOWED_SCHEMES`]. `data:` URLs are only
//! kept for images (`data:image/...`). Relative URLs are removed. Inline
//! `style` values that could load script (`url()` with another scheme,
//! `expression()`, CSS escapes) are dropped whole.

use std::borrow::Cow;
use std::collections::HashSet;

use ammonia::{Builder, UrlRelative};

/// URL schemes that survive sanitizing.
pub const ALLOWED_SCHEMES: [&str; 5] = ["http", "https", "mailto", "tel", "data"];

/// Layout attributes common in email HTML, allowed on every element.
const LAYOUT_ATTRIBUTES: [&str; 12] = [
    "style",
    "class",
    "align",
    "valign",
    "bgcolor",
    "color",
    "width",
    "height",
    "border",
    "cellpadding",
    "cellspacing",
    "dir",
];

/// Legacy presentational tags still used by mail clients.
const LAYOUT_TAGS: [&str; 2] = ["font", "center"];

/// Attributes holding a URL.
const URL_ATTRIBUTES: [&str; 7] = [
    "href",
    "src",
    "cite",
    "action",
    "background",
    "longdesc",
    "poster",
];

/// Rewrites remote image URLs through an image proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageProxy {
    base: String,
}

impl ImageProxy {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    /// `{base}?url=<encoded>&_=<millis>`; the timestamp defeats caches.
    pub fn proxify(&self, src: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(src.as_bytes()).collect();
        let token = chrono::Utc::now().timestamp_millis();
        format!("{}?url={encoded}&_={token}", self.base)
    }
}

/// Configured HTML cleaner.
pub struct Sanitizer {
    builder: Builder<'static>,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Sanitizer {
    pub fn new(image_proxy: Option<ImageProxy>) -> Self {
        let mut builder = Builder::default();
        builder
            .url_schemes(HashSet::from(ALLOWED_SCHEMES))
            .url_relative(UrlRelative::Deny)
            .add_tags(LAYOUT_TAGS)
            .add_generic_attributes(LAYOUT_ATTRIBUTES)
            .attribute_filter(move |element, attribute, value| {
                if attribute == "style" {
                    return is_safe_style(value).then(|| value.into());
                }
                if !URL_ATTRIBUTES.contains(&attribute) {
                    return Some(value.into());
                }
                let normalized = normalize_url(value);
                if !is_allowed_url(&normalized) {
                    return None;
                }
                match &image_proxy {
                    Some(proxy)
                        if element == "img"
                            && attribute == "src"
                            && (normalized.starts_with("http:")
                                || normalized.starts_with("https:")) =>
                    {
                        Some(Cow::Owned(proxy.proxify(value.trim())))
                    }
                    _ => Some(value.into()),
                }
            });
        Self { builder }
    }

    pub fn clean(&self, html: &str) -> String {
        self.builder.clean(html).to_string()
    }
}

/// Sanitize HTML with the default policy (no image proxy).
pub fn sanitize(html: &str) -> String {
    Sanitizer::default().clean(html)
}

/// Scheme check on a normalized URL. Relative URLs are left to ammonia.
fn is_allowed_url(normalized: &str) -> bool {
    if normalized.starts_with("data:") {
        return normalized.starts_with("data:image/");
    }
    match normalized.split_once(':') {
        Some((scheme, _)) if !scheme.contains(['/', '?', '#']) => {
            ALLOWED_SCHEMES.contains(&scheme)
        }
        _ => true,
    }
}

/// Whether an inline `style` value is free of script-capable constructs.
///
/// Rejects CSS escapes (which can spell out any scheme), `expression(`,
/// `behavior:`, `-moz-binding`, `@import`, and any `url(...)` that is not an
/// absolute `http`/`https` URL or a `data:image/` URL.
fn is_safe_style(value: &str) -> bool {
    let normalized = normalize_url(value);
    if normalized.contains('\\')
        || normalized.contains("expression(")
        || normalized.contains("behavior:")
        || normalized.contains("-moz-binding")
        || normalized.contains("@import")
    {
        return false;
    }

    normalized.split("url(").skip(1).all(|rest| {
        let target = rest
            .split(')')
            .next()
            .unwrap_or_default()
            .trim_matches(['\'', '"']);
        target.starts_with("http:")
            || target.starts_with("https:")
            || target.starts_with("data:image/")
    })
}

/// Lowercase, with the whitespace and control characters browsers ignore removed.
fn normalize_url(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_javascript_img_src() {
        let out = sanitize(r#"<img src="javascript:alert(1)">"#);
        assert!(!out.to_lowercase().contains("javascript"), "{out}");
    }

    #[test]
    fn test_removes_script_elements() {
        let out = sanitize("<p>Hi</p><script>alert('x')</script><SCRIPT>bad()</SCRIPT>");
        assert_eq!(out, "<p>Hi</p>");
    }

    #[test]
    fn test_removes_event_handlers() {
        let out = sanitize(
            r#"<p onclick="a()" ONLOAD="b()" onpointerdown="c()">x</p><img src="https://e.com/i.png" onerror="d()">"#,
        );
        assert!(!out.to_lowercase().contains("on"), "{out}");
        assert!(out.contains(r#"src="https://e.com/i.png""#));
    }

    #[test]
    fn test_entity_encoded_scheme() {
        let out = sanitize(r#"<a href="&#106;ava&#x73;cript:alert(1)">x</a>"#);
        assert!(!out.to_lowercase().contains("script"), "{out}");
        assert!(out.contains(">x</a>"));
    }

    #[test]
    fn test_mixed_case_and_whitespace_scheme() {
        let out = sanitize("<a href=\" JaVa\tScRiPt:alert(1)\">x</a>");
        assert!(!out.to_lowercase().contains("script"), "{out}");
    }

    #[test]
    fn test_allowed_schemes_kept() {
        let out = sanitize(
            r#"<a href="https://a.com">a</a><a href="mailto:x@y.com">b</a><a href="tel:+123">c</a>"#,
        );
        assert!(out.contains(r#"href="https://a.com""#));
        assert!(out.contains(r#"href="mailto:x@y.com""#));
        assert!(out.contains(r#"href="tel:+123""#));
    }

    #[test]
    fn test_data_urls_images_only() {
        let img = sanitize(r#"<img src="data:image/png;base64,iVBORw0KGgo=">"#);
        assert!(img.contains("data:image/png"), "{img}");

        let html = sanitize(r#"<a href="data:text/html;base64,PHNjcmlwdD4=">x</a>"#);
        assert!(!html.contains("data:"), "{html}");
    }

    #[test]
    fn test_other_schemes_removed() {
        let out = sanitize(r#"<a href="ftp://files.example.com">x</a><a href="vbscript:msgbox">y</a>"#);
        assert!(!out.contains("ftp:"));
        assert!(!out.contains("vbscript"));
    }

    #[test]
    fn test_preserves_structure_and_inline_style() {
        let out = sanitize(r#"<table><tr><td style="color: red" align="center"><b>Total</b></td></tr></table>"#);
        assert!(out.contains(r#"style="color: red""#), "{out}");
        assert!(out.contains("<b>Total</b>"));
        assert!(out.contains("<table>"));
    }

    #[test]
    fn test_style_with_script_url_dropped() {
        let out = sanitize(r#"<div style="background:url(javascript:alert(1))">x</div>"#);
        assert!(!out.to_lowercase().contains("javascript"), "{out}");
        assert!(out.contains(">x</div>"), "{out}");

        let quoted = sanitize(r#"<div style="background: URL( 'JavaScript:alert(1)' )">x</div>"#);
        assert!(!quoted.to_lowercase().contains("javascript"), "{quoted}");

        let data = sanitize(r#"<p style="background:url(data:text/html;base64,PHNjcmlwdD4=)">x</p>"#);
        assert!(!data.contains("data:"), "{data}");
    }

    #[test]
    fn test_style_expression_and_escapes_dropped() {
        let expr = sanitize(r#"<p style="width: expression(alert(1))">x</p>"#);
        assert!(!expr.contains("expression"), "{expr}");

        let escaped = sanitize(r#"<p style="background:url(\6a avascript:alert(1))">x</p>"#);
        assert!(!escaped.contains("style"), "{escaped}");
    }

    #[test]
    fn test_style_with_remote_image_kept() {
        let out = sanitize(r#"<td style="background:url('https://e.com/bg.png'); color: red">x</td>"#);
        assert!(out.contains("https://e.com/bg.png"), "{out}");
        assert!(out.contains("color: red"), "{out}");
    }

    #[test]
    fn test_image_proxy_rewrites_remote_images() {
        let sanitizer = Sanitizer::new(Some(ImageProxy::new("https://proxy.test/img")));
        let out = sanitizer.clean(r#"<img src="https://cdn.example.com/a.png"><img src="data:image/gif;base64,R0lG">"#);
        assert!(out.contains("https://proxy.test/img?url=https%3A%2F%2Fcdn.example.com%2Fa.png&amp;_="), "{out}");
        assert!(out.contains("data:image/gif"));
    }
}
