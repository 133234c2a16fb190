//! Integration tests for message assembly, sources and tree building.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use mailprism::assemble::{assemble_raw, AssembleOptions, Assembler, CachedAssembler, DatePolicy};
use mailprism::error::MailError;
use mailprism::model::address::Address;
use mailprism::parser::mime::{build_tree, TreeMode};
use mailprism::parser::select::select_best_part;
use mailprism::render::plain::html_to_plain;
use mailprism::render::sanitize::ImageProxy;
use mailprism::render::snippet::make_snippet;
use mailprism::store::cache::MessageCache;
use mailprism::store::source::{HttpSource, MemorySource, MessageSource, RawRecord};

fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(&path).unwrap()
}

const FIXTURES: [&str; 4] = ["alternative.eml", "plain.eml", "mixed.eml", "bad_date.eml"];

fn memory_source() -> MemorySource {
    let mut source = MemorySource::new();
    for name in FIXTURES {
        source.insert_rfc5322(name.trim_end_matches(".eml"), &fixture(name));
    }
    source
}

// ─── Headers ─────────────────────────────────────────────────────────

#[test]
fn test_alternative_headers() {
    let msg = assemble_raw("a1", &fixture("alternative.eml"), &AssembleOptions::default()).unwrap();
    assert_eq!(msg.id, "a1");
    assert_eq!(msg.subject, "Quarterly report — draft");
    assert_eq!(msg.from, vec![Address::new("Jane Doe", "jane@example.com")]);
    assert_eq!(
        msg.to,
        vec![
            Address::new("Bob", "bob@example.org"),
            Address::new("", "carol@example.net"),
        ]
    );
    assert_eq!(msg.date, "2024-03-12T14:30:00.000Z");
}

#[test]
fn test_encoded_display_name_and_subject() {
    let msg = assemble_raw("m", &fixture("mixed.eml"), &AssembleOptions::default()).unwrap();
    assert_eq!(msg.subject, "Hello");
    assert_eq!(msg.from[0].name, "José García");
    assert_eq!(msg.from[0].email, "jose@example.es");
    assert_eq!(msg.to, vec![Address::new("Team", "team@example.com")]);
}

// ─── Body selection and sanitizing ──────────────────────────────────

#[test]
fn test_html_alternative_is_sanitized() {
    let msg = assemble_raw("a", &fixture("alternative.eml"), &AssembleOptions::default()).unwrap();
    assert!(!msg.html.contains("<script"), "{}", msg.html);
    assert!(!msg.html.contains("alert"), "{}", msg.html);
    assert!(!msg.html.contains("javascript:"), "{}", msg.html);
    assert!(!msg.html.contains("onerror"), "{}", msg.html);
    assert!(msg.html.contains("href=\"https://example.com/report\""), "{}", msg.html);
    assert!(msg.html.contains("<b>Bob</b>"), "{}", msg.html);
}

#[test]
fn test_plain_renders_link_text_only() {
    let msg = assemble_raw("a", &fixture("alternative.eml"), &AssembleOptions::default()).unwrap();
    assert!(msg.plain.contains("Hi Bob,"), "{}", msg.plain);
    assert!(msg.plain.contains("See the report for details."), "{}", msg.plain);
    assert!(!msg.plain.contains("https://example.com/report"), "{}", msg.plain);
    assert!(msg.snippet.starts_with("Hi Bob, The draft is attached."), "{}", msg.snippet);
}

#[test]
fn test_plain_only_message() {
    let msg = assemble_raw("p", &fixture("plain.eml"), &AssembleOptions::default()).unwrap();
    assert!(msg.html.starts_with("<pre>"), "{}", msg.html);
    assert!(msg.html.contains("&gt; Previous alert"), "{}", msg.html);
    assert!(msg.plain.contains("Disk /dev/sda1 is at 91% capacity."), "{}", msg.plain);
    assert!(msg.snippet.starts_with("Previous alert: 85% Disk"), "{}", msg.snippet);
    assert!(!msg.snippet.contains("monitoring bot"), "{}", msg.snippet);
    assert_eq!(msg.date, "2024-05-01T21:15:42.000Z");
}

#[test]
fn test_nested_html_preferred_over_plain() {
    for mode in [TreeMode::Canonical, TreeMode::Structural] {
        let options = AssembleOptions {
            tree_mode: mode,
            ..AssembleOptions::default()
        };
        let msg = assemble_raw("m", &fixture("mixed.eml"), &options).unwrap();
        assert!(msg.html.contains("<i>invoice</i>"), "{mode:?}: {}", msg.html);
        assert!(msg.plain.contains("HTML version of the invoice note."), "{mode:?}");
        assert!(!msg.plain.contains("Plain version"), "{mode:?}");
    }
}

#[test]
fn test_image_proxy_rewrites_remote_images() {
    let options = AssembleOptions {
        image_proxy: Some(ImageProxy::new("https://img.example.com/proxy")),
        ..AssembleOptions::default()
    };
    let msg = assemble_raw("a", &fixture("alternative.eml"), &options).unwrap();
    assert!(
        msg.html
            .contains("https://img.example.com/proxy?url=https%3A%2F%2Fexample.com%2Fpixel.png&amp;_="),
        "{}",
        msg.html
    );
}

// ─── Derived fields stay consistent ─────────────────────────────────

#[test]
fn test_plain_and_snippet_derive_from_html() {
    for name in FIXTURES {
        let msg = assemble_raw(name, &fixture(name), &AssembleOptions::default()).unwrap();
        assert_eq!(msg.plain, html_to_plain(&msg.html), "{name}");
        assert_eq!(msg.snippet, make_snippet(&msg.plain), "{name}");
        assert!(msg.snippet.chars().count() <= 101, "{name}");
    }
}

// ─── Dates ──────────────────────────────────────────────────────────

#[test]
fn test_bad_date_policies() {
    let raw = fixture("bad_date.eml");
    let msg = assemble_raw("d", &raw, &AssembleOptions::default()).unwrap();
    assert_eq!(msg.date, "1970-01-01T00:00:00.000Z");
    assert_eq!(msg.snippet, "Soon.");

    let strict = AssembleOptions {
        date_policy: DatePolicy::Strict,
        ..AssembleOptions::default()
    };
    assert!(matches!(
        assemble_raw("d", &raw, &strict),
        Err(MailError::InvalidDate(_))
    ));
}

#[test]
fn test_crlf_message_with_named_zone_date() {
    let raw = fixture("plain.eml")
        .replace("+0200", "CEST")
        .replace('\n', "\r\n");
    let strict = AssembleOptions {
        date_policy: DatePolicy::Strict,
        ..AssembleOptions::default()
    };
    let msg = assemble_raw("crlf", &raw, &strict).unwrap();
    assert_eq!(msg.date, "2024-05-01T21:15:42.000Z");
    assert_eq!(msg.subject, "Disk usage at 91%");
    assert!(msg.snippet.starts_with("Previous alert: 85% Disk"), "{}", msg.snippet);
    assert!(!msg.snippet.contains("monitoring bot"), "{}", msg.snippet);
}

#[test]
fn test_snippet_of_crlf_text() {
    let text = "> Previous alert\r\nDisk full\r\n--\r\nmonitoring bot\r\n";
    assert_eq!(make_snippet(text), "Previous alert Disk full");
}

// ─── Trees ──────────────────────────────────────────────────────────

#[test]
fn test_canonical_tree_shape() {
    let root = build_tree(&fixture("mixed.eml"), TreeMode::Canonical).unwrap();
    assert_eq!(root.mime_type, "multipart/mixed");
    let types: Vec<&str> = root.parts.iter().map(|p| p.mime_type.as_str()).collect();
    assert_eq!(types, ["text/html", "text/plain"]);
    assert!(root.parts.iter().all(|p| p.parts.is_empty()));
}

#[test]
fn test_structural_tree_shape() {
    let root = build_tree(&fixture("mixed.eml"), TreeMode::Structural).unwrap();
    assert_eq!(root.mime_type, "multipart/mixed");
    assert_eq!(root.parts.len(), 2);

    let alternative = &root.parts[0];
    assert_eq!(alternative.mime_type, "multipart/alternative");
    let types: Vec<&str> = alternative.parts.iter().map(|p| p.mime_type.as_str()).collect();
    assert_eq!(types, ["text/plain", "text/html"]);

    let pdf = &root.parts[1];
    assert_eq!(pdf.mime_type, "application/pdf");
    assert!(pdf.content.is_none());
    assert!(pdf.headers.get("content-disposition").is_some());

    let best = select_best_part(&root).unwrap();
    assert_eq!(best.mime_type, "text/html");
}

#[test]
fn test_malformed_input_rejected() {
    for raw in ["", "no headers at all, just prose"] {
        assert!(
            matches!(
                build_tree(raw, TreeMode::Canonical),
                Err(MailError::MalformedMessage(_))
            ),
            "{raw:?}"
        );
    }
}

// ─── Sources, batches and caching ───────────────────────────────────

#[tokio::test]
async fn test_assemble_from_memory_source() {
    let assembler = Assembler::new(memory_source());
    let msg = assembler.assemble("alternative").await.unwrap();
    assert_eq!(msg.id, "alternative");
    assert_eq!(msg.subject, "Quarterly report — draft");
}

#[tokio::test]
async fn test_batch_keeps_order_and_isolates_failures() {
    let mut source = memory_source();
    source.insert("bad-transport", RawRecord::new("Pz8+"));
    source.insert("no-raw", RawRecord::default());
    let assembler = Assembler::new(source).with_batch_concurrency(2);

    let ids: Vec<String> = ["plain", "ghost", "bad-transport", "mixed", "no-raw"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let results = assembler.assemble_batch(&ids).await;

    let got: Vec<&str> = results.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(got, ["plain", "ghost", "bad-transport", "mixed", "no-raw"]);

    assert!(results[0].1.is_ok());
    assert!(matches!(results[1].1, Err(MailError::Fetch { .. })));
    assert!(matches!(results[2].1, Err(MailError::TransportEncoding { .. })));
    assert_eq!(results[3].1.as_ref().unwrap().subject, "Hello");
    assert!(matches!(results[4].1, Err(MailError::MissingRawPayload { .. })));
}

#[tokio::test]
async fn test_shared_cache_across_assemblers() {
    let cache = Arc::new(MessageCache::new(4));
    let source = Arc::new(memory_source());
    let first = CachedAssembler::new(Assembler::new(Arc::clone(&source)), Arc::clone(&cache));
    let second = CachedAssembler::new(Assembler::new(source), Arc::clone(&cache));

    let a = first.get("plain").await.unwrap();
    assert_eq!(cache.len(), 1);
    let b = second.get("plain").await.unwrap();
    assert_eq!(a, b);
    assert_eq!(cache.len(), 1);
}

/// Serve one canned JSON response and hand back the request line.
async fn serve_once(body: String) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 4096];
        let n = socket.read(&mut buf).await.unwrap();
        let request = String::from_utf8_lossy(&buf[..n]).into_owned();
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request.lines().next().unwrap_or_default().to_string()
    });
    (format!("http://{addr}/messages"), handle)
}

#[tokio::test]
async fn test_http_source_fetches_raw_record() {
    let record = RawRecord::from_rfc5322(&fixture("bad_date.eml"));
    let body = serde_json::to_string(&record).unwrap();
    let (url, server) = serve_once(body).await;

    let source = HttpSource::new(url, Duration::from_secs(5)).unwrap();
    let fetched = source.fetch_raw("m-42").await.unwrap();
    assert_eq!(fetched, record);

    let request_line = server.await.unwrap();
    assert!(request_line.starts_with("GET /messages?"), "{request_line}");
    assert!(request_line.contains("id=m-42"), "{request_line}");
    assert!(request_line.contains("format=raw"), "{request_line}");
}

#[tokio::test]
async fn test_http_source_missing_raw_field() {
    let (url, server) = serve_once(r#"{"id":"x"}"#.to_string()).await;
    let assembler = Assembler::new(HttpSource::new(url, Duration::from_secs(5)).unwrap());
    assert!(matches!(
        assembler.assemble("x").await,
        Err(MailError::MissingRawPayload { .. })
    ));
    server.await.unwrap();
}
