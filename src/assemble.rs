//! Message assembly: raw payload in, display-ready [`AssembledMessage`] out.
//!
//! Stages, in order:
//! 1. fetch the raw record from a [`MessageSource`]
//! 2. base64url-decode it to RFC 5322 text
//! 3. build the MIME tree
//! 4. decode `Subject`, parse `From`/`To`, normalize `Date`
//! 5. select the body part and extract its content
//! 6. sanitize (plain bodies are escaped and wrapped in `<pre>` first)
//! 7. derive plain text, then the snippet
//!
//! Any failure aborts the whole assembly for that id.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::error::{MailError, Result};
use crate::model::address::parse_addresses;
use crate::model::message::AssembledMessage;
use crate::parser::header::{decode_subject, parse_date};
use crate::parser::mime::{build_tree, TreeMode};
use crate::parser::select::{decode_content, select_best_part, TEXT_HTML};
use crate::parser::transport::decode_raw_payload;
use crate::render::plain::{html_to_plain_width, DEFAULT_PLAIN_WIDTH};
use crate::render::sanitize::{ImageProxy, Sanitizer};
use crate::render::snippet::make_snippet;
use crate::store::cache::MessageCache;
use crate::store::source::MessageSource;

/// Subject used when the header is missing.
pub const NO_SUBJECT: &str = "No subject";

/// Default number of concurrent assemblies in a batch.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 8;

/// What to do with a `Date` header that cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePolicy {
    /// Log a warning and use the Unix epoch.
    #[default]
    Epoch,
    /// Fail assembly with [`MailError::InvalidDate`].
    Strict,
}

/// Tunables for the synchronous assembly stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembleOptions {
    pub tree_mode: TreeMode,
    pub date_policy: DatePolicy,
    pub plain_text_width: usize,
    pub image_proxy: Option<ImageProxy>,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            tree_mode: TreeMode::Canonical,
            date_policy: DatePolicy::Epoch,
            plain_text_width: DEFAULT_PLAIN_WIDTH,
            image_proxy: None,
        }
    }
}

/// Assemble RFC 5322 text that has already been transport-decoded.
///
/// This is the CPU-bound part of assembly; it performs no I/O.
pub fn assemble_raw(id: &str, rfc5322: &str, options: &AssembleOptions) -> Result<AssembledMessage> {
    let root = build_tree(rfc5322, options.tree_mode)?;

    let subject = decode_subject(root.headers.get("Subject").unwrap_or(NO_SUBJECT));
    let from = parse_addresses(root.headers.get("From").unwrap_or_default());
    let to = parse_addresses(root.headers.get("To").unwrap_or_default());
    let date = normalize_date(root.headers.get("Date").unwrap_or_default(), options.date_policy)?;

    let part = select_best_part(&root);
    let content = part.map(decode_content).unwrap_or_default();
    let is_html = part.is_some_and(|p| p.is_type(TEXT_HTML));
    debug!(
        id,
        part = part.map(|p| p.mime_type.as_str()).unwrap_or("none"),
        bytes = content.len(),
        "Selected body part"
    );

    let markup = if is_html {
        content
    } else {
        format!("<pre>{}</pre>", escape_html(&content))
    };
    let html = Sanitizer::new(options.image_proxy.clone()).clean(&markup);
    let plain = html_to_plain_width(&html, options.plain_text_width);
    let snippet = make_snippet(&plain);

    Ok(AssembledMessage {
        id: id.to_string(),
        subject,
        from,
        to,
        date,
        html,
        plain,
        snippet,
    })
}

/// RFC 3339 UTC with milliseconds, e.g. `2024-01-04T10:00:00.000Z`.
fn normalize_date(raw: &str, policy: DatePolicy) -> Result<String> {
    let parsed = match (parse_date(raw), policy) {
        (Some(dt), _) => dt,
        (None, DatePolicy::Strict) => return Err(MailError::InvalidDate(raw.to_string())),
        (None, DatePolicy::Epoch) => {
            warn!(date = raw, "Could not parse date, using Unix epoch");
            DateTime::<Utc>::UNIX_EPOCH
        }
    };
    Ok(parsed.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Escape text so it renders literally inside `<pre>`.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Fetches raw payloads from a source and assembles them.
///
/// Holds no per-message state: concurrent calls for different ids are
/// independent.
pub struct Assembler<S> {
    source: S,
    options: AssembleOptions,
    batch_concurrency: usize,
}

impl<S: MessageSource> Assembler<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            options: AssembleOptions::default(),
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }

    pub fn with_options(mut self, options: AssembleOptions) -> Self {
        self.options = options;
        self
    }

    /// Zero is treated as one.
    pub fn with_batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = concurrency.max(1);
        self
    }

    pub fn options(&self) -> &AssembleOptions {
        &self.options
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Assemble one message by id.
    pub async fn assemble(&self, id: &str) -> Result<AssembledMessage> {
        let record = self.source.fetch_raw(id).await?;
        let raw = record
            .raw
            .filter(|r| !r.is_empty())
            .ok_or_else(|| MailError::MissingRawPayload { id: id.to_string() })?;

        let rfc5322 = decode_raw_payload(id, &raw)?;
        debug!(id, bytes = rfc5322.len(), "Decoded raw payload");

        assemble_raw(id, &rfc5322, &self.options)
    }

    /// Assemble several messages concurrently.
    ///
    /// Results come back in input order, one per id; a failure for one id
    /// never affects the others.
    pub async fn assemble_batch(&self, ids: &[String]) -> Vec<(String, Result<AssembledMessage>)> {
        debug!(count = ids.len(), concurrency = self.batch_concurrency, "Assembling batch");
        stream::iter(ids)
            .map(|id| async move { (id.clone(), self.assemble(id).await) })
            .buffered(self.batch_concurrency)
            .collect()
            .await
    }
}

/// An [`Assembler`] fronted by a [`MessageCache`].
pub struct CachedAssembler<S> {
    assembler: Assembler<S>,
    cache: Arc<MessageCache>,
}

impl<S: MessageSource> CachedAssembler<S> {
    pub fn new(assembler: Assembler<S>, cache: Arc<MessageCache>) -> Self {
        Self { assembler, cache }
    }

    /// Cached record for `id`, assembling and caching it on a miss.
    /// Failures are not cached.
    pub async fn get(&self, id: &str) -> Result<AssembledMessage> {
        if let Some(hit) = self.cache.get(id) {
            debug!(id, "Cache hit");
            return Ok(hit);
        }
        let message = self.assembler.assemble(id).await?;
        self.cache.insert(message.clone());
        Ok(message)
    }

    pub fn invalidate(&self, id: &str) -> bool {
        self.cache.invalidate(id)
    }

    pub fn cache(&self) -> &Arc<MessageCache> {
        &self.cache
    }

    pub fn assembler(&self) -> &Assembler<S> {
        &self.assembler
    }
}
