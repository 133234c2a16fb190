//! Message sources: where raw payloads come from.
//!
//! A source answers `fetch_raw(id)` with a [`RawRecord`] whose `raw` field
//! holds the base64url-encoded RFC 5322 text. Failures are reported as
//! [`MailError::Fetch`] with the underlying error left untouched.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{MailError, Result};
use crate::parser::transport::encode_raw_payload;

/// A fetched message record. `raw` is absent when the store has no payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub raw: Option<String>,
}

impl RawRecord {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: Some(raw.into()),
        }
    }

    /// Record for RFC 5322 text, transport-encoded the way stores deliver it.
    pub fn from_rfc5322(text: &str) -> Self {
        Self::new(encode_raw_payload(text))
    }
}

/// Anything that can hand out raw message payloads by id.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Fetch the record for `id` in raw format.
    async fn fetch_raw(&self, id: &str) -> Result<RawRecord>;
}

#[async_trait]
impl<T: MessageSource + ?Sized> MessageSource for std::sync::Arc<T> {
    async fn fetch_raw(&self, id: &str) -> Result<RawRecord> {
        (**self).fetch_raw(id).await
    }
}

/// In-memory source keyed by id.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: HashMap<String, RawRecord>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, record: RawRecord) {
        self.records.insert(id.into(), record);
    }

    /// Store RFC 5322 text under `id`, base64url-encoding it first.
    pub fn insert_rfc5322(&mut self, id: impl Into<String>, text: &str) {
        self.insert(id, RawRecord::from_rfc5322(text));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn fetch_raw(&self, id: &str) -> Result<RawRecord> {
        self.records
            .get(id)
            .cloned()
            .ok_or_else(|| MailError::fetch(id, format!("no message with id '{id}'")))
    }
}

/// HTTP source: `GET {base_url}?id=<id>&format=raw`, JSON body `{"raw": "..."}`.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl MessageSource for HttpSource {
    async fn fetch_raw(&self, id: &str) -> Result<RawRecord> {
        debug!(id, url = %self.base_url, "Fetching raw message");
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("id", id), ("format", "raw")])
            .send()
            .await
            .map_err(|e| MailError::fetch(id, e))?
            .error_for_status()
            .map_err(|e| MailError::fetch(id, e))?;

        response
            .json::<RawRecord>()
            .await
            .map_err(|e| MailError::fetch(id, e))
    }
}
