//! `mailprism` turns raw RFC 5322 messages into display-ready records.
//!
//! A raw payload is transport-decoded, parsed into a MIME tree, and reduced
//! to one [`model::message::AssembledMessage`]: decoded headers, sanitized
//! HTML, a plain-text rendering and a short snippet.

pub mod assemble;
pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod render;
pub mod store;
