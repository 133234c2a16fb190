//! Message storage: raw payload sources and the assembled-message cache.

pub mod cache;
pub mod source;
