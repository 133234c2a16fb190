//! Display rendering: HTML sanitizing, plain-text conversion, and snippets.

pub mod plain;
pub mod sanitize;
pub mod snippet;
