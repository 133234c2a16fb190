//! Core data model types: MIME trees, addresses, and assembled messages.

pub mod address;
pub mod message;
pub mod mime;
