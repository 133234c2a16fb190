//! Email parsing: transport decoding, header decoding, MIME trees, and body selection.

pub mod header;
pub mod mime;
pub mod select;
pub mod transport;
