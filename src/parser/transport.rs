//! Transport decoding of raw payloads handed over by a message source.
//!
//! Sources deliver the RFC 5322 text as base64url (`-` and `_` instead of
//! `+` and `/`). Padding is optional on input.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use crate::error::{MailError, Result};

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);

/// base64url, padding optional.
pub const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Standard base64, padding optional. Used for `B` encoded-words.
pub const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// Decode a base64url payload into UTF-8 text.
///
/// Whitespace is ignored. Invalid UTF-8 sequences are replaced rather than
/// rejected.
pub fn decode_raw_payload(id: &str, payload: &str) -> Result<String> {
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = URL_SAFE_LENIENT
        .decode(compact.as_bytes())
        .map_err(|e| MailError::TransportEncoding {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Encode RFC 5322 text the way message sources deliver it.
pub fn encode_raw_payload(rfc5322: &str) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(rfc5322.as_bytes())
}
