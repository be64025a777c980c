//! Opaque pagination cursors
//!
//! A cursor reversibly encodes the curated store's resume key (the last
//! record id of the previous page). Callers treat it as an opaque token;
//! `decode_cursor(encode_cursor(k)) == k` for any resume key `k`.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{Result, SnapflowError};

/// Encode a resume key as an opaque cursor token.
pub fn encode_cursor(resume_key: &str) -> String {
    STANDARD.encode(resume_key.as_bytes())
}

/// Decode a cursor token back into the resume key it encodes.
pub fn decode_cursor(cursor: &str) -> Result<String> {
    let bytes = STANDARD
        .decode(cursor)
        .map_err(|e| SnapflowError::InvalidCursor(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| SnapflowError::InvalidCursor(e.to_string()))
}
