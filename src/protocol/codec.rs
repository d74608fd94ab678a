//! Protocol codec
//!
//! Encoding and decoding functions for requests and responses.
//!
//! Messages use bincode's default options (varint integers, little-endian)
//! with a size limit, so a hostile length prefix cannot force a huge
//! allocation. Trailing bytes after a message are rejected.

use bincode::{DefaultOptions, Options};

use super::{Request, Response};
use crate::error::{LaneError, Result};

/// Maximum encoded message size (16 MB)
pub const MAX_MESSAGE_SIZE: u64 = 16 * 1024 * 1024;

fn options() -> impl Options {
    DefaultOptions::new().with_limit(MAX_MESSAGE_SIZE)
}

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request to bytes
pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    options()
        .serialize(request)
        .map_err(|e| LaneError::Encode(e.to_string()))
}

/// Decode a request from bytes
///
/// The returned request has no source attached.
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    options()
        .deserialize(bytes)
        .map_err(|e| LaneError::Decode(format!("request: {}", e)))
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    options()
        .serialize(response)
        .map_err(|e| LaneError::Encode(e.to_string()))
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    options()
        .deserialize(bytes)
        .map_err(|e| LaneError::Decode(format!("response: {}", e)))
}
