//! Response Dispatcher
//!
//! Sends a response back to the client that issued the request, on the
//! socket it arrived on, tagged with its identity frame.

use crate::error::{LaneError, Result};
use crate::protocol::{encode_response, Request, Response};
use crate::transport::Envelope;

/// Encode `response` and send it to the origin of `request`
pub fn forward_response(response: &Response, request: &Request) -> Result<()> {
    let source = request.source().ok_or_else(|| {
        LaneError::Transport(format!("{} request has no reply address", request.command))
    })?;

    tracing::trace!(
        "Replying to {:02x?}: {:?}",
        source.identity.as_ref(),
        response.status
    );

    let payload = encode_response(response)?;
    source
        .socket
        .send(Envelope::new(source.identity.clone(), payload))
}

/// Like [`forward_response`], but failures are logged and swallowed
///
/// A client that went away must not affect anyone else.
pub fn reply(response: &Response, request: &Request) {
    if let Err(e) = forward_response(response, request) {
        tracing::warn!(
            "Failed to reply to {} (db {:?}): {}",
            request.command,
            request.db_uid,
            e
        );
    }
}
