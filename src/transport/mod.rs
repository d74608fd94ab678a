//! Transport Module
//!
//! The single bidirectional, multi-client socket the server listens on.
//!
//! ## Unit Format
//! Every unit moving through a [`Socket`] is an [`Envelope`]: an opaque
//! client-identity frame plus one payload frame.
//!
//! ```text
//! ┌────────────────────┬─────────────────────────────┐
//! │ Identity (opaque)  │  Payload (encoded message)  │
//! └────────────────────┴─────────────────────────────┘
//! ```
//!
//! The identity is assigned by the socket when a client connects and is
//! echoed back unchanged to address a reply. Clients never see it: they send
//! and receive single-frame units, the socket prepends the identity on
//! receive and strips it to route on send.
//!
//! ## Implementations
//! - [`RouterSocket`]: TCP listener, one reader thread per connection
//! - [`MemorySocket`]: in-process channels, for tests and embedding

mod frame;
mod memory;
mod tcp;

use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

pub use frame::{read_frames, write_frames, FRAME_HEADER_SIZE, MAX_FRAMES};
pub use memory::MemorySocket;
pub use tcp::RouterSocket;

/// A unit received from, or sent to, one client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Opaque client identity, echoed back verbatim
    pub identity: Bytes,

    /// Encoded request or response
    pub payload: Bytes,
}

impl Envelope {
    pub fn new(identity: impl Into<Bytes>, payload: impl Into<Bytes>) -> Self {
        Self {
            identity: identity.into(),
            payload: payload.into(),
        }
    }
}

/// A many-to-one socket endpoint
///
/// `recv` is called from the router thread only. `send` may be called from
/// any number of threads at once; implementations serialize writes per peer.
pub trait Socket: Send + Sync {
    /// Wait up to `timeout` for the next inbound unit
    ///
    /// Returns `Ok(None)` on timeout and an error once the socket is closed.
    fn recv(&self, timeout: Duration) -> Result<Option<Envelope>>;

    /// Route a unit to the peer named by its identity frame
    fn send(&self, envelope: Envelope) -> Result<()>;
}
