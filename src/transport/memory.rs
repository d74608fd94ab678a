//! In-process socket
//!
//! Channel-backed [`Socket`] that lets tests play the client side: inject
//! inbound units and collect whatever the server sends back.

use std::collections::HashSet;
use std::time::Duration;

use bytes::Bytes;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use super::{Envelope, Socket};
use crate::error::{LaneError, Result};

pub struct MemorySocket {
    inbound_tx: Sender<Envelope>,
    inbound_rx: Receiver<Envelope>,
    outbound_tx: Sender<Envelope>,
    outbound_rx: Receiver<Envelope>,

    /// Identities whose sends fail, as if the client went away
    disconnected: Mutex<HashSet<Bytes>>,
}

impl MemorySocket {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = channel::unbounded();
        let (outbound_tx, outbound_rx) = channel::unbounded();
        Self {
            inbound_tx,
            inbound_rx,
            outbound_tx,
            outbound_rx,
            disconnected: Mutex::new(HashSet::new()),
        }
    }

    /// Queue a unit as if `identity` had sent `payload`
    pub fn inject(&self, identity: impl Into<Bytes>, payload: impl Into<Bytes>) {
        // Both channel ends live in self, so this cannot fail
        let _ = self.inbound_tx.send(Envelope::new(identity, payload));
    }

    /// Wait up to `timeout` for the next unit the server sent
    pub fn next_sent(&self, timeout: Duration) -> Option<Envelope> {
        self.outbound_rx.recv_timeout(timeout).ok()
    }

    /// Everything sent so far, without waiting
    pub fn drain_sent(&self) -> Vec<Envelope> {
        self.outbound_rx.try_iter().collect()
    }

    /// Make future sends to `identity` fail
    pub fn disconnect(&self, identity: impl Into<Bytes>) {
        self.disconnected.lock().insert(identity.into());
    }
}

impl Default for MemorySocket {
    fn default() -> Self {
        Self::new()
    }
}

impl Socket for MemorySocket {
    fn recv(&self, timeout: Duration) -> Result<Option<Envelope>> {
        match self.inbound_rx.recv_timeout(timeout) {
            Ok(envelope) => Ok(Some(envelope)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(LaneError::Transport("socket closed".to_string()))
            }
        }
    }

    fn send(&self, envelope: Envelope) -> Result<()> {
        if self.disconnected.lock().contains(&envelope.identity) {
            return Err(LaneError::Transport(format!(
                "Peer {:02x?} disconnected",
                envelope.identity.as_ref()
            )));
        }
        self.outbound_tx
            .send(envelope)
            .map_err(|_| LaneError::Transport("socket closed".to_string()))
    }
}
