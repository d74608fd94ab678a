//! TCP router socket
//!
//! Accepts connections and multiplexes them behind one [`Socket`].
//!
//! ## Threads
//! - One acceptor thread
//! - One reader thread per connection, feeding a shared inbound channel
//! - Writes happen on the caller's thread, serialized per connection
//!
//! A write that fails or exceeds the write timeout evicts the peer, so a
//! client that stops reading holds up a sender for at most one timeout.

use std::collections::HashMap;
use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};

use super::{read_frames, write_frames, Envelope, Socket};
use crate::error::{LaneError, Result};

/// One connected client
struct Peer {
    /// Send serialization point for this connection
    writer: Mutex<BufWriter<TcpStream>>,

    /// Handle used to tear the connection down on close
    stream: TcpStream,

    addr: String,
}

type PeerMap = Arc<RwLock<HashMap<Bytes, Arc<Peer>>>>;

/// A listening TCP socket with router semantics
pub struct RouterSocket {
    local_addr: SocketAddr,
    inbound: Receiver<Envelope>,
    peers: PeerMap,
    closed: Arc<AtomicBool>,
}

impl RouterSocket {
    /// Bind the endpoint and start accepting connections
    ///
    /// `write_timeout` bounds each send to a connected client (`None` = no limit).
    pub fn bind(
        endpoint: &str,
        max_frame_size: usize,
        write_timeout: Option<Duration>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(endpoint).map_err(|e| {
            LaneError::Transport(format!("Failed to bind {}: {}", endpoint, e))
        })?;
        let local_addr = listener.local_addr()?;

        let (tx, rx) = channel::unbounded();
        let peers: PeerMap = Arc::new(RwLock::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let acceptor = Acceptor {
            listener,
            inbound: tx,
            peers: Arc::clone(&peers),
            closed: Arc::clone(&closed),
            next_id: AtomicU64::new(1),
            max_frame_size,
            write_timeout,
        };
        thread::Builder::new()
            .name("lanekv-acceptor".to_string())
            .spawn(move || acceptor.run())?;

        tracing::info!("Router socket bound on {}", local_addr);

        Ok(Self {
            local_addr,
            inbound: rx,
            peers,
            closed,
        })
    }

    /// The address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of currently connected clients
    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }

    /// Stop accepting and drop every connection
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        // Wake the acceptor blocked in accept()
        let _ = TcpStream::connect_timeout(&self.local_addr, Duration::from_millis(200));

        let peers: Vec<Arc<Peer>> = self.peers.write().drain().map(|(_, p)| p).collect();
        for peer in peers {
            let _ = peer.stream.shutdown(Shutdown::Both);
        }
        tracing::info!("Router socket on {} closed", self.local_addr);
    }
}

impl Socket for RouterSocket {
    fn recv(&self, timeout: Duration) -> Result<Option<Envelope>> {
        match self.inbound.recv_timeout(timeout) {
            Ok(envelope) => Ok(Some(envelope)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(LaneError::Transport("socket closed".to_string()))
            }
        }
    }

    fn send(&self, envelope: Envelope) -> Result<()> {
        let peer = self
            .peers
            .read()
            .get(&envelope.identity)
            .cloned()
            .ok_or_else(|| {
                LaneError::Transport(format!(
                    "No connected peer for identity {:02x?}",
                    envelope.identity.as_ref()
                ))
            })?;

        let written = {
            let mut writer = peer.writer.lock();
            write_frames(&mut *writer, &[envelope.payload.as_ref()])
        };

        if let Err(e) = written {
            // A partially written unit leaves the stream unusable
            tracing::warn!(
                "Dropping client {} ({:02x?}) after failed send: {}",
                peer.addr,
                envelope.identity.as_ref(),
                e
            );
            self.evict(&envelope.identity, &peer);
            return Err(e);
        }
        Ok(())
    }
}

impl RouterSocket {
    /// Forget `peer` and tear its connection down
    fn evict(&self, identity: &Bytes, peer: &Arc<Peer>) {
        let mut peers = self.peers.write();
        if peers.get(identity).is_some_and(|p| Arc::ptr_eq(p, peer)) {
            peers.remove(identity);
        }
        drop(peers);
        let _ = peer.stream.shutdown(Shutdown::Both);
    }
}

impl Drop for RouterSocket {
    fn drop(&mut self) {
        self.close();
    }
}

struct Acceptor {
    listener: TcpListener,
    inbound: Sender<Envelope>,
    peers: PeerMap,
    closed: Arc<AtomicBool>,
    next_id: AtomicU64,
    max_frame_size: usize,
    write_timeout: Option<Duration>,
}

impl Acceptor {
    fn run(self) {
        for stream in self.listener.incoming() {
            if self.closed.load(Ordering::SeqCst) {
                break;
            }

            match stream {
                Ok(stream) => {
                    if let Err(e) = self.register(stream) {
                        tracing::warn!("Failed to register connection: {}", e);
                    }
                }
                Err(e) => tracing::warn!("Broken connection: {}", e),
            }
        }
        tracing::debug!("Acceptor stopped");
    }

    fn register(&self, stream: TcpStream) -> Result<()> {
        let addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;
        // Shared by every clone of the stream, including the writer
        stream.set_write_timeout(self.write_timeout)?;

        let identity = Bytes::from(
            self.next_id
                .fetch_add(1, Ordering::Relaxed)
                .to_be_bytes()
                .to_vec(),
        );

        let peer = Arc::new(Peer {
            writer: Mutex::new(BufWriter::new(stream.try_clone()?)),
            stream: stream.try_clone()?,
            addr,
        });

        let reader = ConnectionReader {
            reader: BufReader::new(stream),
            identity: identity.clone(),
            inbound: self.inbound.clone(),
            peers: Arc::clone(&self.peers),
            max_frame_size: self.max_frame_size,
        };

        tracing::debug!("Client {} connected as {:02x?}", peer.addr, identity.as_ref());
        self.peers.write().insert(identity, peer);

        thread::Builder::new()
            .name("lanekv-conn".to_string())
            .spawn(move || reader.run())?;
        Ok(())
    }
}

struct ConnectionReader {
    reader: BufReader<TcpStream>,
    identity: Bytes,
    inbound: Sender<Envelope>,
    peers: PeerMap,
    max_frame_size: usize,
}

impl ConnectionReader {
    fn run(mut self) {
        loop {
            let mut frames = match read_frames(&mut self.reader, self.max_frame_size) {
                Ok(frames) => frames,
                Err(LaneError::Io(ref e))
                    if matches!(
                        e.kind(),
                        ErrorKind::UnexpectedEof
                            | ErrorKind::ConnectionReset
                            | ErrorKind::ConnectionAborted
                    ) =>
                {
                    tracing::debug!("Client {:02x?} disconnected", self.identity.as_ref());
                    break;
                }
                Err(e) => {
                    tracing::warn!("Error reading from {:02x?}: {}", self.identity.as_ref(), e);
                    break;
                }
            };

            if frames.len() != 1 {
                tracing::warn!(
                    "Dropping unit with {} frames from {:02x?} (expected 1)",
                    frames.len(),
                    self.identity.as_ref()
                );
                continue;
            }

            let envelope = Envelope {
                identity: self.identity.clone(),
                payload: frames.remove(0),
            };
            if self.inbound.send(envelope).is_err() {
                break;
            }
        }

        if let Some(peer) = self.peers.write().remove(&self.identity) {
            let _ = peer.stream.shutdown(Shutdown::Both);
        }
    }
}
