//! Database Actor
//!
//! Owns one logical database and serializes every access to its store.
//!
//! ## Lifecycle
//! ```text
//!              submit / mount                 store opened
//!  Unmounted ─────────────────► Mounting ────────────────► Mounted
//!      ▲                           │ open failed              │
//!      └───────────────────────────┘                          │ unmount
//!      ▲                                                      ▼
//!      └──────────────────────── Unmounting ◄─────────────────┘
//!                                consumer joined
//! ```
//! A removed database is `Retired`: it accepts nothing and never mounts again.
//!
//! ## Concurrency Model: one consumer per mounted database
//! - The store is moved into a dedicated consumer thread on mount and closed
//!   by that same thread, so it is never touched by two threads.
//! - The inbox is a bounded crossbeam channel: many producers (routing
//!   tasks), one consumer. Requests run in the order they were accepted.
//! - `submit` never blocks: a full inbox is answered with a `Busy` error and
//!   an unmounted database is opened on the worker pool. Requests arriving
//!   while the mount is in flight are buffered in order and flushed into the
//!   inbox before the consumer starts.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};

use crate::commands::database_commands;
use crate::config::SyncStrategy;
use crate::dispatch::reply;
use crate::error::{LaneError, Result};
use crate::pool::WorkerPool;
use crate::protocol::{ErrorCode, Request, Response};
use crate::storage::Store;

/// Externally visible lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbStatus {
    Unmounted,
    Mounting,
    Mounted,
    Unmounting,
    Retired,
}

/// What happened to a submitted request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Placed in the inbox
    Queued,

    /// Held until the in-flight mount completes
    Buffered,

    /// Refused; the client got an error response
    Rejected,

    /// Dropped without a reply (database was removed)
    Discarded,
}

enum State {
    Unmounted,
    Mounting {
        pending: Vec<Request>,
    },
    Mounted {
        inbox: Sender<Request>,
        stop: Arc<AtomicBool>,
        consumer: JoinHandle<()>,
    },
    Unmounting,
    Retired,
}

impl State {
    fn status(&self) -> DbStatus {
        match self {
            State::Unmounted => DbStatus::Unmounted,
            State::Mounting { .. } => DbStatus::Mounting,
            State::Mounted { .. } => DbStatus::Mounted,
            State::Unmounting => DbStatus::Unmounting,
            State::Retired => DbStatus::Retired,
        }
    }

    fn is_transitional(&self) -> bool {
        matches!(self, State::Mounting { .. } | State::Unmounting)
    }
}

pub struct Database {
    id: String,

    /// Directory of the underlying store
    path: PathBuf,

    sync_strategy: SyncStrategy,
    inbox_capacity: usize,

    state: Mutex<State>,

    /// Signalled whenever a transitional state settles
    settled: Condvar,

    /// Number of times the store has been opened
    mounts: AtomicU64,
}

impl Database {
    /// Create an unmounted database actor
    pub fn new(
        id: impl Into<String>,
        path: impl Into<PathBuf>,
        sync_strategy: SyncStrategy,
        inbox_capacity: usize,
    ) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            sync_strategy,
            inbox_capacity: inbox_capacity.max(1),
            state: Mutex::new(State::Unmounted),
            settled: Condvar::new(),
            mounts: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn status(&self) -> DbStatus {
        self.state.lock().status()
    }

    pub fn is_mounted(&self) -> bool {
        self.status() == DbStatus::Mounted
    }

    /// How many times the store has been opened
    pub fn mount_count(&self) -> u64 {
        self.mounts.load(Ordering::SeqCst)
    }

    /// Requests waiting in the inbox
    pub fn queued(&self) -> usize {
        match &*self.state.lock() {
            State::Mounted { inbox, .. } => inbox.len(),
            State::Mounting { pending } => pending.len(),
            _ => 0,
        }
    }

    // =========================================================================
    // Routing
    // =========================================================================

    /// Hand a request to this database without blocking the caller
    ///
    /// An unmounted database is mounted on `pool`; the request runs once the
    /// store is open.
    pub fn submit(self: &Arc<Self>, request: Request, pool: &WorkerPool) -> Admission {
        let mut state = self.state.lock();

        match &mut *state {
            State::Mounted { inbox, .. } => match inbox.try_send(request) {
                Ok(()) => Admission::Queued,
                Err(TrySendError::Full(request)) | Err(TrySendError::Disconnected(request)) => {
                    drop(state);
                    self.reject(&request, "inbox is full");
                    Admission::Rejected
                }
            },
            State::Mounting { pending } => {
                if pending.len() >= self.inbox_capacity {
                    drop(state);
                    self.reject(&request, "too many requests waiting for mount");
                    return Admission::Rejected;
                }
                pending.push(request);
                Admission::Buffered
            }
            State::Unmounted => {
                *state = State::Mounting {
                    pending: vec![request],
                };
                drop(state);

                let db = Arc::clone(self);
                let queued = pool.execute(move || {
                    if let Err(e) = db.open_and_start() {
                        tracing::error!("Failed to mount database {}: {}", db.id, e);
                    }
                });
                match queued {
                    Ok(()) => Admission::Buffered,
                    Err(e) => {
                        self.abort_mount(&e);
                        Admission::Rejected
                    }
                }
            }
            State::Unmounting => {
                drop(state);
                self.reject(&request, "database is unmounting");
                Admission::Rejected
            }
            State::Retired => {
                tracing::debug!("Dropping {} for removed database {}", request.command, self.id);
                Admission::Discarded
            }
        }
    }

    fn reject(&self, request: &Request, reason: &str) {
        tracing::warn!("Rejecting {} on {}: {}", request.command, self.id, reason);
        let response = Response::error(ErrorCode::Busy, format!("{}: {}", self.id, reason));
        reply(&response, request);
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Mount synchronously, waiting out any in-flight transition
    ///
    /// Mounting an already mounted database is a no-op.
    pub fn mount(&self) -> Result<()> {
        let mut state = self.state.lock();
        while state.is_transitional() {
            self.settled.wait(&mut state);
        }

        match &*state {
            State::Mounted { .. } => Ok(()),
            State::Retired => Err(LaneError::DatabaseNotFound(self.id.clone())),
            _ => {
                *state = State::Mounting {
                    pending: Vec::new(),
                };
                drop(state);
                self.open_and_start()
            }
        }
    }

    /// Stop the consumer and close the store
    ///
    /// The command in flight finishes; requests still queued are discarded.
    /// Returns whether the database was mounted.
    pub fn unmount(&self) -> Result<bool> {
        self.shut_down(false)
    }

    /// Unmount for good; later submissions are dropped
    pub fn retire(&self) -> Result<bool> {
        self.shut_down(true)
    }

    fn shut_down(&self, retire: bool) -> Result<bool> {
        let mut state = self.state.lock();
        while state.is_transitional() {
            self.settled.wait(&mut state);
        }

        let previous = std::mem::replace(&mut *state, State::Unmounting);
        let was_retired = matches!(previous, State::Retired);
        let was_mounted = match previous {
            State::Mounted {
                inbox,
                stop,
                consumer,
            } => {
                stop.store(true, Ordering::SeqCst);
                // Disconnecting the inbox wakes an idle consumer
                drop(inbox);
                drop(state);

                if consumer.join().is_err() {
                    tracing::error!("Consumer for {} panicked", self.id);
                }
                state = self.state.lock();
                true
            }
            _ => false,
        };

        *state = if retire || was_retired {
            State::Retired
        } else {
            State::Unmounted
        };
        drop(state);
        self.settled.notify_all();

        if was_mounted {
            tracing::info!("Database {} unmounted", self.id);
        }
        Ok(was_mounted)
    }

    /// Open the store and start the consumer; the state must be `Mounting`
    fn open_and_start(&self) -> Result<()> {
        let store = match Store::open(&self.path, self.sync_strategy) {
            Ok(store) => store,
            Err(e) => {
                self.abort_mount(&e);
                return Err(e);
            }
        };

        let mut state = self.state.lock();
        let pending = match std::mem::replace(&mut *state, State::Unmounted) {
            State::Mounting { pending } => pending,
            other => {
                // Nothing else enters Mounting; put it back and give up
                *state = other;
                drop(state);
                let _ = store.close();
                return Err(LaneError::Storage(format!(
                    "{} left the mounting state unexpectedly",
                    self.id
                )));
            }
        };

        let capacity = self.inbox_capacity.max(pending.len());
        let (inbox, receiver) = channel::bounded(capacity);
        for request in pending {
            // Capacity covers every buffered request
            let _ = inbox.try_send(request);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let consumer = Consumer {
            id: self.id.clone(),
            store,
            inbox: receiver,
            stop: Arc::clone(&stop),
        };

        let spawned = thread::Builder::new()
            .name(format!("lanekv-db-{}", self.id))
            .spawn(move || consumer.run());

        let result = match spawned {
            Ok(handle) => {
                *state = State::Mounted {
                    inbox,
                    stop,
                    consumer: handle,
                };
                self.mounts.fetch_add(1, Ordering::SeqCst);
                tracing::info!("Database {} mounted from {}", self.id, self.path.display());
                Ok(())
            }
            Err(e) => {
                // The consumer closure (and its store) was dropped with the error
                *state = State::Unmounted;
                Err(LaneError::Io(e))
            }
        };
        drop(state);
        self.settled.notify_all();
        result
    }

    /// Fail every buffered request and fall back to `Unmounted`
    fn abort_mount(&self, err: &LaneError) {
        let mut state = self.state.lock();
        let pending = match std::mem::replace(&mut *state, State::Unmounted) {
            State::Mounting { pending } => pending,
            other => {
                *state = other;
                Vec::new()
            }
        };
        drop(state);
        self.settled.notify_all();

        let response = Response::error(
            ErrorCode::Storage,
            format!("failed to mount {}: {}", self.id, err),
        );
        for request in &pending {
            reply(&response, request);
        }
    }
}

/// The single thread allowed to touch a mounted store
struct Consumer {
    id: String,
    store: Store,
    inbox: Receiver<Request>,
    stop: Arc<AtomicBool>,
}

impl Consumer {
    fn run(mut self) {
        tracing::debug!("Consumer for {} started", self.id);

        while let Ok(request) = self.inbox.recv() {
            if self.stop.load(Ordering::SeqCst) {
                let discarded = 1 + self.inbox.try_iter().count();
                tracing::debug!("Discarding {} queued requests for {}", discarded, self.id);
                break;
            }

            let response = self.execute(&request);
            reply(&response, &request);
        }

        if let Err(e) = self.store.close() {
            tracing::warn!("Error closing store for {}: {}", self.id, e);
        }
        tracing::debug!("Consumer for {} stopped", self.id);
    }

    fn execute(&mut self, request: &Request) -> Response {
        let name = request.command_name();
        let Some(handler) = database_commands().get(&name) else {
            tracing::warn!("Unknown command {} for database {}", request.command, self.id);
            return Response::error(
                ErrorCode::UnknownCommand,
                format!("Unknown command {}", request.command),
            );
        };

        tracing::debug!("{} executing {:?}", self.id, request);

        let store = &mut self.store;
        match panic::catch_unwind(AssertUnwindSafe(|| handler.execute(store, request))) {
            Ok(response) => response,
            Err(_) => {
                tracing::error!("{} panicked on {}", request.command, self.id);
                Response::error(
                    ErrorCode::Internal,
                    format!("{} failed unexpectedly", request.command),
                )
            }
        }
    }
}
