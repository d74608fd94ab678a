//! Request Router
//!
//! The event loop: polls the socket, decodes each unit and picks a lane.
//!
//! ```text
//!                       ┌──────────────┐
//!  socket ──► decode ──►│ db_uid empty?│
//!                       └──────┬───────┘
//!                   yes        │        no
//!           ┌──────────────────┴──────────────────┐
//!           ▼                                     ▼
//!   catalog command table                 catalog.resolve(db_uid)
//!   (run on worker pool)                  (submit to database inbox)
//!           │                                     │
//!           └──────────────► dispatcher ◄─────────┘
//! ```
//!
//! Nothing on this thread waits for a command to run or a store to open.
//! Requests that cannot be decoded, that name an unknown database or an
//! unknown catalog command are dropped without a reply.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::Catalog;
use crate::commands::catalog_commands;
use crate::database::Admission;
use crate::dispatch::reply;
use crate::error::Result;
use crate::pool::WorkerPool;
use crate::protocol::{decode_request, Source};
use crate::transport::{Envelope, Socket};

/// Routing decision for one inbound unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Handed to a database actor
    Database(Admission),

    /// Catalog command queued on the worker pool
    Catalog,

    /// Payload did not decode
    Malformed,

    /// No database with that id
    UnknownDatabase,

    /// Catalog command not in the table
    UnknownCommand,

    /// Could not be scheduled (pool shutting down)
    Dropped,
}

/// Cloneable flag that stops a running router
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Router {
    socket: Arc<dyn Socket>,
    catalog: Arc<Catalog>,

    /// Runs catalog commands
    catalog_pool: WorkerPool,

    /// Opens stores; kept apart so a catalog command waiting on a mount
    /// can never starve the mount itself
    mount_pool: WorkerPool,

    poll_interval: Duration,
    shutdown: ShutdownHandle,
}

impl Router {
    pub fn new(
        socket: Arc<dyn Socket>,
        catalog: Arc<Catalog>,
        catalog_pool: WorkerPool,
        mount_pool: WorkerPool,
        poll_interval: Duration,
    ) -> Self {
        Self {
            socket,
            catalog,
            catalog_pool,
            mount_pool,
            poll_interval,
            shutdown: ShutdownHandle::default(),
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Poll and route until shut down
    ///
    /// Returns an error only if the socket fails while still in service.
    pub fn run(&self) -> Result<()> {
        tracing::info!("Router started");

        while !self.shutdown.is_shutdown() {
            match self.socket.recv(self.poll_interval) {
                Ok(Some(envelope)) => {
                    self.route(envelope);
                }
                Ok(None) => continue,
                Err(_) if self.shutdown.is_shutdown() => break,
                Err(e) => {
                    tracing::error!("Socket receive failed: {}", e);
                    return Err(e);
                }
            }
        }

        tracing::info!("Router stopped");
        Ok(())
    }

    /// Decode one unit and hand it to its lane
    pub fn route(&self, envelope: Envelope) -> Route {
        let mut request = match decode_request(&envelope.payload) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(
                    "Dropping undecodable unit from {:02x?}: {}",
                    envelope.identity.as_ref(),
                    e
                );
                return Route::Malformed;
            }
        };

        let source = Source::new(envelope.identity, Arc::clone(&self.socket));
        if let Err(e) = request.attach_source(source) {
            tracing::warn!("{}", e);
            return Route::Malformed;
        }

        tracing::debug!("Routing {:?}", request);

        if !request.is_catalog_level() {
            return match self.catalog.resolve(&request.db_uid) {
                Some(db) => Route::Database(db.submit(request, &self.mount_pool)),
                None => {
                    tracing::debug!(
                        "Dropping {} for unknown database {:?}",
                        request.command,
                        request.db_uid
                    );
                    Route::UnknownDatabase
                }
            };
        }

        let name = request.command_name();
        let Some(handler) = catalog_commands().get(&name) else {
            tracing::warn!("Dropping unknown catalog command {:?}", request.command);
            return Route::UnknownCommand;
        };

        let catalog = Arc::clone(&self.catalog);
        let queued = self.catalog_pool.execute(move || {
            let response = handler.execute(&catalog, &request);
            reply(&response, &request);
        });
        match queued {
            Ok(()) => Route::Catalog,
            Err(e) => {
                tracing::warn!("Dropping catalog command {}: {}", name, e);
                Route::Dropped
            }
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }
}
