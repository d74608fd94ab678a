//! Server
//!
//! Wires the catalog, socket and router together.
//!
//! ## Startup
//! 1. Validate config, create the data directory
//! 2. Bootstrap the catalog (persisted listing or a `default` database)
//! 3. Bind the router socket
//! 4. Start the worker pools
//!
//! Failures in any of these steps are fatal; once running, errors stay
//! local to the request that caused them.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::Result;
use crate::pool::WorkerPool;
use crate::router::{Router, ShutdownHandle};
use crate::transport::{RouterSocket, Socket};

pub struct Server {
    catalog: Arc<Catalog>,
    socket: Arc<RouterSocket>,
    router: Router,
}

impl Server {
    /// Bootstrap the catalog and bind the endpoint
    pub fn bind(config: Config) -> Result<Self> {
        config.validate()?;

        let catalog = Arc::new(Catalog::new(config.clone()));
        catalog.bootstrap()?;

        let socket = Arc::new(RouterSocket::bind(
            &config.endpoint,
            config.max_frame_size,
            config.write_timeout(),
        )?);
        let catalog_pool = WorkerPool::new(config.catalog_workers, "lanekv-catalog")?;
        let mount_pool = WorkerPool::new(config.mount_workers, "lanekv-mount")?;

        let router = Router::new(
            Arc::clone(&socket) as Arc<dyn Socket>,
            Arc::clone(&catalog),
            catalog_pool,
            mount_pool,
            config.poll_interval(),
        );

        Ok(Self {
            catalog,
            socket,
            router,
        })
    }

    /// Address the socket is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr()
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Handle that stops [`Server::run`] from another thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.router.shutdown_handle()
    }

    /// Serve until shut down, then unmount every database
    pub fn run(self) -> Result<()> {
        tracing::info!("lanekv listening on {}", self.socket.local_addr());

        let result = self.router.run();

        self.socket.close();
        // Drains the worker pools before the stores are closed
        drop(self.router);
        self.catalog.shutdown();

        tracing::info!("lanekv stopped");
        result
    }
}
