//! Configuration for lanekv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{LaneError, Result};

/// Main configuration for a lanekv server
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for the catalog listing and database directories
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── catalog.bin      (persisted catalog listing)
    ///     └── {database}/      (one directory per database)
    ///           └── store.log
    pub data_dir: PathBuf,

    /// Sync strategy: how often each store fsyncs its log
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Execution Configuration
    // -------------------------------------------------------------------------
    /// Capacity of each database inbox (pending requests)
    pub inbox_capacity: usize,

    /// Worker threads serving catalog commands
    pub catalog_workers: usize,

    /// Worker threads opening stores on first access
    pub mount_workers: usize,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub endpoint: String,

    /// How long the router blocks on the socket before re-checking shutdown
    pub poll_interval_ms: u64,

    /// Largest single frame accepted on the wire (bytes)
    pub max_frame_size: usize,

    /// How long a reply may block on a client that is not reading
    /// (milliseconds, 0 = no limit). The client is disconnected when it expires.
    pub write_timeout_ms: u64,
}

/// Store log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced records (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./lanekv_data"),
            sync_strategy: SyncStrategy::EveryNEntries { count: 100 },
            inbox_capacity: 4096,
            catalog_workers: 4,
            mount_workers: 2,
            endpoint: "127.0.0.1:4141".to_string(),
            poll_interval_ms: 100,
            max_frame_size: 16 * 1024 * 1024, // 16 MB
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Path of the persisted catalog listing
    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("catalog.bin")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Peer write timeout, `None` when disabled
    pub fn write_timeout(&self) -> Option<Duration> {
        (self.write_timeout_ms > 0).then(|| Duration::from_millis(self.write_timeout_ms))
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.inbox_capacity == 0 {
            return Err(LaneError::Config("inbox_capacity must be > 0".to_string()));
        }
        if self.catalog_workers == 0 {
            return Err(LaneError::Config("catalog_workers must be > 0".to_string()));
        }
        if self.mount_workers == 0 {
            return Err(LaneError::Config("mount_workers must be > 0".to_string()));
        }
        if self.max_frame_size == 0 {
            return Err(LaneError::Config("max_frame_size must be > 0".to_string()));
        }
        if let SyncStrategy::EveryNEntries { count: 0 } = self.sync_strategy {
            return Err(LaneError::Config("sync count must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the store log sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the per-database inbox capacity
    pub fn inbox_capacity(mut self, capacity: usize) -> Self {
        self.config.inbox_capacity = capacity;
        self
    }

    /// Set the number of catalog worker threads
    pub fn catalog_workers(mut self, count: usize) -> Self {
        self.config.catalog_workers = count;
        self
    }

    /// Set the number of mount worker threads
    pub fn mount_workers(mut self, count: usize) -> Self {
        self.config.mount_workers = count;
        self
    }

    /// Set the TCP listen address
    pub fn endpoint(mut self, addr: impl Into<String>) -> Self {
        self.config.endpoint = addr.into();
        self
    }

    /// Set the router poll interval (in milliseconds)
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Set the maximum frame size (in bytes)
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Set the peer write timeout (in milliseconds, 0 disables it)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
