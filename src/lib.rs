//! # lanekv
//!
//! A multi-database key-value server:
//! - One socket multiplexing many clients
//! - One serialized execution lane per database
//! - A catalog lane for creating, dropping and listing databases
//! - Append-only, checksummed storage log per database
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Router Socket (TCP)                       │
//! │              [identity, payload] per client                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Request Router                          │
//! │              decode · attach source · route                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌──────────────┐
//!   │   Catalog   │          │  Database    │
//!   │  commands   │          │  actors      │
//!   │ (pool)      │          │ (1 consumer  │
//!   └──────┬──────┘          │  per db)     │
//!          │                 └──────┬───────┘
//!          │                        ▼
//!          │                 ┌─────────────┐
//!          │                 │    Store    │
//!          │                 │ (map + log) │
//!          │                 └──────┬──────┘
//!          └──────────┬─────────────┘
//!                     ▼
//!             Response Dispatcher
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod transport;
pub mod protocol;
pub mod storage;
pub mod pool;
pub mod dispatch;
pub mod commands;
pub mod database;
pub mod catalog;
pub mod router;
pub mod server;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{LaneError, Result};
pub use config::Config;
pub use catalog::Catalog;
pub use client::Client;
pub use server::Server;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of lanekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
