//! Storage Module
//!
//! The embedded engine each database reads and writes.
//!
//! ## Responsibilities
//! - Ordered key-value map held in memory
//! - Append-only operation log for durability
//! - Replay the log on open, dropping a torn tail
//! - Atomic multi-operation batches
//!
//! ## Concurrency
//! A [`Store`] has no internal locking. Exactly one thread owns it: the
//! consumer of the database it belongs to.
//!
//! ## Log Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Record 1                                │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Record 2 ...                            │
//! └─────────────────────────────────────────┘
//! ```
//! `Data` is a bincode-encoded [`Operation`]; the CRC covers it.

mod log;
mod store;

pub use log::{replay, LogWriter, Operation, ReplayResult, RECORD_HEADER_SIZE};
pub use store::{Store, WriteBatch};
