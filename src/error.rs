//! Error types for lanekv
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using LaneError
pub type Result<T> = std::result::Result<T, LaneError>;

/// Unified error type for lanekv operations
#[derive(Debug, Error)]
pub enum LaneError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Log corruption detected: {0}")]
    Corruption(String),

    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Catalog Errors
    // -------------------------------------------------------------------------
    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    #[error("Database already exists: {0}")]
    DatabaseExists(String),

    #[error("Invalid database name: {0:?}")]
    InvalidDatabaseName(String),

    #[error("Invalid database path: {0}")]
    InvalidDatabasePath(String),

    #[error("No persisted catalog found")]
    CatalogMissing,

    // -------------------------------------------------------------------------
    // Request Errors
    // -------------------------------------------------------------------------
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Database busy: {0}")]
    Busy(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
