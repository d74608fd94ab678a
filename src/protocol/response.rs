//! Response definitions
//!
//! Represents responses to clients.

use serde::{Deserialize, Serialize};

use crate::error::LaneError;

/// Outcome of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Success,
    Failure,
}

/// Machine-readable failure reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    KeyNotFound,
    InvalidArguments,
    UnknownCommand,
    DatabaseNotFound,
    DatabaseExists,
    Busy,
    Storage,
    Internal,
}

/// Failure details carried by a `Failure` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: ErrorCode,
    pub message: String,
}

/// A response to send to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// Set iff status is `Failure`
    pub error: Option<ResponseError>,

    /// Command-specific result values
    pub data: Vec<Vec<u8>>,
}

impl Response {
    /// Create a success response carrying `data`
    pub fn ok(data: Vec<Vec<u8>>) -> Self {
        Self {
            status: Status::Success,
            error: None,
            data,
        }
    }

    /// Create a success response with no data
    pub fn empty() -> Self {
        Self::ok(Vec::new())
    }

    /// Create a failure response
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: Status::Failure,
            error: Some(ResponseError {
                code,
                message: message.into(),
            }),
            data: Vec::new(),
        }
    }

    /// Encode an operation error as a failure response
    pub fn from_error(err: &LaneError) -> Self {
        let code = match err {
            LaneError::KeyNotFound => ErrorCode::KeyNotFound,
            LaneError::InvalidArguments(_)
            | LaneError::InvalidDatabaseName(_)
            | LaneError::InvalidDatabasePath(_) => ErrorCode::InvalidArguments,
            LaneError::DatabaseNotFound(_) => ErrorCode::DatabaseNotFound,
            LaneError::DatabaseExists(_) => ErrorCode::DatabaseExists,
            LaneError::Busy(_) => ErrorCode::Busy,
            LaneError::Io(_) | LaneError::Storage(_) | LaneError::Corruption(_) => {
                ErrorCode::Storage
            }
            _ => ErrorCode::Internal,
        };
        Self::error(code, err.to_string())
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Error code of a failure response
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }
}
