//! Request definitions
//!
//! Represents requests from clients.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{LaneError, Result};
use crate::transport::Socket;

/// Where a reply to a request must go
#[derive(Clone)]
pub struct Source {
    /// Client identity frame the request arrived with
    pub identity: Bytes,

    /// Socket the request arrived on
    pub socket: Arc<dyn Socket>,
}

impl Source {
    pub fn new(identity: Bytes, socket: Arc<dyn Socket>) -> Self {
        Self { identity, socket }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("identity", &self.identity.as_ref())
            .finish_non_exhaustive()
    }
}

/// A decoded client request
#[derive(Clone, Serialize, Deserialize)]
pub struct Request {
    /// Command name, matched case-insensitively
    pub command: String,

    /// Target database; empty for catalog-level commands
    pub db_uid: String,

    /// Command-specific arguments
    pub args: Vec<Vec<u8>>,

    /// Reply address, set once by the router after decoding
    #[serde(skip)]
    source: Option<Source>,
}

impl Request {
    /// Create a database-level request
    pub fn new(command: impl Into<String>, db_uid: impl Into<String>, args: Vec<Vec<u8>>) -> Self {
        Self {
            command: command.into(),
            db_uid: db_uid.into(),
            args,
            source: None,
        }
    }

    /// Create a catalog-level request (no target database)
    pub fn catalog(command: impl Into<String>, args: Vec<Vec<u8>>) -> Self {
        Self::new(command, String::new(), args)
    }

    /// True when the request targets the catalog rather than a database
    pub fn is_catalog_level(&self) -> bool {
        self.db_uid.is_empty()
    }

    /// Normalized command name used for table lookups
    pub fn command_name(&self) -> String {
        self.command.to_ascii_uppercase()
    }

    /// Attach the reply address
    ///
    /// A request is addressed exactly once; a second attach is refused.
    pub fn attach_source(&mut self, source: Source) -> Result<()> {
        if self.source.is_some() {
            return Err(LaneError::Transport(format!(
                "Request {} already has a source",
                self.command
            )));
        }
        self.source = Some(source);
        Ok(())
    }

    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    /// Argument at `index`, or an `InvalidArguments` error naming the command
    pub fn arg(&self, index: usize) -> Result<&[u8]> {
        self.args.get(index).map(Vec::as_slice).ok_or_else(|| {
            LaneError::InvalidArguments(format!(
                "{} expects an argument at position {}",
                self.command_name(),
                index
            ))
        })
    }

    /// Argument at `index` decoded as UTF-8
    pub fn arg_str(&self, index: usize) -> Result<&str> {
        std::str::from_utf8(self.arg(index)?).map_err(|_| {
            LaneError::InvalidArguments(format!(
                "{} argument {} is not valid UTF-8",
                self.command_name(),
                index
            ))
        })
    }

    /// Fail unless the argument count is within `min..=max`
    pub fn expect_args(&self, min: usize, max: usize) -> Result<()> {
        let n = self.args.len();
        if n < min || n > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{}..={}", min, max)
            };
            return Err(LaneError::InvalidArguments(format!(
                "{} expects {} arguments, got {}",
                self.command_name(),
                expected,
                n
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("command", &self.command)
            .field("db_uid", &self.db_uid)
            .field("args", &self.args.len())
            .field("source", &self.source)
            .finish()
    }
}

// The reply address is transport state, not part of the message
impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool {
        self.command == other.command && self.db_uid == other.db_uid && self.args == other.args
    }
}

impl Eq for Request {}
