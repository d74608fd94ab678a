//! Operation log
//!
//! Appends checksummed records and replays them on open.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::SyncStrategy;
use crate::error::{LaneError, Result};

/// LSN (8) + CRC (4) + Len (4)
pub const RECORD_HEADER_SIZE: usize = 16;

/// Upper bound on one record's data, guards replay against garbage lengths
const MAX_RECORD_SIZE: usize = 64 * 1024 * 1024;

/// A logged mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },

    /// Several operations applied all-or-nothing
    Batch(Vec<Operation>),
}

/// Outcome of replaying a log file
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayResult {
    /// Records applied
    pub records: u64,

    /// Highest LSN seen (0 for an empty log)
    pub last_lsn: u64,

    /// Whether a torn or corrupt tail was cut off
    pub truncated: bool,
}

/// Read every intact record from `path`, passing each operation to `apply`
///
/// Replay stops at the first short or corrupt record; everything from that
/// offset on is truncated so later appends start from a clean tail.
pub fn replay<F>(path: &Path, mut apply: F) -> Result<ReplayResult>
where
    F: FnMut(Operation),
{
    let mut result = ReplayResult::default();
    if !path.exists() {
        return Ok(result);
    }

    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let mut good_offset: u64 = 0;

    loop {
        let mut header = [0u8; RECORD_HEADER_SIZE];
        match reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        let (lsn, crc, len) = parse_header(&header);

        if len > MAX_RECORD_SIZE {
            tracing::warn!("Log record at offset {} claims {} bytes", good_offset, len);
            break;
        }

        let mut data = vec![0u8; len];
        match reader.read_exact(&mut data) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        if crc32fast::hash(&data) != crc {
            tracing::warn!("Checksum mismatch for log record lsn={}", lsn);
            break;
        }

        let operation: Operation = match bincode::deserialize(&data) {
            Ok(op) => op,
            Err(e) => {
                tracing::warn!("Undecodable log record lsn={}: {}", lsn, e);
                break;
            }
        };

        apply(operation);
        result.records += 1;
        result.last_lsn = lsn;
        good_offset += (RECORD_HEADER_SIZE + len) as u64;
    }

    if good_offset < file_len {
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(good_offset)?;
        file.sync_all()?;
        result.truncated = true;
    }

    Ok(result)
}

fn parse_header(header: &[u8; RECORD_HEADER_SIZE]) -> (u64, u32, usize) {
    let mut lsn = [0u8; 8];
    let mut crc = [0u8; 4];
    let mut len = [0u8; 4];
    lsn.copy_from_slice(&header[0..8]);
    crc.copy_from_slice(&header[8..12]);
    len.copy_from_slice(&header[12..16]);
    (
        u64::from_be_bytes(lsn),
        u32::from_be_bytes(crc),
        u32::from_be_bytes(len) as usize,
    )
}

/// Appends records to a log file
pub struct LogWriter {
    writer: BufWriter<File>,
    next_lsn: u64,
    sync_strategy: SyncStrategy,
    unsynced: usize,
}

impl LogWriter {
    /// Open (or create) the log for appending, continuing after `last_lsn`
    pub fn open(path: &Path, last_lsn: u64, sync_strategy: SyncStrategy) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            next_lsn: last_lsn + 1,
            sync_strategy,
            unsynced: 0,
        })
    }

    /// Append an operation, returning its LSN
    pub fn append(&mut self, operation: &Operation) -> Result<u64> {
        let data =
            bincode::serialize(operation).map_err(|e| LaneError::Encode(e.to_string()))?;
        if data.len() > MAX_RECORD_SIZE {
            return Err(LaneError::Storage(format!(
                "Log record too large: {} bytes",
                data.len()
            )));
        }

        let lsn = self.next_lsn;
        let mut record = Vec::with_capacity(RECORD_HEADER_SIZE + data.len());
        record.extend_from_slice(&lsn.to_be_bytes());
        record.extend_from_slice(&crc32fast::hash(&data).to_be_bytes());
        record.extend_from_slice(&(data.len() as u32).to_be_bytes());
        record.extend_from_slice(&data);

        self.writer.write_all(&record)?;
        self.writer.flush()?;
        self.next_lsn += 1;
        self.unsynced += 1;

        let due = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if due {
            self.sync()?;
        }

        Ok(lsn)
    }

    /// Force buffered records to disk
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// LSN the next append will get
    pub fn next_lsn(&self) -> u64 {
        self.next_lsn
    }
}
