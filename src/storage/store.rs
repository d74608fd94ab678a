//! Store
//!
//! Ordered map plus operation log.

use std::collections::BTreeMap;
use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};

use super::{replay, LogWriter, Operation};
use crate::config::SyncStrategy;
use crate::error::Result;

/// A group of writes applied atomically
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    ops: Vec<Operation>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(Operation::Put {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(Operation::Delete { key: key.into() });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// One database's storage engine
pub struct Store {
    /// Directory holding the log
    dir: PathBuf,

    data: BTreeMap<Vec<u8>, Vec<u8>>,

    log: LogWriter,
}

impl Store {
    const LOG_FILENAME: &'static str = "store.log";

    /// Open or create a store in `dir`
    ///
    /// On open:
    /// 1. Create the directory if needed
    /// 2. Replay the log into memory
    /// 3. Reopen the log for appending
    pub fn open(dir: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let log_path = dir.join(Self::LOG_FILENAME);

        let mut data = BTreeMap::new();
        let replayed = replay(&log_path, |op| apply(&mut data, op))?;

        if replayed.truncated {
            tracing::warn!(
                "Store {} log truncated after {} records",
                dir.display(),
                replayed.records
            );
        }
        tracing::debug!(
            "Store {} opened: {} records replayed, {} keys",
            dir.display(),
            replayed.records,
            data.len()
        );

        let log = LogWriter::open(&log_path, replayed.last_lsn, sync_strategy)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            data,
            log,
        })
    }

    /// Get a value by key
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }

    pub fn exists(&self, key: &[u8]) -> bool {
        self.data.contains_key(key)
    }

    /// Put a key-value pair (logged before it is applied)
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write(Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    /// Delete a key; deleting a missing key is not an error
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.write(Operation::Delete { key: key.to_vec() })
    }

    /// Apply every operation of `batch` or none of them
    pub fn write_batch(&mut self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.write(Operation::Batch(batch.ops))
    }

    /// Pairs with `from <= key <= to`, in key order
    pub fn range(&self, from: &[u8], to: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        if from > to {
            return Vec::new();
        }
        self.data
            .range::<[u8], _>((Bound::Included(from), Bound::Included(to)))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Up to `limit` pairs starting at the first key `>= from`
    pub fn slice(&self, from: &[u8], limit: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.data
            .range::<[u8], _>((Bound::Included(from), Bound::Unbounded))
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Force the log to disk
    pub fn sync(&mut self) -> Result<()> {
        self.log.sync()
    }

    /// Close the store, syncing the log
    pub fn close(mut self) -> Result<()> {
        self.log.sync()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Delete the files of a closed store, leaving anything else in `dir`
    ///
    /// The directory itself is removed only if nothing else is left in it.
    pub fn destroy(dir: &Path) -> Result<()> {
        let log_path = dir.join(Self::LOG_FILENAME);
        if log_path.exists() {
            fs::remove_file(&log_path)?;
        }
        if fs::read_dir(dir).map(|mut entries| entries.next().is_none()).unwrap_or(false) {
            fs::remove_dir(dir)?;
        }
        Ok(())
    }

    fn write(&mut self, op: Operation) -> Result<()> {
        self.log.append(&op)?;
        apply(&mut self.data, op);
        Ok(())
    }
}

fn apply(data: &mut BTreeMap<Vec<u8>, Vec<u8>>, op: Operation) {
    match op {
        Operation::Put { key, value } => {
            data.insert(key, value);
        }
        Operation::Delete { key } => {
            data.remove(&key);
        }
        Operation::Batch(ops) => {
            for op in ops {
                apply(data, op);
            }
        }
    }
}
