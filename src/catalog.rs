//! Database Catalog
//!
//! Registry of every known database, keyed by id.
//!
//! ## Responsibilities
//! - Resolve ids to database actors for the router
//! - Create, remove, mount and unmount databases
//! - Persist the listing so databases survive a restart
//!
//! ## Concurrency
//! - `databases`: `RwLock`. Routing resolves under the read lock, create and
//!   remove take the write lock only to change the map
//! - Every change bumps `generation`; the listing is written after the lock
//!   is released, and a listing older than the one on disk is never written
//!
//! ## Storage locations
//! Each database owns its directory exclusively. A location may not overlap
//! another database's or contain the data directory, and a location inside
//! the data directory must be the default `{data_dir}/{id}`. Dropping a
//! database deletes its whole directory only at that default location;
//! elsewhere just the store's own files are removed.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::database::Database;
use crate::error::{LaneError, Result};
use crate::storage::Store;

/// Database created when no usable listing exists
pub const DEFAULT_DATABASE: &str = "default";

const LISTING_VERSION: u32 = 1;

type DatabaseMap = HashMap<String, Arc<Database>>;

/// On-disk form of the catalog
#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogListing {
    version: u32,
    databases: BTreeMap<String, PathBuf>,
}

impl CatalogListing {
    fn of(databases: &DatabaseMap) -> Self {
        Self {
            version: LISTING_VERSION,
            databases: databases
                .iter()
                .map(|(id, db)| (id.clone(), db.path().to_path_buf()))
                .collect(),
        }
    }
}

pub struct Catalog {
    config: Config,
    databases: RwLock<DatabaseMap>,

    /// Bumped on every change to `databases`, while its write lock is held
    generation: AtomicU64,

    /// Generation of the listing last written to disk
    persisted: Mutex<u64>,
}

impl Catalog {
    /// Create an empty catalog; nothing is read from disk
    pub fn new(config: Config) -> Self {
        Self {
            config,
            databases: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            persisted: Mutex::new(0),
        }
    }

    /// Load the persisted listing, falling back to a single default database
    ///
    /// Fails only if the fallback itself cannot be created.
    pub fn bootstrap(&self) -> Result<()> {
        fs::create_dir_all(&self.config.data_dir)?;

        match self.load_persisted() {
            Ok(count) => {
                tracing::info!("Catalog loaded: {} databases", count);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    "No usable catalog ({}), creating database {:?}",
                    e,
                    DEFAULT_DATABASE
                );
                self.create(DEFAULT_DATABASE, None).map(|_| ())
            }
        }
    }

    /// Populate the catalog from the persisted listing
    ///
    /// Every database starts unmounted. Returns the number loaded.
    pub fn load_persisted(&self) -> Result<usize> {
        let path = self.config.catalog_path();
        if !path.exists() {
            return Err(LaneError::CatalogMissing);
        }

        let bytes = fs::read(&path)?;
        let listing: CatalogListing =
            bincode::deserialize(&bytes).map_err(|e| LaneError::Decode(e.to_string()))?;
        if listing.version != LISTING_VERSION {
            return Err(LaneError::Decode(format!(
                "unsupported catalog version {}",
                listing.version
            )));
        }

        let mut databases = self.databases.write();
        for (id, db_path) in listing.databases {
            let db_path = fs::canonicalize(&db_path).unwrap_or(db_path);
            let db = self.new_database(&id, db_path);
            databases.insert(id, Arc::new(db));
        }
        Ok(databases.len())
    }

    /// Look up a database by id
    pub fn resolve(&self, id: &str) -> Option<Arc<Database>> {
        self.databases.read().get(id).cloned()
    }

    /// Register a new, unmounted database
    ///
    /// The store is opened and closed once so a bad location fails here
    /// rather than on first use. `path` defaults to `{data_dir}/{id}`.
    pub fn create(&self, id: &str, path: Option<PathBuf>) -> Result<Arc<Database>> {
        validate_name(id)?;
        if self.databases.read().contains_key(id) {
            return Err(LaneError::DatabaseExists(id.to_string()));
        }

        let root = self.data_root()?;
        let requested = path.unwrap_or_else(|| root.join(id));
        let existed = requested.exists();
        fs::create_dir_all(&requested)?;
        let path = fs::canonicalize(&requested)?;

        if let Err(e) = check_location(id, &root, &path, &self.databases.read()) {
            if !existed {
                let _ = fs::remove_dir(&path);
            }
            return Err(e);
        }

        // Opened outside the lock so routing is not held up by disk I/O
        Store::open(&path, self.config.sync_strategy)?.close()?;

        let db = Arc::new(self.new_database(id, path));
        let (generation, listing) = {
            let mut databases = self.databases.write();
            if databases.contains_key(id) {
                return Err(LaneError::DatabaseExists(id.to_string()));
            }
            check_location(id, &root, db.path(), &databases)?;

            databases.insert(id.to_string(), Arc::clone(&db));
            self.commit(&databases)
        };

        if let Err(e) = self.persist(generation, &listing) {
            self.revert(|databases| {
                if databases.get(id).is_some_and(|d| Arc::ptr_eq(d, &db)) {
                    databases.remove(id);
                }
            });
            return Err(e);
        }

        tracing::info!("Database {} created at {}", id, db.path().display());
        Ok(db)
    }

    /// Remove a database, unmounting it and deleting its files
    pub fn remove(&self, id: &str) -> Result<()> {
        let (db, generation, listing) = {
            let mut databases = self.databases.write();
            let db = databases
                .remove(id)
                .ok_or_else(|| LaneError::DatabaseNotFound(id.to_string()))?;
            let (generation, listing) = self.commit(&databases);
            (db, generation, listing)
        };

        if let Err(e) = self.persist(generation, &listing) {
            self.revert(|databases| {
                databases
                    .entry(id.to_string())
                    .or_insert_with(|| Arc::clone(&db));
            });
            return Err(e);
        }

        // Out of the map: nothing new gets routed here
        db.retire()?;

        if db.path() == self.data_root()?.join(id) {
            fs::remove_dir_all(db.path())?;
        } else {
            Store::destroy(db.path())?;
        }
        tracing::info!("Database {} removed", id);
        Ok(())
    }

    /// All database ids, sorted
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Mount a database now instead of on first access
    pub fn mount(&self, id: &str) -> Result<()> {
        self.resolve(id)
            .ok_or_else(|| LaneError::DatabaseNotFound(id.to_string()))?
            .mount()
    }

    /// Unmount a database; returns whether it was mounted
    pub fn unmount(&self, id: &str) -> Result<bool> {
        self.resolve(id)
            .ok_or_else(|| LaneError::DatabaseNotFound(id.to_string()))?
            .unmount()
    }

    /// Unmount every database (server shutdown)
    pub fn shutdown(&self) {
        let databases: Vec<Arc<Database>> = self.databases.read().values().cloned().collect();
        for db in databases {
            if let Err(e) = db.unmount() {
                tracing::warn!("Failed to unmount {}: {}", db.id(), e);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.databases.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.databases.read().is_empty()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn new_database(&self, id: &str, path: PathBuf) -> Database {
        Database::new(
            id,
            path,
            self.config.sync_strategy,
            self.config.inbox_capacity,
        )
    }

    /// Canonical data directory, created if missing
    fn data_root(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.config.data_dir)?;
        Ok(fs::canonicalize(&self.config.data_dir)?)
    }

    /// Stamp a change made under the write lock; returns the listing to write
    fn commit(&self, databases: &DatabaseMap) -> (u64, CatalogListing) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        (generation, CatalogListing::of(databases))
    }

    /// Undo a change whose listing could not be written
    fn revert(&self, undo: impl FnOnce(&mut DatabaseMap)) {
        let (generation, listing) = {
            let mut databases = self.databases.write();
            undo(&mut *databases);
            self.commit(&databases)
        };
        if let Err(e) = self.persist(generation, &listing) {
            tracing::warn!("Failed to rewrite catalog listing: {}", e);
        }
    }

    /// Write the listing atomically (temp file + rename)
    ///
    /// Skipped when a newer generation is already on disk.
    fn persist(&self, generation: u64, listing: &CatalogListing) -> Result<()> {
        let mut persisted = self.persisted.lock();
        if *persisted >= generation {
            return Ok(());
        }

        let bytes = bincode::serialize(listing).map_err(|e| LaneError::Encode(e.to_string()))?;

        let path = self.config.catalog_path();
        let tmp = path.with_extension("bin.tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        *persisted = generation;
        Ok(())
    }
}

/// Reject a store location that would share files with anything else
///
/// All paths are canonical.
fn check_location(id: &str, root: &Path, path: &Path, databases: &DatabaseMap) -> Result<()> {
    if root.starts_with(path) {
        return Err(LaneError::InvalidDatabasePath(format!(
            "{} contains the data directory",
            path.display()
        )));
    }
    if path.starts_with(root) && path != root.join(id) {
        return Err(LaneError::InvalidDatabasePath(format!(
            "{} is inside the data directory; only {} may be used there",
            path.display(),
            root.join(id).display()
        )));
    }

    for db in databases.values() {
        if path.starts_with(db.path()) || db.path().starts_with(path) {
            return Err(LaneError::InvalidDatabasePath(format!(
                "{} overlaps database {} at {}",
                path.display(),
                db.id(),
                db.path().display()
            )));
        }
    }
    Ok(())
}

/// Ids double as directory names: one plain path component, nothing else
fn validate_name(id: &str) -> Result<()> {
    let mut components = Path::new(id).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );

    if id.is_empty() || !single_normal || id.contains(['/', '\\']) {
        return Err(LaneError::InvalidDatabaseName(id.to_string()));
    }
    Ok(())
}
