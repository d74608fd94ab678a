//! Command tables
//!
//! Two independent namespaces, looked up by (upper-cased) name:
//!
//! | Table      | Context        | Used for                          |
//! |------------|----------------|-----------------------------------|
//! | catalog    | `&Catalog`     | requests with an empty `db_uid`   |
//! | database   | `&mut Store`   | requests naming a database        |
//!
//! Both tables are built once and never change afterwards. Handlers are
//! plain functions returning `Result<Response>`; any error they return is
//! turned into a failure response, so execution always yields a reply.

mod catalog;
mod database;

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::protocol::{Request, Response};
use crate::storage::Store;

/// A command operating on the catalog
pub trait CatalogCommand: Send + Sync {
    fn execute(&self, catalog: &Catalog, request: &Request) -> Response;
}

/// A command operating on one mounted database's store
pub trait DatabaseCommand: Send + Sync {
    fn execute(&self, store: &mut Store, request: &Request) -> Response;
}

impl<F> CatalogCommand for F
where
    F: Fn(&Catalog, &Request) -> Result<Response> + Send + Sync,
{
    fn execute(&self, catalog: &Catalog, request: &Request) -> Response {
        self(catalog, request).unwrap_or_else(|e| Response::from_error(&e))
    }
}

impl<F> DatabaseCommand for F
where
    F: Fn(&mut Store, &Request) -> Result<Response> + Send + Sync,
{
    fn execute(&self, store: &mut Store, request: &Request) -> Response {
        self(store, request).unwrap_or_else(|e| Response::from_error(&e))
    }
}

/// Name → handler registry
pub struct CommandTable<H: ?Sized> {
    handlers: HashMap<&'static str, Box<H>>,
}

impl<H: ?Sized> CommandTable<H> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` under `name` (expected upper-case)
    pub fn register(mut self, name: &'static str, handler: Box<H>) -> Self {
        self.handlers.insert(name, handler);
        self
    }

    pub fn get(&self, name: &str) -> Option<&H> {
        self.handlers.get(name).map(Box::as_ref)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl<H: ?Sized> Default for CommandTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// The catalog-level command table
pub fn catalog_commands() -> &'static CommandTable<dyn CatalogCommand> {
    static TABLE: OnceLock<CommandTable<dyn CatalogCommand>> = OnceLock::new();
    TABLE.get_or_init(catalog::table)
}

/// The database-level command table
pub fn database_commands() -> &'static CommandTable<dyn DatabaseCommand> {
    static TABLE: OnceLock<CommandTable<dyn DatabaseCommand>> = OnceLock::new();
    TABLE.get_or_init(database::table)
}

/// Reply data for commands that answer a health check
const PONG: &[u8] = b"PONG";
