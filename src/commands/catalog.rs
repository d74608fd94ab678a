//! Catalog-level commands

use std::path::PathBuf;

use super::{CatalogCommand, CommandTable, PONG};
use crate::catalog::Catalog;
use crate::error::{LaneError, Result};
use crate::protocol::{Request, Response};

pub(super) fn table() -> CommandTable<dyn CatalogCommand> {
    CommandTable::<dyn CatalogCommand>::new()
        .register("CREATE", Box::new(create))
        .register("DROP", Box::new(drop_database))
        .register("LIST", Box::new(list))
        .register("MOUNT", Box::new(mount))
        .register("UNMOUNT", Box::new(unmount))
        .register("CONNECT", Box::new(connect))
        .register("PING", Box::new(ping))
}

/// CREATE name [path]
fn create(catalog: &Catalog, request: &Request) -> Result<Response> {
    request.expect_args(1, 2)?;
    let name = request.arg_str(0)?;
    let path = match request.args.get(1) {
        Some(_) => Some(PathBuf::from(request.arg_str(1)?)),
        None => None,
    };

    catalog.create(name, path)?;
    Ok(Response::empty())
}

/// DROP name
fn drop_database(catalog: &Catalog, request: &Request) -> Result<Response> {
    request.expect_args(1, 1)?;
    catalog.remove(request.arg_str(0)?)?;
    Ok(Response::empty())
}

/// LIST
fn list(catalog: &Catalog, request: &Request) -> Result<Response> {
    request.expect_args(0, 0)?;
    let names = catalog.list().into_iter().map(String::into_bytes).collect();
    Ok(Response::ok(names))
}

/// MOUNT name
fn mount(catalog: &Catalog, request: &Request) -> Result<Response> {
    request.expect_args(1, 1)?;
    catalog.mount(request.arg_str(0)?)?;
    Ok(Response::empty())
}

/// UNMOUNT name
fn unmount(catalog: &Catalog, request: &Request) -> Result<Response> {
    request.expect_args(1, 1)?;
    catalog.unmount(request.arg_str(0)?)?;
    Ok(Response::empty())
}

/// CONNECT name: confirms the database exists
fn connect(catalog: &Catalog, request: &Request) -> Result<Response> {
    request.expect_args(1, 1)?;
    let name = request.arg_str(0)?;
    match catalog.resolve(name) {
        Some(db) => Ok(Response::ok(vec![db.id().as_bytes().to_vec()])),
        None => Err(LaneError::DatabaseNotFound(name.to_string())),
    }
}

fn ping(_catalog: &Catalog, _request: &Request) -> Result<Response> {
    Ok(Response::ok(vec![PONG.to_vec()]))
}
