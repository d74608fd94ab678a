//! Database-level commands
//!
//! Every handler runs on the database's consumer thread with exclusive
//! access to the store.

use super::{CommandTable, DatabaseCommand, PONG};
use crate::error::{LaneError, Result};
use crate::protocol::{Request, Response};
use crate::storage::{Store, WriteBatch};

pub(super) fn table() -> CommandTable<dyn DatabaseCommand> {
    CommandTable::<dyn DatabaseCommand>::new()
        .register("GET", Box::new(get))
        .register("MGET", Box::new(mget))
        .register("PUT", Box::new(put))
        .register("DELETE", Box::new(delete))
        .register("EXISTS", Box::new(exists))
        .register("RANGE", Box::new(range))
        .register("SLICE", Box::new(slice))
        .register("BATCH", Box::new(batch))
        .register("PING", Box::new(ping))
}

/// GET key
fn get(store: &mut Store, request: &Request) -> Result<Response> {
    request.expect_args(1, 1)?;
    let value = store.get(request.arg(0)?).ok_or(LaneError::KeyNotFound)?;
    Ok(Response::ok(vec![value.to_vec()]))
}

/// MGET key...: missing keys yield empty values
fn mget(store: &mut Store, request: &Request) -> Result<Response> {
    let values = request
        .args
        .iter()
        .map(|key| store.get(key).map(<[u8]>::to_vec).unwrap_or_default())
        .collect();
    Ok(Response::ok(values))
}

/// PUT key value
fn put(store: &mut Store, request: &Request) -> Result<Response> {
    request.expect_args(2, 2)?;
    store.put(request.arg(0)?, request.arg(1)?)?;
    Ok(Response::empty())
}

/// DELETE key
fn delete(store: &mut Store, request: &Request) -> Result<Response> {
    request.expect_args(1, 1)?;
    store.delete(request.arg(0)?)?;
    Ok(Response::empty())
}

/// EXISTS key
fn exists(store: &mut Store, request: &Request) -> Result<Response> {
    request.expect_args(1, 1)?;
    let flag = if store.exists(request.arg(0)?) { b"1" } else { b"0" };
    Ok(Response::ok(vec![flag.to_vec()]))
}

/// RANGE from to: both bounds inclusive
fn range(store: &mut Store, request: &Request) -> Result<Response> {
    request.expect_args(2, 2)?;
    let pairs = store.range(request.arg(0)?, request.arg(1)?);
    Ok(Response::ok(flatten(pairs)))
}

/// SLICE from limit
fn slice(store: &mut Store, request: &Request) -> Result<Response> {
    request.expect_args(2, 2)?;
    let limit: usize = request.arg_str(1)?.parse().map_err(|_| {
        LaneError::InvalidArguments("SLICE limit must be a non-negative integer".to_string())
    })?;
    let pairs = store.slice(request.arg(0)?, limit);
    Ok(Response::ok(flatten(pairs)))
}

/// BATCH (PUT key value | DELETE key)...
fn batch(store: &mut Store, request: &Request) -> Result<Response> {
    let mut batch = WriteBatch::new();
    let mut args = request.args.iter();

    while let Some(op) = args.next() {
        match op.to_ascii_uppercase().as_slice() {
            b"PUT" => {
                let (Some(key), Some(value)) = (args.next(), args.next()) else {
                    return Err(LaneError::InvalidArguments(
                        "BATCH PUT expects a key and a value".to_string(),
                    ));
                };
                batch.put(key.as_slice(), value.as_slice());
            }
            b"DELETE" => {
                let Some(key) = args.next() else {
                    return Err(LaneError::InvalidArguments(
                        "BATCH DELETE expects a key".to_string(),
                    ));
                };
                batch.delete(key.as_slice());
            }
            other => {
                return Err(LaneError::InvalidArguments(format!(
                    "Unknown BATCH operation {}",
                    String::from_utf8_lossy(other)
                )));
            }
        }
    }

    store.write_batch(batch)?;
    Ok(Response::empty())
}

fn ping(_store: &mut Store, _request: &Request) -> Result<Response> {
    Ok(Response::ok(vec![PONG.to_vec()]))
}

/// [(k, v)] → [k, v, k, v, ...]
fn flatten(pairs: Vec<(Vec<u8>, Vec<u8>)>) -> Vec<Vec<u8>> {
    let mut data = Vec::with_capacity(pairs.len() * 2);
    for (key, value) in pairs {
        data.push(key);
        data.push(value);
    }
    data
}
