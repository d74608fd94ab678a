//! Client
//!
//! Blocking client for a lanekv server: one request, one response.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::time::Duration;

use crate::error::{LaneError, Result};
use crate::protocol::{decode_response, encode_request, Request, Response, MAX_MESSAGE_SIZE};
use crate::transport::{read_frames, write_frames};

pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    /// Connect to a server
    pub fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;

        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
        })
    }

    /// Give up on a reply after `timeout` (`None` waits forever)
    ///
    /// The server never answers some requests, e.g. those naming an unknown
    /// database, so callers that may send them should set this.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)?;
        Ok(())
    }

    /// Send a request without waiting for its response
    pub fn send(&mut self, request: &Request) -> Result<()> {
        let payload = encode_request(request)?;
        write_frames(&mut self.writer, &[&payload])
    }

    /// Wait for the next response
    pub fn recv(&mut self) -> Result<Response> {
        let mut frames = read_frames(&mut self.reader, MAX_MESSAGE_SIZE as usize)?;
        if frames.len() != 1 {
            return Err(LaneError::Transport(format!(
                "Expected 1 frame, got {}",
                frames.len()
            )));
        }
        decode_response(&frames.remove(0))
    }

    /// Send a request and wait for its response
    pub fn call(&mut self, request: &Request) -> Result<Response> {
        self.send(request)?;
        self.recv()
    }

    // =========================================================================
    // Convenience wrappers
    // =========================================================================

    pub fn create(&mut self, name: &str) -> Result<Response> {
        self.call(&Request::catalog("CREATE", vec![name.as_bytes().to_vec()]))
    }

    pub fn drop_database(&mut self, name: &str) -> Result<Response> {
        self.call(&Request::catalog("DROP", vec![name.as_bytes().to_vec()]))
    }

    pub fn list(&mut self) -> Result<Response> {
        self.call(&Request::catalog("LIST", Vec::new()))
    }

    pub fn put(&mut self, db: &str, key: &[u8], value: &[u8]) -> Result<Response> {
        self.call(&Request::new("PUT", db, vec![key.to_vec(), value.to_vec()]))
    }

    pub fn get(&mut self, db: &str, key: &[u8]) -> Result<Response> {
        self.call(&Request::new("GET", db, vec![key.to_vec()]))
    }

    pub fn delete(&mut self, db: &str, key: &[u8]) -> Result<Response> {
        self.call(&Request::new("DELETE", db, vec![key.to_vec()]))
    }
}
