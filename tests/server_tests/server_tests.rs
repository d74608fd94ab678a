//! Server Tests
//!
//! End-to-end tests over TCP: a real server on an ephemeral port and
//! blocking clients.

use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use lanekv::catalog::DEFAULT_DATABASE;
use lanekv::protocol::{ErrorCode, Request};
use lanekv::router::ShutdownHandle;
use lanekv::config::ConfigBuilder;
use lanekv::{Catalog, Client, Config, Server};
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(10);

struct TestServer {
    addr: String,
    catalog: Arc<Catalog>,
    shutdown: ShutdownHandle,
    thread: JoinHandle<lanekv::Result<()>>,
}

fn test_config(dir: &Path) -> ConfigBuilder {
    Config::builder()
        .data_dir(dir)
        .endpoint("127.0.0.1:0")
        .poll_interval_ms(10)
}

impl TestServer {
    fn start(dir: &Path) -> Self {
        Self::start_with(test_config(dir).build())
    }

    fn start_with(config: Config) -> Self {
        let server = Server::bind(config).unwrap();

        let addr = server.local_addr().to_string();
        let catalog = Arc::clone(server.catalog());
        let shutdown = server.shutdown_handle();
        let thread = thread::spawn(move || server.run());

        Self {
            addr,
            catalog,
            shutdown,
            thread,
        }
    }

    fn client(&self) -> Client {
        let mut client = Client::connect(&self.addr).unwrap();
        client.set_timeout(Some(WAIT)).unwrap();
        client
    }

    fn stop(self) {
        self.shutdown.shutdown();
        self.thread.join().unwrap().unwrap();
    }
}

/// A client that queues `count` reads of a large value on `db` and never
/// collects the replies
fn stall(server: &TestServer, db: &str, count: usize) -> Client {
    let mut stalled = server.client();
    let request = Request::new("GET", db, vec![b"big".to_vec()]);
    for _ in 0..count {
        stalled.send(&request).unwrap();
    }
    stalled
}

fn strings(data: &[Vec<u8>]) -> Vec<String> {
    data.iter()
        .map(|d| String::from_utf8(d.clone()).unwrap())
        .collect()
}

// =============================================================================
// Startup
// =============================================================================

#[test]
fn test_fresh_server_has_default_database() {
    let temp = TempDir::new().unwrap();
    let server = TestServer::start(temp.path());

    let response = server.client().list().unwrap();
    assert_eq!(strings(&response.data), vec![DEFAULT_DATABASE]);

    server.stop();
}

#[test]
fn test_bind_rejects_invalid_config() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp.path())
        .endpoint("127.0.0.1:0")
        .inbox_capacity(0)
        .build();

    assert!(Server::bind(config).is_err());
}

// =============================================================================
// Request Flow
// =============================================================================

#[test]
fn test_create_put_get() {
    let temp = TempDir::new().unwrap();
    let server = TestServer::start(temp.path());
    let mut client = server.client();

    assert!(client.create("shop").unwrap().is_success());
    let db = server.catalog.resolve("shop").unwrap();
    assert!(!db.is_mounted());

    assert!(client.put("shop", b"a", b"1").unwrap().is_success());
    assert!(db.is_mounted());

    let response = client.get("shop", b"a").unwrap();
    assert_eq!(response.data, vec![b"1".to_vec()]);

    let missing = client.get("shop", b"b").unwrap();
    assert_eq!(missing.error_code(), Some(ErrorCode::KeyNotFound));

    server.stop();
}

#[test]
fn test_concurrent_clients_same_database() {
    let temp = TempDir::new().unwrap();
    let server = TestServer::start(temp.path());
    assert!(server.client().create("shop").unwrap().is_success());

    let writers: Vec<_> = (0..2)
        .map(|c| {
            let mut client = server.client();
            thread::spawn(move || {
                for i in 0..1000 {
                    let key = format!("c{}-{:04}", c, i);
                    let response = client.put("shop", key.as_bytes(), b"v").unwrap();
                    assert!(response.is_success(), "{} failed: {:?}", key, response);
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let mut client = server.client();
    let range = client
        .call(&Request::new("RANGE", "shop", vec![b"c".to_vec(), b"c~".to_vec()]))
        .unwrap();
    assert_eq!(range.data.len(), 2 * 2000);
    assert_eq!(server.catalog.resolve("shop").unwrap().mount_count(), 1);

    server.stop();
}

#[test]
fn test_pipelined_requests_answered_in_order() {
    let temp = TempDir::new().unwrap();
    let server = TestServer::start(temp.path());
    let mut client = server.client();

    for i in 0..50 {
        let request = Request::new(
            "PUT",
            DEFAULT_DATABASE,
            vec![b"counter".to_vec(), i.to_string().into_bytes()],
        );
        client.send(&request).unwrap();
    }
    for _ in 0..50 {
        assert!(client.recv().unwrap().is_success());
    }

    let response = client.get(DEFAULT_DATABASE, b"counter").unwrap();
    assert_eq!(response.data, vec![b"49".to_vec()]);

    server.stop();
}

#[test]
fn test_unknown_database_gets_no_reply() {
    let temp = TempDir::new().unwrap();
    let server = TestServer::start(temp.path());
    let mut client = server.client();

    client.set_timeout(Some(Duration::from_millis(300))).unwrap();
    assert!(client.get("ghost", b"a").is_err());

    // The connection is still usable
    client.set_timeout(Some(WAIT)).unwrap();
    let ping = client.call(&Request::catalog("PING", Vec::new())).unwrap();
    assert_eq!(ping.data, vec![b"PONG".to_vec()]);

    server.stop();
}

#[test]
fn test_drop_database() {
    let temp = TempDir::new().unwrap();
    let server = TestServer::start(temp.path());
    let mut client = server.client();

    client.create("scratch").unwrap();
    client.put("scratch", b"k", b"v").unwrap();
    let dir = server.catalog.resolve("scratch").unwrap().path().to_path_buf();

    assert!(client.drop_database("scratch").unwrap().is_success());
    assert!(!dir.exists());
    assert_eq!(
        strings(&client.list().unwrap().data),
        vec![DEFAULT_DATABASE]
    );

    server.stop();
}

// =============================================================================
// Slow Clients
// =============================================================================

#[test]
fn test_client_that_stops_reading_is_disconnected() {
    let temp = TempDir::new().unwrap();
    let server = TestServer::start_with(test_config(temp.path()).write_timeout_ms(200).build());
    let mut client = server.client();

    let big = vec![7u8; 1024 * 1024];
    assert!(client.put(DEFAULT_DATABASE, b"big", &big).unwrap().is_success());

    let _stalled = stall(&server, DEFAULT_DATABASE, 64);
    thread::sleep(Duration::from_millis(300));

    // The lane drains once the stalled client is dropped
    assert!(client.put(DEFAULT_DATABASE, b"a", b"1").unwrap().is_success());
    let response = client.get(DEFAULT_DATABASE, b"a").unwrap();
    assert_eq!(response.data, vec![b"1".to_vec()]);

    server.stop();
}

#[test]
fn test_blocked_database_does_not_hold_up_others() {
    let temp = TempDir::new().unwrap();
    let server = TestServer::start_with(test_config(temp.path()).write_timeout_ms(3000).build());
    let mut client = server.client();

    client.create("other").unwrap();
    assert!(client.put("other", b"a", b"1").unwrap().is_success());
    let big = vec![7u8; 1024 * 1024];
    assert!(client.put(DEFAULT_DATABASE, b"big", &big).unwrap().is_success());

    // The default lane is now stuck writing to a client that never reads
    let _stalled = stall(&server, DEFAULT_DATABASE, 128);
    thread::sleep(Duration::from_millis(200));

    let started = Instant::now();
    let response = client.get("other", b"a").unwrap();
    assert_eq!(response.data, vec![b"1".to_vec()]);
    assert!(started.elapsed() < Duration::from_millis(1500));

    let ping = client.call(&Request::catalog("PING", Vec::new())).unwrap();
    assert_eq!(ping.data, vec![b"PONG".to_vec()]);
    assert!(started.elapsed() < Duration::from_millis(1500));

    // And the default lane recovers after the write timeout
    assert!(client.put(DEFAULT_DATABASE, b"a", b"2").unwrap().is_success());

    server.stop();
}

// =============================================================================
// Restart
// =============================================================================

#[test]
fn test_restart_keeps_catalog_and_data() {
    let temp = TempDir::new().unwrap();
    {
        let server = TestServer::start(temp.path());
        let mut client = server.client();
        client.create("shop").unwrap();
        client.put("shop", b"a", b"1").unwrap();
        client.delete("shop", b"a").unwrap();
        client.put("shop", b"b", b"2").unwrap();
        server.stop();
    }

    let server = TestServer::start(temp.path());
    let mut client = server.client();

    assert_eq!(
        strings(&client.list().unwrap().data),
        vec![DEFAULT_DATABASE, "shop"]
    );
    assert_eq!(
        client.get("shop", b"a").unwrap().error_code(),
        Some(ErrorCode::KeyNotFound)
    );
    assert_eq!(client.get("shop", b"b").unwrap().data, vec![b"2".to_vec()]);

    server.stop();
}
