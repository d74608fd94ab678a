//! Codec Tests
//!
//! Tests for request and response encoding/decoding.

use std::sync::Arc;

use bytes::Bytes;
use lanekv::protocol::{
    decode_request, decode_response, encode_request, encode_response, ErrorCode, Request,
    Response, Source, Status,
};
use lanekv::transport::{MemorySocket, Socket};
use lanekv::LaneError;

fn memory_source(identity: &'static [u8]) -> Source {
    let socket: Arc<dyn Socket> = Arc::new(MemorySocket::new());
    Source::new(Bytes::from_static(identity), socket)
}

// =============================================================================
// Request Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_encode_decode_database_request() {
    let request = Request::new("PUT", "shop", vec![b"a".to_vec(), b"1".to_vec()]);
    let decoded = decode_request(&encode_request(&request).unwrap()).unwrap();

    assert_eq!(decoded.command, "PUT");
    assert_eq!(decoded.db_uid, "shop");
    assert_eq!(decoded.args, vec![b"a".to_vec(), b"1".to_vec()]);
    assert!(!decoded.is_catalog_level());
}

#[test]
fn test_encode_decode_catalog_request() {
    let request = Request::catalog("create", vec![b"shop".to_vec()]);
    let decoded = decode_request(&encode_request(&request).unwrap()).unwrap();

    assert_eq!(decoded, request);
    assert!(decoded.is_catalog_level());
    assert_eq!(decoded.command_name(), "CREATE");
}

#[test]
fn test_encode_decode_binary_args() {
    let blob: Vec<u8> = (0..=255).collect();
    let request = Request::new("PUT", "bin", vec![vec![], blob.clone()]);
    let decoded = decode_request(&encode_request(&request).unwrap()).unwrap();

    assert_eq!(decoded.args[0], Vec::<u8>::new());
    assert_eq!(decoded.args[1], blob);
}

#[test]
fn test_source_is_not_serialized() {
    let mut request = Request::new("GET", "shop", vec![b"a".to_vec()]);
    request.attach_source(memory_source(b"client-1")).unwrap();

    let with_source = encode_request(&request).unwrap();
    let without_source = encode_request(&Request::new("GET", "shop", vec![b"a".to_vec()])).unwrap();
    assert_eq!(with_source, without_source);

    let decoded = decode_request(&with_source).unwrap();
    assert!(decoded.source().is_none());
}

#[test]
fn test_decode_garbage_is_decode_error() {
    let result = decode_request(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);
    assert!(matches!(result, Err(LaneError::Decode(_))));
}

#[test]
fn test_decode_truncated_request() {
    let bytes = encode_request(&Request::new("PUT", "shop", vec![b"key".to_vec()])).unwrap();
    let result = decode_request(&bytes[..bytes.len() - 2]);
    assert!(matches!(result, Err(LaneError::Decode(_))));
}

#[test]
fn test_decode_rejects_trailing_bytes() {
    let mut bytes = encode_request(&Request::catalog("LIST", vec![])).unwrap();
    bytes.push(0);
    assert!(matches!(decode_request(&bytes), Err(LaneError::Decode(_))));
}

#[test]
fn test_decode_empty_payload() {
    assert!(matches!(decode_request(&[]), Err(LaneError::Decode(_))));
}

// =============================================================================
// Source Tests
// =============================================================================

#[test]
fn test_attach_source_once() {
    let mut request = Request::catalog("LIST", vec![]);
    assert!(request.source().is_none());

    request.attach_source(memory_source(b"first")).unwrap();
    assert_eq!(request.source().unwrap().identity.as_ref(), b"first");

    let second = request.attach_source(memory_source(b"second"));
    assert!(second.is_err());
    assert_eq!(request.source().unwrap().identity.as_ref(), b"first");
}

// =============================================================================
// Argument Helper Tests
// =============================================================================

#[test]
fn test_expect_args() {
    let request = Request::new("PUT", "db", vec![b"k".to_vec()]);

    assert!(request.expect_args(1, 1).is_ok());
    assert!(request.expect_args(0, 2).is_ok());
    assert!(matches!(
        request.expect_args(2, 2),
        Err(LaneError::InvalidArguments(_))
    ));
}

#[test]
fn test_arg_access() {
    let request = Request::new("GET", "db", vec![b"key".to_vec(), vec![0xff]]);

    assert_eq!(request.arg(0).unwrap(), b"key");
    assert_eq!(request.arg_str(0).unwrap(), "key");
    assert!(matches!(request.arg_str(1), Err(LaneError::InvalidArguments(_))));
    assert!(matches!(request.arg(2), Err(LaneError::InvalidArguments(_))));
}

// =============================================================================
// Response Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_encode_decode_ok_response() {
    let response = Response::ok(vec![b"v1".to_vec(), b"v2".to_vec()]);
    let decoded = decode_response(&encode_response(&response).unwrap()).unwrap();

    assert_eq!(decoded, response);
    assert!(decoded.is_success());
    assert_eq!(decoded.error_code(), None);
}

#[test]
fn test_encode_decode_error_response() {
    let response = Response::error(ErrorCode::KeyNotFound, "Key not found");
    let decoded = decode_response(&encode_response(&response).unwrap()).unwrap();

    assert_eq!(decoded.status, Status::Failure);
    assert_eq!(decoded.error_code(), Some(ErrorCode::KeyNotFound));
    assert_eq!(decoded.error.unwrap().message, "Key not found");
    assert!(decoded.data.is_empty());
}

#[test]
fn test_decode_response_garbage() {
    assert!(matches!(decode_response(&[0x09]), Err(LaneError::Decode(_))));
}

#[test]
fn test_response_from_error_codes() {
    let cases = [
        (LaneError::KeyNotFound, ErrorCode::KeyNotFound),
        (
            LaneError::InvalidArguments("x".to_string()),
            ErrorCode::InvalidArguments,
        ),
        (
            LaneError::DatabaseNotFound("x".to_string()),
            ErrorCode::DatabaseNotFound,
        ),
        (
            LaneError::DatabaseExists("x".to_string()),
            ErrorCode::DatabaseExists,
        ),
        (
            LaneError::InvalidDatabaseName("../x".to_string()),
            ErrorCode::InvalidArguments,
        ),
        (
            LaneError::InvalidDatabasePath("/srv/data".to_string()),
            ErrorCode::InvalidArguments,
        ),
        (LaneError::Busy("x".to_string()), ErrorCode::Busy),
        (LaneError::Storage("x".to_string()), ErrorCode::Storage),
        (LaneError::Transport("x".to_string()), ErrorCode::Internal),
    ];

    for (err, code) in cases {
        let response = Response::from_error(&err);
        assert_eq!(response.status, Status::Failure);
        assert_eq!(response.error_code(), Some(code), "for {:?}", err);
        assert_eq!(response.error.unwrap().message, err.to_string());
    }
}
