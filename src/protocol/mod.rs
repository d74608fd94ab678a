//! Protocol Module
//!
//! Request and response messages and their binary codec.
//!
//! ## Request
//! ```text
//! ┌──────────────┬──────────────┬──────────────────────────┐
//! │ command: str │ db_uid: str  │ args: [bytes]            │
//! └──────────────┴──────────────┴──────────────────────────┘
//! ```
//! An empty `db_uid` makes the request catalog-level.
//!
//! ## Response
//! ```text
//! ┌──────────────┬──────────────────────────┬──────────────┐
//! │ status       │ error: {code, message}?  │ data: [bytes]│
//! └──────────────┴──────────────────────────┴──────────────┘
//! ```
//!
//! Both are encoded with bincode. The request's reply address ([`Source`])
//! never goes on the wire.

mod codec;
mod request;
mod response;

pub use codec::{
    decode_request, decode_response, encode_request, encode_response, MAX_MESSAGE_SIZE,
};
pub use request::{Request, Source};
pub use response::{ErrorCode, Response, ResponseError, Status};
