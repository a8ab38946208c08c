// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Wire encoding of peer requests and responses.
//!
//! [`FetchRequest`] and [`FetchResponse`] are protobuf messages equivalent to:
//!
//! ```protobuf
//! message Request {
//!   string group = 1;
//!   string key = 2;
//! }
//!
//! message Response {
//!   bytes value = 1;
//! }
//! ```
//!
//! Empty fields are omitted when encoding and default to empty when decoding. Unknown fields
//! are skipped.

use bytes::Bytes;
use prost::Message;

use crate::{Error, FetchRequest, FetchResponse};

/// Encodes a request.
#[must_use]
pub fn encode_request(request: &FetchRequest) -> Bytes {
    Bytes::from(request.encode_to_vec())
}

/// Decodes a request.
///
/// # Errors
///
/// Returns [`ErrorKind::Decode`](crate::ErrorKind::Decode) if `data` is not a well-formed
/// request.
pub fn decode_request(data: &[u8]) -> Result<FetchRequest, Error> {
    FetchRequest::decode(data).map_err(Error::decode)
}

/// Encodes a response.
#[must_use]
pub fn encode_response(response: &FetchResponse) -> Bytes {
    Bytes::from(response.encode_to_vec())
}

/// Decodes a response.
///
/// # Errors
///
/// Returns [`ErrorKind::Decode`](crate::ErrorKind::Decode) if `data` is not a well-formed
/// response.
pub fn decode_response(data: &[u8]) -> Result<FetchResponse, Error> {
    FetchResponse::decode(data).map_err(Error::decode)
}
