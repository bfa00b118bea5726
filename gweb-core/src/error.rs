//! The call-level error type and the error extraction pipeline.
//!
//! Three independent sources can declare a call failed: the binary
//! `grpc-status-details-bin` payload, the textual `grpc-status` /
//! `grpc-message` pair, and the HTTP status. They are merged with a fixed
//! precedence (binary details, then textual status, then HTTP status); the
//! first source that produces an error wins.

use http::HeaderMap;
use prost::Message;

use crate::status::StatusCode;
use crate::trailer::{decode_base64_value, percent_decode_value};

/// The sole error type a call surfaces.
///
/// Delivered through `on_close` exactly once per failed call; never thrown
/// across the callback boundary.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct TransportError {
    /// Canonical gRPC status code; never [`StatusCode::Ok`].
    pub code: StatusCode,
    /// Human-readable message, percent-decoded where the wire encodes it.
    pub message: String,
    /// Structured details carried by `grpc-status-details-bin`.
    pub details: Vec<prost_types::Any>,
}

impl TransportError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Merge the error sources visible when response headers arrive:
    /// binary details, textual status, HTTP status.
    pub fn from_response(status: http::StatusCode, headers: &HeaderMap) -> Option<Self> {
        details_error(headers)
            .or_else(|| textual_error(headers))
            .or_else(|| http_error(status, headers))
    }

    /// Merge the error sources visible in a parsed TRAILER frame: binary
    /// details, then textual status.
    pub fn from_trailer(trailer: &HeaderMap) -> Option<Self> {
        details_error(trailer).or_else(|| textual_error(trailer))
    }
}

/// `google.rpc.Status`, the schema of the `grpc-status-details-bin` payload.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Status {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "3")]
    pub details: ::prost::alloc::vec::Vec<::prost_types::Any>,
}

fn details_error(headers: &HeaderMap) -> Option<TransportError> {
    let value = headers.get("grpc-status-details-bin")?;
    let invalid = || TransportError::new(StatusCode::Internal, "invalid grpc-status-details-bin");

    let Some(bytes) = decode_base64_value(value) else {
        return Some(invalid());
    };
    let Ok(status) = Status::decode(bytes.as_slice()) else {
        return Some(invalid());
    };
    match StatusCode::from_i32(status.code) {
        Some(StatusCode::Ok) => None,
        Some(code) => Some(TransportError {
            code,
            message: status.message,
            details: status.details,
        }),
        None => Some(invalid()),
    }
}

fn textual_error(headers: &HeaderMap) -> Option<TransportError> {
    let value = headers.get("grpc-status")?;
    let raw = String::from_utf8_lossy(value.as_bytes());
    match raw.trim().parse::<i32>().ok().and_then(StatusCode::from_i32) {
        Some(StatusCode::Ok) => None,
        Some(code) => Some(TransportError::new(code, grpc_message(headers))),
        None => Some(TransportError::new(
            StatusCode::DataLoss,
            format!("invalid grpc-status: {raw}"),
        )),
    }
}

fn http_error(status: http::StatusCode, headers: &HeaderMap) -> Option<TransportError> {
    match StatusCode::from_http(status) {
        StatusCode::Ok => None,
        code => Some(TransportError::new(code, grpc_message(headers))),
    }
}

fn grpc_message(headers: &HeaderMap) -> String {
    headers
        .get("grpc-message")
        .map(percent_decode_value)
        .unwrap_or_default()
}
