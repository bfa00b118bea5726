//! gRPC status codes and the fixed HTTP status mapping.

use std::fmt;

/// Canonical gRPC status codes
/// (<https://grpc.github.io/grpc/core/md_doc_statuscodes.html>).
///
/// [`StatusCode::Ok`] is the only non-error code; every other code surfaces
/// to callers as a [`TransportError`](crate::TransportError).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum StatusCode {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl StatusCode {
    /// Parse a status code from its wire integer.
    ///
    /// Returns `None` outside the canonical `0..=16` range; the trailer
    /// extractor reports those as [`StatusCode::DataLoss`].
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            1 => Some(Self::Cancelled),
            2 => Some(Self::Unknown),
            3 => Some(Self::InvalidArgument),
            4 => Some(Self::DeadlineExceeded),
            5 => Some(Self::NotFound),
            6 => Some(Self::AlreadyExists),
            7 => Some(Self::PermissionDenied),
            8 => Some(Self::ResourceExhausted),
            9 => Some(Self::FailedPrecondition),
            10 => Some(Self::Aborted),
            11 => Some(Self::OutOfRange),
            12 => Some(Self::Unimplemented),
            13 => Some(Self::Internal),
            14 => Some(Self::Unavailable),
            15 => Some(Self::DataLoss),
            16 => Some(Self::Unauthenticated),
            _ => None,
        }
    }

    /// Map an HTTP response status to the code a gRPC-Web response without
    /// a `grpc-status` implies.
    pub fn from_http(status: http::StatusCode) -> Self {
        match status.as_u16() {
            200 => Self::Ok,
            400 => Self::Internal,
            401 => Self::Unauthenticated,
            403 => Self::PermissionDenied,
            404 => Self::Unimplemented,
            429 | 502 | 503 | 504 => Self::Unavailable,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Unknown => write!(f, "UNKNOWN"),
            Self::InvalidArgument => write!(f, "INVALID_ARGUMENT"),
            Self::DeadlineExceeded => write!(f, "DEADLINE_EXCEEDED"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::AlreadyExists => write!(f, "ALREADY_EXISTS"),
            Self::PermissionDenied => write!(f, "PERMISSION_DENIED"),
            Self::ResourceExhausted => write!(f, "RESOURCE_EXHAUSTED"),
            Self::FailedPrecondition => write!(f, "FAILED_PRECONDITION"),
            Self::Aborted => write!(f, "ABORTED"),
            Self::OutOfRange => write!(f, "OUT_OF_RANGE"),
            Self::Unimplemented => write!(f, "UNIMPLEMENTED"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::DataLoss => write!(f, "DATA_LOSS"),
            Self::Unauthenticated => write!(f, "UNAUTHENTICATED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_integer_round_trip() {
        for value in 0..=16 {
            let code = StatusCode::from_i32(value).unwrap();
            assert_eq!(code as i32, value);
        }
    }

    #[test]
    fn out_of_range_values_rejected() {
        assert_eq!(StatusCode::from_i32(-1), None);
        assert_eq!(StatusCode::from_i32(17), None);
        assert_eq!(StatusCode::from_i32(999), None);
    }

    #[test]
    fn http_status_mapping() {
        let map = |status: u16| StatusCode::from_http(http::StatusCode::from_u16(status).unwrap());

        assert_eq!(map(200), StatusCode::Ok);
        assert_eq!(map(400), StatusCode::Internal);
        assert_eq!(map(401), StatusCode::Unauthenticated);
        assert_eq!(map(403), StatusCode::PermissionDenied);
        assert_eq!(map(404), StatusCode::Unimplemented);
        assert_eq!(map(429), StatusCode::Unavailable);
        assert_eq!(map(502), StatusCode::Unavailable);
        assert_eq!(map(503), StatusCode::Unavailable);
        assert_eq!(map(504), StatusCode::Unavailable);
        assert_eq!(map(418), StatusCode::Unknown);
        assert_eq!(map(500), StatusCode::Unknown);
    }

    #[test]
    fn display_names() {
        assert_eq!(StatusCode::Ok.to_string(), "OK");
        assert_eq!(StatusCode::DataLoss.to_string(), "DATA_LOSS");
        assert_eq!(StatusCode::Unauthenticated.to_string(), "UNAUTHENTICATED");
    }
}
