//! Trailer payload parsing and header value decoding.

use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::{alphabet, Engine as _};
use http::{HeaderMap, HeaderName, HeaderValue};
use percent_encoding::percent_decode;

/// Parse a TRAILER frame payload into a header map.
///
/// The payload is CRLF-separated `name: value` text. Lines without a colon,
/// with an empty name, or with a name or value the HTTP grammar rejects are
/// skipped. Repeated names accumulate as multiple values.
pub fn parse_trailer(payload: &[u8]) -> HeaderMap {
    let text = String::from_utf8_lossy(payload);
    let mut trailer = HeaderMap::new();
    for line in text.split("\r\n") {
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.trim().as_bytes()),
            HeaderValue::from_str(value.trim()),
        ) else {
            continue;
        };
        trailer.append(name, value);
    }
    trailer
}

/// Percent-decode a textual header value; used when reading `grpc-message`.
pub fn percent_decode_value(value: &HeaderValue) -> String {
    percent_decode(value.as_bytes())
        .decode_utf8_lossy()
        .into_owned()
}

// gRPC tolerates both alphabets and missing padding in -bin header values.
const PAD_INDIFFERENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_encode_padding(true)
    .with_decode_padding_mode(DecodePaddingMode::Indifferent);
const STANDARD: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, PAD_INDIFFERENT);
const URL_SAFE: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, PAD_INDIFFERENT);

/// Decode a binary (`-bin`) header value.
pub fn decode_base64_value(value: &HeaderValue) -> Option<Vec<u8>> {
    STANDARD
        .decode(value.as_bytes())
        .or_else(|_| URL_SAFE.decode(value.as_bytes()))
        .ok()
}
