//! Shared helpers for gweb tests: an in-memory echo-service descriptor
//! pool, a scriptable HTTP client, response frame builders, and a handler
//! that records the callback sequence.

pub mod descriptor;
pub mod mock;

pub use descriptor::{
    echo_descriptor_pool, echo_request, echo_response, server_streaming_echo_method,
    unary_echo_method,
};
pub use mock::{data_frame, trailer_frame, Event, MockHttpClient, RecordedRequest, RecordingHandler};
