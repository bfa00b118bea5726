//! A scriptable HTTP client and a callback-recording response handler.

use std::sync::Mutex;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::{stream, StreamExt};
use gweb_core::fetch::{BoxByteStream, HttpClient, HttpRequest, HttpResponse};
use gweb_core::{BoxError, ResponseHandler, TransportError};
use http::HeaderMap;
use prost_reflect::DynamicMessage;

/// Build an encoded DATA frame for a canned response body.
pub fn data_frame(payload: &[u8]) -> Vec<u8> {
    gweb_core::frame::encode_data_frame(payload).to_vec()
}

/// Build an encoded TRAILER frame for a canned response body.
pub fn trailer_frame(text: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(5 + text.len());
    frame.push(0x80);
    frame.extend_from_slice(&(text.len() as u32).to_be_bytes());
    frame.extend_from_slice(text.as_bytes());
    frame
}

/// What the mock saw go out.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub uri: String,
    pub method: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

enum MockBody {
    Missing,
    Chunks(Vec<Vec<u8>>),
    /// A body stream that never yields; for concurrency tests.
    Pending,
}

/// Replays one canned response and records the outgoing request.
///
/// Share it with the transport through an `Arc`:
///
/// ```ignore
/// let mock = Arc::new(MockHttpClient::new(200).body(bytes));
/// let transport = GrpcWebTransport::new(options, Arc::clone(&mock))?;
/// ```
pub struct MockHttpClient {
    status: http::StatusCode,
    headers: HeaderMap,
    body: Mutex<Option<MockBody>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockHttpClient {
    /// A response with the given HTTP status and no body.
    pub fn new(status: u16) -> Self {
        Self {
            status: http::StatusCode::from_u16(status).expect("valid test status code"),
            headers: HeaderMap::new(),
            body: Mutex::new(Some(MockBody::Missing)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Add a response header.
    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.append(
            http::HeaderName::from_static(name),
            http::HeaderValue::from_str(value).expect("valid test header value"),
        );
        self
    }

    /// Respond with `body` as a single chunk.
    pub fn body(self, body: Vec<u8>) -> Self {
        self.chunked_body(vec![body])
    }

    /// Respond with the body split into the given chunks.
    pub fn chunked_body(mut self, chunks: Vec<Vec<u8>>) -> Self {
        self.body = Mutex::new(Some(MockBody::Chunks(chunks)));
        self
    }

    /// Respond with a body stream that stays pending forever.
    pub fn pending_body(mut self) -> Self {
        self.body = Mutex::new(Some(MockBody::Pending));
        self
    }

    /// Requests issued so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("mock lock poisoned").clone()
    }
}

impl HttpClient for MockHttpClient {
    fn fetch(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, BoxError>> {
        self.requests
            .lock()
            .expect("mock lock poisoned")
            .push(RecordedRequest {
                uri: request.uri.to_string(),
                method: request.method.to_string(),
                headers: request.headers.clone(),
                body: request.body.clone(),
            });

        let status = self.status;
        let headers = self.headers.clone();
        let body = self.body.lock().expect("mock lock poisoned").take();

        Box::pin(async move {
            let body: Option<BoxByteStream> = match body {
                None => return Err("mock response already consumed".into()),
                Some(MockBody::Missing) => None,
                Some(MockBody::Chunks(chunks)) => Some(
                    stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c)))).boxed(),
                ),
                Some(MockBody::Pending) => Some(stream::pending().boxed()),
            };
            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        })
    }
}

/// Records the handler callback sequence for order assertions.
#[derive(Default)]
pub struct RecordingHandler {
    pub events: Vec<Event>,
}

#[derive(Debug)]
pub enum Event {
    Header(HeaderMap),
    Message(DynamicMessage),
    Trailer(HeaderMap),
    Close(Option<TransportError>),
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The callback names in order, e.g. `["header", "message", "close"]`.
    pub fn sequence(&self) -> Vec<&'static str> {
        self.events
            .iter()
            .map(|event| match event {
                Event::Header(_) => "header",
                Event::Message(_) => "message",
                Event::Trailer(_) => "trailer",
                Event::Close(_) => "close",
            })
            .collect()
    }

    /// The error of the single close event. Panics if the call is not
    /// closed yet.
    pub fn close_error(&self) -> Option<&TransportError> {
        match self.events.last() {
            Some(Event::Close(error)) => error.as_ref(),
            other => panic!("call is not closed, last event: {other:?}"),
        }
    }
}

impl ResponseHandler for RecordingHandler {
    fn on_header(&mut self, headers: &HeaderMap) {
        self.events.push(Event::Header(headers.clone()));
    }

    fn on_message(&mut self, message: DynamicMessage) {
        self.events.push(Event::Message(message));
    }

    fn on_trailer(&mut self, trailer: &HeaderMap) {
        self.events.push(Event::Trailer(trailer.clone()));
    }

    fn on_close(&mut self, error: Option<TransportError>) {
        self.events.push(Event::Close(error));
    }
}
