//! # gRPC-Web call engine
//!
//! [`GrpcWebTransport`] carries unary calls of a schema-defined service over
//! HTTP using the gRPC-Web wire framing with binary protobuf messages.
//!
//! Unlike compile-time generated clients, the engine is descriptor-driven:
//! the caller hands a `prost-reflect` [`MethodDescriptor`] and a
//! [`DynamicMessage`]; the transport produces the framed POST and deframes
//! the response back into the `on_header on_message? on_trailer? on_close`
//! callback sequence of a [`ResponseHandler`]. Failures from any source
//! surface as a single [`TransportError`] through `on_close`, exactly once.

use std::sync::{Arc, Mutex};

use futures_util::future::{AbortRegistration, Abortable, Aborted, BoxFuture};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use prost::Message;
use prost_reflect::{DynamicMessage, MessageDescriptor, MethodDescriptor};
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::TransportError;
use crate::fetch::{HttpClient, HttpRequest, HttpResponse};
use crate::frame::{encode_data_frame, Frame, FrameReader};
use crate::interceptor::{self, Interceptor, UnaryCall};
use crate::status::StatusCode;
use crate::trailer::parse_trailer;
use crate::BoxError;

/// Content type of gRPC-Web exchanges with binary protobuf messages.
pub const GRPC_WEB_CONTENT_TYPE: &str = "application/grpc-web+proto";

const USER_AGENT: &str = concat!("gweb/", env!("CARGO_PKG_VERSION"));

type FetchFuture = BoxFuture<'static, Result<HttpResponse, BoxError>>;

/// Transport configuration.
pub struct TransportOptions {
    /// Base URL requests are issued against, e.g. `https://host/api`.
    /// A trailing slash is tolerated.
    pub base_url: String,
    /// Interceptors applied to every call, first to last.
    pub interceptors: Vec<Arc<dyn Interceptor>>,
}

impl TransportOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            interceptors: Vec::new(),
        }
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }
}

/// Error constructing a transport from an unparseable base URL.
#[derive(Debug, thiserror::Error)]
#[error("invalid base url '{url}': {source}")]
pub struct InvalidBaseUrl {
    url: String,
    source: http::uri::InvalidUri,
}

/// Invalid header passed to [`CallOptions::with_header`].
#[derive(Debug, thiserror::Error)]
pub enum InvalidHeader {
    #[error("invalid header name '{name}': {source}")]
    Name {
        name: String,
        source: http::header::InvalidHeaderName,
    },
    #[error("invalid header value for '{name}': {source}")]
    Value {
        name: String,
        source: http::header::InvalidHeaderValue,
    },
}

/// Per-call options. Immutable once the call starts.
#[derive(Default)]
pub struct CallOptions {
    /// Headers applied on top of the transport's unconditional headers,
    /// replacing identically named entries.
    pub headers: HeaderMap,
    /// Emitted as the `grpc-timeout` request header. The transport does not
    /// enforce the deadline itself.
    pub timeout_ms: Option<u64>,
    /// Aborting the paired [`AbortHandle`](futures_util::future::AbortHandle)
    /// cancels the HTTP exchange and closes the call with
    /// [`StatusCode::Cancelled`].
    pub signal: Option<AbortRegistration>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header to the call.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, InvalidHeader> {
        let key = HeaderName::from_bytes(name.as_bytes()).map_err(|source| InvalidHeader::Name {
            name: name.to_string(),
            source,
        })?;
        let value = HeaderValue::from_str(value).map_err(|source| InvalidHeader::Value {
            name: name.to_string(),
            source,
        })?;
        self.headers.append(key, value);
        Ok(self)
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_signal(mut self, signal: AbortRegistration) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// A gRPC-Web client transport for unary calls.
///
/// Calls share no mutable state: each owns its reader, accumulator, and
/// lifecycle flags, so one transport can serve any number of concurrent
/// calls.
pub struct GrpcWebTransport {
    base_url: String,
    interceptors: Vec<Arc<dyn Interceptor>>,
    client: Arc<dyn HttpClient>,
}

impl GrpcWebTransport {
    /// Create a transport over `client`.
    pub fn new(
        options: TransportOptions,
        client: impl HttpClient + 'static,
    ) -> Result<Self, InvalidBaseUrl> {
        let base_url = options.base_url.trim_end_matches('/').to_string();
        if let Err(source) = base_url.parse::<Uri>() {
            return Err(InvalidBaseUrl {
                url: options.base_url,
                source,
            });
        }
        Ok(Self {
            base_url,
            interceptors: options.interceptors,
            client: Arc::new(client),
        })
    }

    /// Set up a unary call, returning the send and receive halves.
    ///
    /// The request URL is `<base>/<service full name>/<method name>`.
    /// Nothing goes on the wire until [`ClientRequest::send`] runs.
    pub fn call(
        &self,
        method: &MethodDescriptor,
        options: CallOptions,
    ) -> Result<UnaryCall, TransportError> {
        if method.is_client_streaming() || method.is_server_streaming() {
            return Err(TransportError::new(
                StatusCode::Unimplemented,
                format!(
                    "streaming method '{}' is not supported by this transport",
                    method.full_name()
                ),
            ));
        }
        let service = method.parent_service();

        let url: Uri = format!(
            "{}/{}/{}",
            self.base_url,
            service.full_name(),
            method.name()
        )
        .parse()
        .map_err(|source: http::uri::InvalidUri| {
            TransportError::new(
                StatusCode::Internal,
                format!("invalid request url: {source}"),
            )
        })?;

        let CallOptions {
            headers: call_headers,
            timeout_ms,
            signal,
        } = options;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(GRPC_WEB_CONTENT_TYPE));
        headers.insert("x-grpc-web", HeaderValue::from_static("1"));
        headers.insert("x-user-agent", HeaderValue::from_static(USER_AGENT));
        if let Some(ms) = timeout_ms {
            let value = HeaderValue::from_str(&format!("{ms}m"))
                .expect("digits and 'm' are a valid header value");
            headers.insert("grpc-timeout", value);
        }
        apply_call_headers(&mut headers, call_headers);

        let (tx, rx) = oneshot::channel();
        let request = ClientRequest {
            url,
            method: Method::POST,
            headers,
            client: Arc::clone(&self.client),
            tx,
        };
        let response = ClientResponse {
            state: Mutex::new(ReadState::Pending(PendingReceive {
                rx,
                signal,
                output: method.output(),
            })),
        };

        Ok(interceptor::apply(
            &self.interceptors,
            &service,
            method,
            UnaryCall { request, response },
        ))
    }

    /// Perform a unary call end to end and return the decoded response
    /// message.
    ///
    /// Convenience over [`call`](Self::call) for callers that need neither
    /// response headers nor the trailer.
    pub async fn unary(
        &self,
        method: &MethodDescriptor,
        options: CallOptions,
        request: &DynamicMessage,
    ) -> Result<DynamicMessage, TransportError> {
        let UnaryCall {
            request: req,
            response,
        } = self.call(method, options)?;
        req.send(request);

        let mut collect = Collect::default();
        response.receive(&mut collect).await;
        match (collect.message, collect.error) {
            (_, Some(error)) => Err(error),
            (Some(message), None) => Ok(message),
            (None, None) => Err(TransportError::new(
                StatusCode::Internal,
                "missing response message",
            )),
        }
    }
}

/// Overlay caller headers onto the unconditional set: the first occurrence
/// of a name replaces the base entry, further occurrences accumulate.
fn apply_call_headers(base: &mut HeaderMap, extra: HeaderMap) {
    let mut current: Option<HeaderName> = None;
    for (name, value) in extra {
        // HeaderMap iteration yields the name only on the first of a run of
        // repeated values.
        if let Some(name) = name {
            base.remove(&name);
            current = Some(name);
        }
        if let Some(name) = &current {
            base.append(name.clone(), value);
        }
    }
}

/// The send half of a call.
pub struct ClientRequest {
    url: Uri,
    method: Method,
    headers: HeaderMap,
    client: Arc<dyn HttpClient>,
    tx: oneshot::Sender<FetchFuture>,
}

impl ClientRequest {
    pub fn url(&self) -> &Uri {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Interceptors use this to amend the outgoing headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Encode `message` into a DATA frame and start the HTTP exchange.
    ///
    /// Send is fire-and-forget: the outcome is only observable through the
    /// paired [`ClientResponse`]. Consuming `self` makes a second send
    /// unrepresentable.
    pub fn send(self, message: &DynamicMessage) {
        let ClientRequest {
            url,
            method,
            headers,
            client,
            tx,
        } = self;

        let frame = encode_data_frame(&message.encode_to_vec());
        debug!(url = %url, frame_len = frame.len(), "sending gRPC-Web request");

        let request = HttpRequest {
            uri: url,
            method,
            headers,
            body: frame,
        };
        // A dropped receiver means the caller abandoned the response; the
        // unpolled future is dropped with it and nothing goes on the wire.
        let _ = tx.send(client.fetch(request));
    }
}

/// The receive half of a call.
///
/// [`receive`](Self::receive) drives the response to completion. The handler
/// sees at most one `on_header`, zero or one `on_message`, zero or one
/// `on_trailer` (in that order), and exactly one `on_close`, always last.
pub struct ClientResponse {
    state: Mutex<ReadState>,
}

enum ReadState {
    Pending(PendingReceive),
    Reading,
    Closed,
}

struct PendingReceive {
    rx: oneshot::Receiver<FetchFuture>,
    signal: Option<AbortRegistration>,
    output: MessageDescriptor,
}

/// Receives the lifecycle callbacks of one call.
///
/// Callbacks are never reentered: each completes before the next fires.
pub trait ResponseHandler {
    /// Response headers arrived.
    fn on_header(&mut self, _headers: &HeaderMap) {}
    /// The response message was deframed and decoded.
    fn on_message(&mut self, message: DynamicMessage);
    /// The trailer frame was parsed.
    fn on_trailer(&mut self, _trailer: &HeaderMap) {}
    /// Terminal callback; fires exactly once per call.
    fn on_close(&mut self, error: Option<TransportError>);
}

impl ClientResponse {
    /// Drive the response, delivering callbacks to `handler`.
    ///
    /// A second invocation after completion closes immediately with
    /// "response already read"; an invocation while another is in flight
    /// closes immediately with "cannot read response concurrently" and
    /// leaves the first untouched.
    pub async fn receive<H: ResponseHandler>(&self, handler: &mut H) {
        // Callbacks run outside the lock.
        let pending = {
            let mut state = self.state.lock().expect("response state lock poisoned");
            match std::mem::replace(&mut *state, ReadState::Reading) {
                ReadState::Pending(pending) => Ok(pending),
                ReadState::Reading => Err("cannot read response concurrently"),
                ReadState::Closed => {
                    *state = ReadState::Closed;
                    Err("response already read")
                }
            }
        };
        let pending = match pending {
            Ok(pending) => pending,
            Err(message) => {
                handler.on_close(Some(TransportError::new(StatusCode::Internal, message)));
                return;
            }
        };

        let PendingReceive { rx, signal, output } = pending;
        let error = match signal {
            Some(signal) => match Abortable::new(drive(rx, output, handler), signal).await {
                Ok(error) => error,
                Err(Aborted) => Some(TransportError::new(
                    StatusCode::Cancelled,
                    "the call was aborted",
                )),
            },
            None => drive(rx, output, handler).await,
        };

        *self.state.lock().expect("response state lock poisoned") = ReadState::Closed;
        if let Some(error) = &error {
            debug!(code = %error.code, "gRPC-Web call closed with error");
        }
        handler.on_close(error);
    }
}

/// The linear response state machine; returns the close error, if any.
async fn drive<H: ResponseHandler>(
    rx: oneshot::Receiver<FetchFuture>,
    output: MessageDescriptor,
    handler: &mut H,
) -> Option<TransportError> {
    let fetch = match rx.await {
        Ok(fetch) => fetch,
        Err(_) => {
            return Some(TransportError::new(
                StatusCode::Cancelled,
                "request was dropped before send",
            ))
        }
    };
    let response = match fetch.await {
        Ok(response) => response,
        Err(source) => {
            return Some(TransportError::new(
                StatusCode::Unavailable,
                format!("HTTP request failed: {source}"),
            ))
        }
    };

    handler.on_header(&response.headers);
    if let Some(error) = TransportError::from_response(response.status, &response.headers) {
        return Some(error);
    }

    let Some(body) = response.body else {
        return Some(TransportError::new(
            StatusCode::Internal,
            "missing response body",
        ));
    };

    let mut reader = FrameReader::new(body);
    let mut message_seen = false;
    loop {
        match reader.next_frame().await {
            Err(error) => return Some(error),
            Ok(Frame::Data(payload)) => {
                if message_seen {
                    return Some(TransportError::new(
                        StatusCode::DataLoss,
                        "unexpected data frame after message",
                    ));
                }
                match DynamicMessage::decode(output.clone(), payload) {
                    Ok(message) => {
                        handler.on_message(message);
                        message_seen = true;
                    }
                    Err(source) => {
                        return Some(TransportError::new(
                            StatusCode::Internal,
                            format!(
                                "failed to deserialize message {}: {source}",
                                output.full_name()
                            ),
                        ))
                    }
                }
            }
            Ok(Frame::Trailer(payload)) => {
                let trailer = parse_trailer(&payload);
                handler.on_trailer(&trailer);
                return TransportError::from_trailer(&trailer);
            }
        }
    }
}

#[derive(Default)]
struct Collect {
    message: Option<DynamicMessage>,
    error: Option<TransportError>,
}

impl ResponseHandler for Collect {
    fn on_message(&mut self, message: DynamicMessage) {
        self.message = Some(message);
    }

    fn on_close(&mut self, error: Option<TransportError>) {
        self.error = error;
    }
}
