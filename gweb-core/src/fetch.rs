//! The HTTP seam: a minimal fetch abstraction the transport drives.
//!
//! The transport never opens a socket itself. It hands a fully formed
//! [`HttpRequest`] to an [`HttpClient`] and deframes the byte stream the
//! response exposes. [`reqwest::Client`] implements the trait out of the
//! box; tests substitute a scripted client.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use http::{HeaderMap, Method, Uri};

use crate::BoxError;

/// Byte stream of a response body. Chunk boundaries are arbitrary.
pub type BoxByteStream = BoxStream<'static, Result<Bytes, BoxError>>;

/// One outgoing gRPC-Web exchange.
#[derive(Debug)]
pub struct HttpRequest {
    pub uri: Uri,
    pub method: Method,
    pub headers: HeaderMap,
    /// The already-framed request body.
    pub body: Bytes,
}

/// The response surface the transport consumes.
pub struct HttpResponse {
    pub status: http::StatusCode,
    pub headers: HeaderMap,
    /// `None` when the response carries no body at all.
    pub body: Option<BoxByteStream>,
}

/// Fetch-style HTTP client: one request in, one streamed response out.
pub trait HttpClient: Send + Sync {
    /// Issue `request` and resolve to the response head plus body stream.
    ///
    /// The returned future is lazy: the transport starts polling it when
    /// the caller reads the response, and dropping it cancels the exchange.
    fn fetch(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, BoxError>>;
}

impl<T: HttpClient + ?Sized> HttpClient for Arc<T> {
    fn fetch(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, BoxError>> {
        (**self).fetch(request)
    }
}

/// gRPC-Web needs the response verbatim, so configure the client with
/// redirects disabled (`reqwest::redirect::Policy::none()`); a redirected
/// call then surfaces as an error instead of a silently rewritten request.
impl HttpClient for reqwest::Client {
    fn fetch(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, BoxError>> {
        let builder = self
            .request(request.method, request.uri.to_string())
            .headers(request.headers)
            .body(request.body);
        Box::pin(async move {
            let response = builder.send().await?;
            Ok(HttpResponse {
                status: response.status(),
                headers: response.headers().clone(),
                body: Some(response.bytes_stream().map_err(BoxError::from).boxed()),
            })
        })
    }
}
