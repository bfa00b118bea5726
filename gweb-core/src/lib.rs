//! # gweb-core
//!
//! A browser-style gRPC-Web client transport for unary calls, driven by
//! `prost-reflect` descriptors.
//!
//! [`GrpcWebTransport`] turns a method descriptor, per-call options, and a
//! [`DynamicMessage`](prost_reflect::DynamicMessage) into a length-prefixed
//! gRPC-Web POST, then deframes the response body into the
//! `on_header on_message? on_trailer? on_close` callback sequence of a
//! [`ResponseHandler`]. Failures from any of the three error sources (HTTP
//! status, textual trailer headers, binary status details) surface as a
//! single [`TransportError`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use gweb_core::{CallOptions, GrpcWebTransport, TransportOptions};
//! use prost_reflect::{DescriptorPool, DynamicMessage};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = DescriptorPool::decode(std::fs::read("descriptor.bin")?.as_slice())?;
//! let method = pool
//!     .get_service_by_name("echo.EchoService")
//!     .and_then(|s| s.methods().find(|m| m.name() == "UnaryEcho"))
//!     .ok_or("method not found")?;
//!
//! let transport = GrpcWebTransport::new(
//!     TransportOptions::new("https://localhost:8080"),
//!     reqwest::Client::builder()
//!         .redirect(reqwest::redirect::Policy::none())
//!         .build()?,
//! )?;
//!
//! let request = DynamicMessage::new(method.input());
//! let reply = transport.unary(&method, CallOptions::new(), &request).await?;
//! println!("{reply:?}");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod fetch;
pub mod frame;
pub mod interceptor;
pub mod status;
pub mod trailer;

pub use client::{
    CallOptions, ClientRequest, ClientResponse, GrpcWebTransport, InvalidBaseUrl, InvalidHeader,
    ResponseHandler, TransportOptions, GRPC_WEB_CONTENT_TYPE,
};
pub use error::{Status, TransportError};
pub use frame::Frame;
pub use interceptor::{CallContext, Interceptor, UnaryCall};
pub use status::StatusCode;

/// Type alias for the standard boxed error used in generic bounds.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
