//! Call interceptors.
//!
//! An interceptor wraps the `(request, response)` pair the engine builds
//! before the pair reaches the caller. Interceptors run in declaration
//! order, so the last interceptor in the transport's list is outermost and
//! has the final word on the outgoing request.

use std::fmt;
use std::sync::Arc;

use prost_reflect::{MethodDescriptor, ServiceDescriptor};

use crate::client::{ClientRequest, ClientResponse};

/// The call being wrapped, as interceptors see it.
pub struct CallContext<'a> {
    /// Service the call targets.
    pub service: &'a ServiceDescriptor,
    /// Unary method being invoked.
    pub method: &'a MethodDescriptor,
}

/// One unary exchange: the send half and the receive half.
pub struct UnaryCall {
    pub request: ClientRequest,
    pub response: ClientResponse,
}

impl fmt::Debug for UnaryCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnaryCall").finish_non_exhaustive()
    }
}

/// Wraps a call before it is handed to the caller.
///
/// Per-call options are already folded into `call.request` (headers,
/// including `grpc-timeout`) when an interceptor runs.
pub trait Interceptor: Send + Sync {
    fn intercept(&self, ctx: CallContext<'_>, call: UnaryCall) -> UnaryCall;
}

pub(crate) fn apply(
    interceptors: &[Arc<dyn Interceptor>],
    service: &ServiceDescriptor,
    method: &MethodDescriptor,
    call: UnaryCall,
) -> UnaryCall {
    interceptors.iter().fold(call, |call, interceptor| {
        interceptor.intercept(CallContext { service, method }, call)
    })
}
