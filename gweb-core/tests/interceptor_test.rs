use std::sync::{Arc, Mutex};

use gweb_core::{
    CallContext, CallOptions, GrpcWebTransport, Interceptor, TransportOptions, UnaryCall,
};
use gweb_test_support::{
    data_frame, echo_request, echo_response, trailer_frame, unary_echo_method, MockHttpClient,
};
use http::HeaderValue;
use prost::Message;

/// Sets one request header, recording that it ran.
struct HeaderInterceptor {
    name: &'static str,
    value: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl Interceptor for HeaderInterceptor {
    fn intercept(&self, _ctx: CallContext<'_>, mut call: UnaryCall) -> UnaryCall {
        self.log.lock().unwrap().push(self.value);
        call.request
            .headers_mut()
            .insert(self.name, HeaderValue::from_static(self.value));
        call
    }
}

fn ok_response_body() -> Vec<u8> {
    let mut body = data_frame(&echo_response("x").encode_to_vec());
    body.extend_from_slice(&trailer_frame("grpc-status: 0\r\n"));
    body
}

#[tokio::test]
async fn test_interceptor_amends_request_headers() {
    let mock = Arc::new(MockHttpClient::new(200).body(ok_response_body()));
    let log = Arc::new(Mutex::new(Vec::new()));

    let options = TransportOptions::new("https://x.test").with_interceptor(Arc::new(
        HeaderInterceptor {
            name: "authorization",
            value: "Bearer token",
            log: Arc::clone(&log),
        },
    ));
    let transport = GrpcWebTransport::new(options, Arc::clone(&mock)).unwrap();

    transport
        .unary(&unary_echo_method(), CallOptions::new(), &echo_request("x"))
        .await
        .unwrap();

    assert_eq!(
        mock.requests()[0].headers.get("authorization").unwrap(),
        "Bearer token"
    );
}

#[tokio::test]
async fn test_last_interceptor_is_outermost() {
    let mock = Arc::new(MockHttpClient::new(200).body(ok_response_body()));
    let log = Arc::new(Mutex::new(Vec::new()));

    let options = TransportOptions::new("https://x.test")
        .with_interceptor(Arc::new(HeaderInterceptor {
            name: "x-tag",
            value: "first",
            log: Arc::clone(&log),
        }))
        .with_interceptor(Arc::new(HeaderInterceptor {
            name: "x-tag",
            value: "second",
            log: Arc::clone(&log),
        }));
    let transport = GrpcWebTransport::new(options, Arc::clone(&mock)).unwrap();

    transport
        .unary(&unary_echo_method(), CallOptions::new(), &echo_request("x"))
        .await
        .unwrap();

    // Declaration order on the way in; the last interceptor wraps the rest
    // and keeps the final word on the header.
    assert_eq!(*log.lock().unwrap(), ["first", "second"]);
    assert_eq!(mock.requests()[0].headers.get("x-tag").unwrap(), "second");
}

#[tokio::test]
async fn test_interceptor_sees_service_and_method() {
    struct DescriptorProbe {
        seen: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl Interceptor for DescriptorProbe {
        fn intercept(&self, ctx: CallContext<'_>, call: UnaryCall) -> UnaryCall {
            self.seen.lock().unwrap().push((
                ctx.service.full_name().to_string(),
                ctx.method.name().to_string(),
            ));
            call
        }
    }

    let mock = Arc::new(MockHttpClient::new(200).body(ok_response_body()));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let options = TransportOptions::new("https://x.test").with_interceptor(Arc::new(
        DescriptorProbe {
            seen: Arc::clone(&seen),
        },
    ));
    let transport = GrpcWebTransport::new(options, Arc::clone(&mock)).unwrap();

    transport
        .unary(&unary_echo_method(), CallOptions::new(), &echo_request("x"))
        .await
        .unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        [("echo.EchoService".to_string(), "UnaryEcho".to_string())]
    );
}
