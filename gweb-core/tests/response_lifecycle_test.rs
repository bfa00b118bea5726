use std::sync::Arc;
use std::time::Duration;

use futures_util::future::AbortHandle;
use gweb_core::{CallOptions, GrpcWebTransport, StatusCode, TransportOptions, UnaryCall};
use gweb_test_support::{
    data_frame, echo_request, echo_response, trailer_frame, unary_echo_method, MockHttpClient,
    RecordingHandler,
};
use prost::Message;

fn transport(mock: &Arc<MockHttpClient>) -> GrpcWebTransport {
    GrpcWebTransport::new(TransportOptions::new("https://x.test"), Arc::clone(mock))
        .expect("valid base url")
}

fn ok_response_body(text: &str) -> Vec<u8> {
    let mut body = data_frame(&echo_response(text).encode_to_vec());
    body.extend_from_slice(&trailer_frame("grpc-status: 0\r\n"));
    body
}

#[tokio::test]
async fn test_second_receive_closes_with_already_read() {
    let mock = Arc::new(MockHttpClient::new(200).body(ok_response_body("x")));
    let UnaryCall { request, response } = transport(&mock)
        .call(&unary_echo_method(), CallOptions::new())
        .unwrap();
    request.send(&echo_request("x"));

    let mut first = RecordingHandler::new();
    response.receive(&mut first).await;
    assert!(first.close_error().is_none());

    let mut second = RecordingHandler::new();
    response.receive(&mut second).await;

    assert_eq!(second.sequence(), ["close"]);
    assert_eq!(
        second.close_error().unwrap().message,
        "response already read"
    );
}

#[tokio::test]
async fn test_concurrent_receive_closes_immediately() {
    let mock = Arc::new(MockHttpClient::new(200).pending_body());
    let UnaryCall { request, response } = transport(&mock)
        .call(&unary_echo_method(), CallOptions::new())
        .unwrap();
    request.send(&echo_request("x"));

    let response = Arc::new(response);
    let pinned = Arc::clone(&response);
    let first = tokio::spawn(async move {
        let mut handler = RecordingHandler::new();
        // Stays parked on the never-ending body stream.
        pinned.receive(&mut handler).await;
    });

    // Let the first receive reach the frame loop.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut second = RecordingHandler::new();
    response.receive(&mut second).await;

    assert_eq!(second.sequence(), ["close"]);
    assert_eq!(
        second.close_error().unwrap().message,
        "cannot read response concurrently"
    );

    first.abort();
}

#[tokio::test]
async fn test_missing_body_closes_with_error() {
    let mock = Arc::new(MockHttpClient::new(200));
    let UnaryCall { request, response } = transport(&mock)
        .call(&unary_echo_method(), CallOptions::new())
        .unwrap();
    request.send(&echo_request("x"));

    let mut handler = RecordingHandler::new();
    response.receive(&mut handler).await;

    assert_eq!(handler.sequence(), ["header", "close"]);
    let err = handler.close_error().unwrap();
    assert_eq!(err.code, StatusCode::Internal);
    assert_eq!(err.message, "missing response body");
}

#[tokio::test]
async fn test_premature_eof_mid_data_frame() {
    // Declares a 16-byte payload, delivers 3, then the stream ends.
    let mock = Arc::new(
        MockHttpClient::new(200).body(vec![0x00, 0x00, 0x00, 0x00, 0x10, 0x01, 0x02, 0x03]),
    );
    let UnaryCall { request, response } = transport(&mock)
        .call(&unary_echo_method(), CallOptions::new())
        .unwrap();
    request.send(&echo_request("x"));

    let mut handler = RecordingHandler::new();
    response.receive(&mut handler).await;

    assert_eq!(handler.sequence(), ["header", "close"]);
    let err = handler.close_error().unwrap();
    assert_eq!(err.code, StatusCode::DataLoss);
    assert_eq!(err.message, "premature end of response body");
}

#[tokio::test]
async fn test_trailer_before_any_data_skips_message() {
    let mock = Arc::new(MockHttpClient::new(200).body(trailer_frame("grpc-status: 0\r\n")));
    let UnaryCall { request, response } = transport(&mock)
        .call(&unary_echo_method(), CallOptions::new())
        .unwrap();
    request.send(&echo_request("x"));

    let mut handler = RecordingHandler::new();
    response.receive(&mut handler).await;

    assert_eq!(handler.sequence(), ["header", "trailer", "close"]);
    assert!(handler.close_error().is_none());
}

#[tokio::test]
async fn test_abort_closes_with_cancelled() {
    let mock = Arc::new(MockHttpClient::new(200).body(ok_response_body("x")));
    let (handle, registration) = AbortHandle::new_pair();
    let UnaryCall { request, response } = transport(&mock)
        .call(
            &unary_echo_method(),
            CallOptions::new().with_signal(registration),
        )
        .unwrap();
    request.send(&echo_request("x"));

    handle.abort();

    let mut handler = RecordingHandler::new();
    response.receive(&mut handler).await;

    assert_eq!(handler.sequence(), ["close"]);
    let err = handler.close_error().unwrap();
    assert_eq!(err.code, StatusCode::Cancelled);
}

#[tokio::test]
async fn test_request_dropped_without_send() {
    let mock = Arc::new(MockHttpClient::new(200));
    let UnaryCall { request, response } = transport(&mock)
        .call(&unary_echo_method(), CallOptions::new())
        .unwrap();
    drop(request);

    let mut handler = RecordingHandler::new();
    response.receive(&mut handler).await;

    assert_eq!(handler.sequence(), ["close"]);
    let err = handler.close_error().unwrap();
    assert_eq!(err.code, StatusCode::Cancelled);
    assert_eq!(err.message, "request was dropped before send");
}

#[tokio::test]
async fn test_chunked_response_still_decodes() {
    // Deliver the body two bytes at a time.
    let chunks = ok_response_body("chunked").chunks(2).map(<[u8]>::to_vec).collect();
    let mock = Arc::new(MockHttpClient::new(200).chunked_body(chunks));
    let UnaryCall { request, response } = transport(&mock)
        .call(&unary_echo_method(), CallOptions::new())
        .unwrap();
    request.send(&echo_request("x"));

    let mut handler = RecordingHandler::new();
    response.receive(&mut handler).await;

    assert_eq!(handler.sequence(), ["header", "message", "trailer", "close"]);
    assert!(handler.close_error().is_none());
}

#[tokio::test]
async fn test_extra_data_frame_after_message_is_an_error() {
    let mut body = data_frame(&echo_response("one").encode_to_vec());
    body.extend_from_slice(&data_frame(&echo_response("two").encode_to_vec()));
    body.extend_from_slice(&trailer_frame("grpc-status: 0\r\n"));

    let mock = Arc::new(MockHttpClient::new(200).body(body));
    let UnaryCall { request, response } = transport(&mock)
        .call(&unary_echo_method(), CallOptions::new())
        .unwrap();
    request.send(&echo_request("x"));

    let mut handler = RecordingHandler::new();
    response.receive(&mut handler).await;

    assert_eq!(handler.sequence(), ["header", "message", "close"]);
    let err = handler.close_error().unwrap();
    assert_eq!(err.code, StatusCode::DataLoss);
    assert_eq!(err.message, "unexpected data frame after message");
}

#[tokio::test]
async fn test_garbled_message_payload_closes_with_deserialize_error() {
    // A DATA frame whose payload is not a valid EchoResponse.
    let mut body = data_frame(&[0xff, 0xff, 0xff, 0xff]);
    body.extend_from_slice(&trailer_frame("grpc-status: 0\r\n"));

    let mock = Arc::new(MockHttpClient::new(200).body(body));
    let UnaryCall { request, response } = transport(&mock)
        .call(&unary_echo_method(), CallOptions::new())
        .unwrap();
    request.send(&echo_request("x"));

    let mut handler = RecordingHandler::new();
    response.receive(&mut handler).await;

    assert_eq!(handler.sequence(), ["header", "close"]);
    let err = handler.close_error().unwrap();
    assert_eq!(err.code, StatusCode::Internal);
    assert!(err
        .message
        .starts_with("failed to deserialize message echo.EchoResponse:"));
}
