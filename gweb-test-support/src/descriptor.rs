//! Builds test descriptor pools at runtime, entirely in memory.

use prost_reflect::{DescriptorPool, DynamicMessage, MethodDescriptor, Value};
use prost_types::{
    field_descriptor_proto, DescriptorProto, FieldDescriptorProto, FileDescriptorProto,
    FileDescriptorSet, MethodDescriptorProto, ServiceDescriptorProto,
};

/// The descriptor pool all tests share, equivalent to:
///
/// ```proto
/// syntax = "proto3";
/// package echo;
///
/// message EchoRequest  { string message = 1; }
/// message EchoResponse { string message = 1; }
///
/// service EchoService {
///   rpc UnaryEcho(EchoRequest) returns (EchoResponse);
///   rpc ServerStreamingEcho(EchoRequest) returns (stream EchoResponse);
/// }
/// ```
pub fn echo_descriptor_pool() -> DescriptorPool {
    let file = FileDescriptorProto {
        name: Some("echo.proto".to_string()),
        package: Some("echo".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![message_type("EchoRequest"), message_type("EchoResponse")],
        service: vec![ServiceDescriptorProto {
            name: Some("EchoService".to_string()),
            method: vec![
                MethodDescriptorProto {
                    name: Some("UnaryEcho".to_string()),
                    input_type: Some(".echo.EchoRequest".to_string()),
                    output_type: Some(".echo.EchoResponse".to_string()),
                    ..Default::default()
                },
                MethodDescriptorProto {
                    name: Some("ServerStreamingEcho".to_string()),
                    input_type: Some(".echo.EchoRequest".to_string()),
                    output_type: Some(".echo.EchoResponse".to_string()),
                    server_streaming: Some(true),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }],
        ..Default::default()
    };

    DescriptorPool::from_file_descriptor_set(FileDescriptorSet { file: vec![file] })
        .expect("static echo descriptor set is valid")
}

fn message_type(name: &str) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: vec![FieldDescriptorProto {
            name: Some("message".to_string()),
            number: Some(1),
            label: Some(field_descriptor_proto::Label::Optional as i32),
            r#type: Some(field_descriptor_proto::Type::String as i32),
            json_name: Some("message".to_string()),
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// `echo.EchoService/UnaryEcho`.
pub fn unary_echo_method() -> MethodDescriptor {
    method("UnaryEcho")
}

/// `echo.EchoService/ServerStreamingEcho`.
pub fn server_streaming_echo_method() -> MethodDescriptor {
    method("ServerStreamingEcho")
}

fn method(name: &str) -> MethodDescriptor {
    echo_descriptor_pool()
        .get_service_by_name("echo.EchoService")
        .and_then(|service| service.methods().find(|m| m.name() == name))
        .expect("echo service method exists")
}

/// An `echo.EchoRequest` with the given text.
pub fn echo_request(text: &str) -> DynamicMessage {
    echo_message("echo.EchoRequest", text)
}

/// An `echo.EchoResponse` with the given text.
pub fn echo_response(text: &str) -> DynamicMessage {
    echo_message("echo.EchoResponse", text)
}

fn echo_message(full_name: &str, text: &str) -> DynamicMessage {
    let descriptor = echo_descriptor_pool()
        .get_message_by_name(full_name)
        .expect("echo message exists");
    let mut message = DynamicMessage::new(descriptor);
    message.set_field_by_name("message", Value::String(text.to_string()));
    message
}
