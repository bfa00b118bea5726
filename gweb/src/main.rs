#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

mod cli;

use clap::Parser;
use cli::Cli;
use gweb_core::{CallOptions, GrpcWebTransport, TransportOptions};
use prost_reflect::{DescriptorPool, DynamicMessage};
use std::process;

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    match run(args).await {
        Ok(message) => print_message(&message),
        Err(err) => {
            eprintln!("Error: {err}");
            process::exit(1);
        }
    }
}

async fn run(args: Cli) -> Result<DynamicMessage, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(&args.proto_set)?;
    let pool = DescriptorPool::decode(bytes.as_slice())?;

    let (service_name, method_name) = args.endpoint;
    let service = pool.get_service_by_name(&service_name).ok_or_else(|| {
        format!("Service '{service_name}' not found in the provided descriptor set")
    })?;
    let method = service
        .methods()
        .find(|m| m.name() == method_name)
        .ok_or_else(|| format!("Method '{method_name}' not found in service '{service_name}'"))?;

    let request = DynamicMessage::deserialize(method.input(), args.body)?;

    let mut options = CallOptions::new();
    for (name, value) in &args.headers {
        options = options.with_header(name, value)?;
    }
    if let Some(ms) = args.timeout_ms {
        options = options.with_timeout_ms(ms);
    }

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    let transport = GrpcWebTransport::new(TransportOptions::new(args.url), client)?;

    Ok(transport.unary(&method, options, &request).await?)
}

fn print_message(message: &DynamicMessage) {
    match serde_json::to_string_pretty(message) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("Error: failed to render response as JSON: {err}"),
    }
}
