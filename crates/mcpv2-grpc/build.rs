//! Build script for compiling the Protocol Buffer definitions
//!
//! Generates both halves of the service: the client is what the transport
//! uses, the server trait lets tests stand up an in-process service.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/mcpv2.proto");

    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/mcpv2.proto"], &["proto"])?;

    Ok(())
}
