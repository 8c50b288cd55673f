#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]

//! Runs the mock Lightning node as a standalone process.
//!
//! Serves the REST mock on `LNBRIDGE_HARNESS_PORT` (default 8080) and, when
//! `LNBRIDGE_HARNESS_SOCKET` is set, the JSON-RPC mock on that UNIX socket.

use std::net::SocketAddr;
use std::sync::Arc;

use harness::MockLightningNode;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    lnbridge_logging::init(&config::LoggingConfig::default())?;

    let port: u16 = std::env::var("LNBRIDGE_HARNESS_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);
    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    let node = Arc::new(MockLightningNode::new());

    #[cfg(unix)]
    let _rpc = match std::env::var("LNBRIDGE_HARNESS_SOCKET") {
        Ok(path) => {
            println!("JSON-RPC socket: {}", path);
            Some(harness::MockRpcNode::start(Arc::clone(&node), path)?)
        }
        Err(_) => None,
    };

    println!("Mock LND REST listening on http://{}", addr);
    println!("GET http://{}/v1/getinfo", addr);
    harness::serve_rest(node, addr).await;
    Ok(())
}
