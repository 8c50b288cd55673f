//! Core Lightning-style JSON-RPC mock on a UNIX socket.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;

use crate::{HarnessError, MockLightningNode};

/// A running socket mock. Stops accepting when dropped.
pub struct MockRpcNode {
    path: PathBuf,
    node: Arc<MockLightningNode>,
    server: JoinHandle<()>,
}

impl MockRpcNode {
    /// Binds `path` and answers newline-delimited JSON-RPC requests with
    /// `node`.
    pub fn start(node: Arc<MockLightningNode>, path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref().to_path_buf();
        let listener = UnixListener::bind(&path)?;
        let server = tokio::spawn(accept_loop(listener, Arc::clone(&node)));
        tracing::info!(path = %path.display(), "mock RPC node listening");
        Ok(Self { path, node, server })
    }

    /// Socket path.
    pub fn path(&self) -> &Path { &self.path }

    /// The node answering requests.
    pub fn node(&self) -> &Arc<MockLightningNode> { &self.node }
}

impl Drop for MockRpcNode {
    fn drop(&mut self) { self.server.abort(); }
}

async fn accept_loop(listener: UnixListener, node: Arc<MockLightningNode>) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                tokio::spawn(serve_connection(stream, Arc::clone(&node)));
            }
            Err(e) => {
                tracing::error!(error = %e, "mock RPC accept failed");
                return;
            }
        }
    }
}

async fn serve_connection(stream: UnixStream, node: Arc<MockLightningNode>) {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<Value>(&line) {
            Ok(request) => node.handle_rpc_request(request),
            Err(e) => json!({
                "jsonrpc": "2.0",
                "id": null,
                "error": {"code": -32700, "message": format!("Parse error: {}", e)}
            }),
        };
        let mut bytes = reply.to_string().into_bytes();
        bytes.push(b'\n');
        if let Err(e) = write.write_all(&bytes).await {
            tracing::warn!(error = %e, "mock RPC write failed");
            return;
        }
    }
}
