//! LND-style REST mock served with warp.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use tokio::task::JoinHandle;
use warp::http::StatusCode;
use warp::path::FullPath;
use warp::Filter;

use crate::{HarnessError, MockLightningNode, RecordedRequest};

/// A running REST mock. The server stops when this is dropped.
pub struct MockRestNode {
    addr: SocketAddr,
    node: Arc<MockLightningNode>,
    server: JoinHandle<()>,
}

fn routes(
    node: Arc<MockLightningNode>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let node_filter = warp::any().map(move || Arc::clone(&node));

    warp::method()
        .and(warp::path::full())
        .and(warp::header::optional::<String>("grpc-metadata-macaroon"))
        .and(warp::header::optional::<String>("content-type"))
        .and(warp::body::bytes())
        .and(node_filter)
        .map(respond)
}

fn respond(
    method: warp::http::Method,
    path: FullPath,
    macaroon: Option<String>,
    content_type: Option<String>,
    body: Bytes,
    node: Arc<MockLightningNode>,
) -> impl warp::Reply {
    let body = if body.is_empty() { None } else { serde_json::from_slice::<Value>(&body).ok() };
    let request = RecordedRequest {
        method: method.as_str().to_string(),
        path: path.as_str().to_string(),
        macaroon,
        content_type,
        body,
    };
    tracing::debug!(method = %request.method, path = %request.path, "mock REST request");

    let (status, body) = node.handle_rest_request(request);
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    warp::reply::with_header(warp::reply::with_status(body, status), "content-type", "application/json")
}

/// Serves `node` on `addr` until the task is cancelled.
pub async fn serve_rest(node: Arc<MockLightningNode>, addr: SocketAddr) {
    warp::serve(routes(node)).run(addr).await
}

impl MockRestNode {
    /// Serves `node` on a free loopback port and waits until it accepts
    /// connections.
    pub async fn start(node: Arc<MockLightningNode>) -> Result<Self, HarnessError> {
        let port = transport::get_random_free_port()?;
        let addr: SocketAddr = ([127, 0, 0, 1], port).into();
        let server = tokio::spawn(serve_rest(Arc::clone(&node), addr));

        wait_until_listening(addr).await?;
        tracing::info!(%addr, "mock REST node listening");
        Ok(Self { addr, node, server })
    }

    /// Bound address.
    pub fn addr(&self) -> SocketAddr { self.addr }

    /// `host:port`, as the REST backend expects in its `hostname` option.
    pub fn hostname(&self) -> String { self.addr.to_string() }

    /// The node answering requests.
    pub fn node(&self) -> &Arc<MockLightningNode> { &self.node }
}

impl Drop for MockRestNode {
    fn drop(&mut self) { self.server.abort(); }
}

async fn wait_until_listening(addr: SocketAddr) -> Result<(), HarnessError> {
    for _ in 0..100 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Err(HarnessError::NotReady(format!("nothing listening on {}", addr)))
}
