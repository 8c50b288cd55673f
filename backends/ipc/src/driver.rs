//! Connection driver: connects once, then pumps requests out and replies in.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};
use transport::JsonRpcResponse;

use crate::codec::DelimitedCodec;
use crate::connector::Connector;
use crate::registry::PendingRegistry;
use crate::{Outbound, Shared};

pub(crate) async fn run(
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    let endpoint = connector.endpoint();
    let stream = match connector.connect().await {
        Ok(stream) => stream,
        Err(e) => {
            outbound.close();
            drop(outbound);
            shared.fail_connection(format!("Failed to connect to {}: {}", endpoint, e));
            return;
        }
    };
    info!(%endpoint, "connected");

    let (read_half, write_half) = tokio::io::split(stream);
    let reader = FramedRead::new(read_half, shared.codec());
    let writer = FramedWrite::new(write_half, shared.codec());
    shared.mark_connected();

    let reason = tokio::select! {
        reason = read_loop(&shared.registry, &endpoint, reader) => reason,
        reason = write_loop(&endpoint, writer, outbound) => reason,
    };
    shared.fail_connection(reason);
}

async fn write_loop<W>(
    endpoint: &str,
    mut writer: FramedWrite<W, DelimitedCodec>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) -> String
where
    W: AsyncWrite + Unpin,
{
    while let Some(Outbound { id, frame, slot }) = outbound.recv().await {
        if let Err(e) = writer.send(frame).await {
            return format!("Failed to write to {}: {}", endpoint, e);
        }
        drop(slot);
        debug!(%id, "request written");
    }
    format!("Request queue for {} closed", endpoint)
}

async fn read_loop<R>(
    registry: &PendingRegistry,
    endpoint: &str,
    mut reader: FramedRead<R, DelimitedCodec>,
) -> String
where
    R: AsyncRead + Unpin,
{
    while let Some(frame) = reader.next().await {
        match frame {
            Ok(frame) => handle_frame(registry, &frame),
            Err(e) => return format!("Failed to read from {}: {}", endpoint, e),
        }
    }
    format!("Connection to {} closed by peer", endpoint)
}

/// Parses one inbound frame and resolves the matching call, if any.
///
/// Nothing here fails the connection: bad frames are logged and skipped.
pub(crate) fn handle_frame(registry: &PendingRegistry, frame: &[u8]) {
    let text = match std::str::from_utf8(frame) {
        Ok(text) => text.trim(),
        Err(e) => {
            warn!(error = %e, "skipping frame that is not UTF-8");
            return;
        }
    };
    if text.is_empty() {
        return;
    }

    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, len = text.len(), "skipping unparseable frame");
            return;
        }
    };
    let Some(response) = JsonRpcResponse::from_value(value) else {
        warn!("skipping frame that is not a JSON object");
        return;
    };
    let Some(id) = response.id_str().map(str::to_owned) else {
        debug!(id = %response.id, "ignoring frame without a string id");
        return;
    };

    if registry.resolve(&id, response.into_result()) {
        debug!(%id, "resolved");
    } else {
        debug!(%id, "ignoring response for unknown id");
    }
}
