//! Integration tests for the shared transport API.
//!
//! These exercise consumer usage patterns against an in-process transport,
//! without a running Lightning node.

use std::sync::Arc;

use serde_json::{json, Value};
use transport::{normalize_params, BackendError, DynTransport, Transport};

struct DummyTransport;

#[async_trait::async_trait]
impl transport::Transport for DummyTransport {
    async fn send(&self, method: &str, params: Value) -> Result<Value, BackendError> {
        let params = normalize_params(params)?;
        if method == "fail" {
            Err(BackendError::remote(r#"{"code":-32601,"message":"dummy error"}"#))
        } else {
            Ok(json!({"ok": true, "params": params}))
        }
    }

    fn endpoint(&self) -> &str { "dummy://" }
}

#[tokio::test]
async fn consumer_can_call_transport() {
    let t: DynTransport = Arc::new(DummyTransport);
    let v = t.send("getinfo", Value::Null).await.expect("ok");
    assert_eq!(v["ok"], true);
    assert_eq!(v["params"], json!([]));
    assert_eq!(t.endpoint(), "dummy://");
}

#[tokio::test]
async fn consumer_sees_remote_error() {
    let t = DummyTransport;
    let err = t.send("fail", json!({})).await.expect_err("should err");
    match err {
        BackendError::Remote { status, message } => {
            assert!(status.is_none());
            assert!(message.contains("dummy"));
        }
        _ => panic!("unexpected error variant"),
    }
}

#[tokio::test]
async fn consumer_sees_invalid_params() {
    let t = DummyTransport;
    let err = t.send("getinfo", json!(42)).await.expect_err("should err");
    assert!(matches!(err, BackendError::InvalidArgument(_)));
}
