//! Fill sources
//!
//! - [`AccountSource`]: raw account bytes by address (the event queue)
//! - [`SnapshotSource`]: the set of currently visible fills of a market
//!
//! Both are traits so collectors can be driven by in-memory fakes.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use market_data::order_buffer::SnapshotFill;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("event queue account {address} not found")]
    AccountNotFound { address: String },

    #[error("invalid response: {0}")]
    InvalidData(String),
}

#[async_trait]
pub trait AccountSource: Send + Sync {
    async fn fetch_account(&self, address: &str) -> Result<Vec<u8>, SourceError>;
}

#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_fills(&self, url: &str) -> Result<Vec<SnapshotFill>, SourceError>;
}

// ── JSON-RPC ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<AccountInfoResult>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct AccountInfoResult {
    value: Option<AccountValue>,
}

#[derive(Debug, Deserialize)]
struct AccountValue {
    /// `[payload, encoding]`
    data: (String, String),
}

/// `getAccountInfo` over Solana JSON-RPC, base64 encoded.
#[derive(Debug, Clone)]
pub struct RpcAccountSource {
    client: Client,
    endpoint: String,
}

impl RpcAccountSource {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl AccountSource for RpcAccountSource {
    async fn fetch_account(&self, address: &str) -> Result<Vec<u8>, SourceError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getAccountInfo",
            "params": [address, { "encoding": "base64" }],
        });
        let response: RpcResponse = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(SourceError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        let value = response
            .result
            .ok_or_else(|| SourceError::InvalidData("missing result".into()))?
            .value
            .ok_or_else(|| SourceError::AccountNotFound {
                address: address.to_string(),
            })?;

        let (payload, encoding) = value.data;
        if encoding != "base64" {
            return Err(SourceError::InvalidData(format!(
                "unexpected encoding {}",
                encoding
            )));
        }
        STANDARD
            .decode(payload.as_bytes())
            .map_err(|e| SourceError::InvalidData(e.to_string()))
    }
}

// ── Snapshot endpoint ───────────────────────────────────

/// GET of a JSON array of [`SnapshotFill`].
#[derive(Debug, Clone)]
pub struct HttpFillSource {
    client: Client,
}

impl HttpFillSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SnapshotSource for HttpFillSource {
    async fn fetch_fills(&self, url: &str) -> Result<Vec<SnapshotFill>, SourceError> {
        let fills = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(fills)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, routing::post};
    use serde_json::Value;
    use tokio::net::TcpListener;

    /// Serve a fixed JSON-RPC reply on an ephemeral port.
    async fn serve_rpc(reply: Value) -> String {
        let app = Router::new().route(
            "/",
            post(move |Json(req): Json<Value>| {
                let reply = reply.clone();
                async move {
                    assert_eq!(req["method"], "getAccountInfo");
                    assert_eq!(req["params"][1]["encoding"], "base64");
                    Json(reply)
                }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_fetch_account_decodes_base64() {
        let payload = STANDARD.encode([1u8, 2, 3, 4]);
        let url = serve_rpc(json!({
            "jsonrpc": "2.0", "id": 1,
            "result": { "context": { "slot": 1 }, "value": { "data": [payload, "base64"] } }
        }))
        .await;
        let source = RpcAccountSource::new(Client::new(), url);
        assert_eq!(source.fetch_account("queue").await.unwrap(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_missing_account_is_an_error() {
        let url = serve_rpc(json!({
            "jsonrpc": "2.0", "id": 1,
            "result": { "context": { "slot": 1 }, "value": null }
        }))
        .await;
        let source = RpcAccountSource::new(Client::new(), url);
        let err = source.fetch_account("queue").await.unwrap_err();
        assert!(matches!(err, SourceError::AccountNotFound { .. }));
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_rpc_error_is_reported() {
        let url = serve_rpc(json!({
            "jsonrpc": "2.0", "id": 1,
            "error": { "code": -32602, "message": "Invalid param" }
        }))
        .await;
        let source = RpcAccountSource::new(Client::new(), url);
        match source.fetch_account("queue").await.unwrap_err() {
            SourceError::Rpc { code, message } => {
                assert_eq!(code, -32602);
                assert_eq!(message, "Invalid param");
            }
            other => panic!("unexpected error {other}"),
        }
    }
}
