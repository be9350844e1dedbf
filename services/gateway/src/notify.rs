//! Failure notifications
//!
//! Posts `{ "content": ... }` to a webhook when one is configured, otherwise
//! logs. Delivery failures are logged and never propagated.

use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Notifier {
    client: Client,
    webhook_url: Option<String>,
}

impl Notifier {
    pub fn new(client: Client, webhook_url: Option<String>) -> Self {
        Self {
            client,
            webhook_url,
        }
    }

    /// Log-only notifier.
    pub fn log_only() -> Self {
        Self::new(Client::new(), None)
    }

    pub async fn notify(&self, content: &str) {
        let Some(url) = &self.webhook_url else {
            warn!(content, "Notification");
            return;
        };
        let result = self
            .client
            .post(url)
            .timeout(Duration::from_secs(10))
            .json(&json!({ "content": content }))
            .send()
            .await
            .and_then(|resp| resp.error_for_status());
        if let Err(e) = result {
            warn!(error = %e, content, "Webhook delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::State, routing::post};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_webhook_receives_content() {
        let received: Arc<Mutex<Vec<Value>>> = Arc::default();
        let app = Router::new()
            .route(
                "/hook",
                post(
                    |State(received): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>| async move {
                        received.lock().unwrap().push(body);
                    },
                ),
            )
            .with_state(Arc::clone(&received));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let notifier = Notifier::new(Client::new(), Some(format!("http://{}/hook", addr)));
        notifier.notify("collectEventQueue SOL/USDC boom").await;

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["content"], "collectEventQueue SOL/USDC boom");
    }

    #[tokio::test]
    async fn test_unreachable_webhook_does_not_fail() {
        let notifier = Notifier::new(Client::new(), Some("http://127.0.0.1:1/hook".into()));
        notifier.notify("lost").await;
        Notifier::log_only().notify("logged").await;
    }
}
