use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::errors::{OpsError, OpsResult};

/// Delivers human-readable messages to a chat channel.
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Returns the relay's correlation id for the delivered message.
    async fn send(&self, content: &str, chat_id: &str) -> OpsResult<String>;
}

/// Chat sink backed by the HTTP relay service.
pub struct RelaySink {
    client: reqwest::Client,
    base_url: String,
}

impl RelaySink {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ChatSink for RelaySink {
    async fn send(&self, content: &str, chat_id: &str) -> OpsResult<String> {
        let url = format!("{}/api/messages", self.base_url);
        let body = serde_json::json!({
            "chat_id": chat_id,
            "message": content,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| OpsError::ChatRelay(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OpsError::ChatRelay(format!(
                "relay returned {}",
                response.status()
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| OpsError::ChatRelay(e.to_string()))?;
        let id = json
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| OpsError::ChatRelay("relay response missing message id".into()))?
            .to_string();

        debug!("chat message delivered: chat_id={}, id={}", chat_id, id);
        Ok(id)
    }
}
