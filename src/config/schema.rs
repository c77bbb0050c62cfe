use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Shared secret for webhook HMAC-SHA256 signatures.
    #[serde(default)]
    pub secret: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            secret: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatConfig {
    /// Base URL of the chat relay that accepts messages for delivery.
    #[serde(default, rename = "relayUrl")]
    pub relay_url: String,
    /// Channel that device events and job reports are delivered to.
    #[serde(default, rename = "chatId")]
    pub chat_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FtpConfig {
    /// FTP server that diagnostic archives are uploaded to.
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub directory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LogSinkConfig {
    /// SQLite database path. Defaults to `$OPSRELAY_HOME/events.db`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_table() -> String {
    "junos_events".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CredentialsConfig {
    /// Credential file path. Defaults to `$OPSRELAY_HOME/credentials.json`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    /// Event id → priority tier (1 = most urgent, 4 = ignore).
    #[serde(default)]
    pub events: HashMap<String, u8>,
    #[serde(default)]
    pub ftp: FtpConfig,
    #[serde(default, rename = "logSink")]
    pub log_sink: LogSinkConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

impl Config {
    /// Validate the parts the service cannot run without. Returns every
    /// problem found, not just the first.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.gateway.secret.is_empty() {
            problems.push("gateway.secret is empty - webhooks cannot be verified".to_string());
        }
        if self.chat.relay_url.is_empty() {
            problems.push("chat.relayUrl is not set".to_string());
        }
        if self.chat.chat_id.is_empty() {
            problems.push("chat.chatId is not set".to_string());
        }
        for (event, tier) in &self.events {
            if !(1..=4).contains(tier) {
                problems.push(format!(
                    "events.{} has priority {} (must be 1-4)",
                    event, tier
                ));
            }
        }
        problems
    }
}
