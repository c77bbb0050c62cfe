//! Deployment adapter for [`DeviceConnector`] over the system OpenSSH client.
//!
//! Each command is executed as `ssh <user>@<host> cli -c '<command>'`. Key
//! based authentication is assumed (`BatchMode=yes`); the resolved password
//! is intentionally never placed on a command line or in the environment.
//! Structured RPCs are lowered to their CLI equivalents.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::{ConnectError, OpsError};
use crate::netconf::{DeviceConnector, DeviceSession, RpcReply, RpcRequest, DEFAULT_COMMAND_TIMEOUT};

const CONNECT_PROBE: &str = "show version";

pub struct OpenSshConnector;

impl OpenSshConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OpenSshConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceConnector for OpenSshConnector {
    async fn connect(
        &self,
        host: &str,
        username: &str,
        _password: &str,
    ) -> Result<Box<dyn DeviceSession>, ConnectError> {
        let mut session = OpenSshSession {
            host: host.to_string(),
            username: username.to_string(),
        };

        // Probe once so connection failures surface here, where the handler
        // can still report them as connect errors, not mid-job failures.
        match session.run(CONNECT_PROBE, DEFAULT_COMMAND_TIMEOUT).await {
            Ok(_) => Ok(Box::new(session)),
            Err(OpsError::Connect(err)) => Err(err),
            Err(other) => Err(ConnectError::Other(other.to_string())),
        }
    }
}

struct OpenSshSession {
    host: String,
    username: String,
}

impl OpenSshSession {
    fn classify_ssh_stderr(stderr: &str) -> ConnectError {
        let lower = stderr.to_lowercase();
        if lower.contains("connection refused") {
            ConnectError::Refused
        } else if lower.contains("timed out") {
            ConnectError::Timeout
        } else if lower.contains("permission denied") || lower.contains("host key verification") {
            ConnectError::AuthFailed
        } else if lower.contains("could not resolve hostname") {
            ConnectError::UnknownHost
        } else {
            ConnectError::Other(stderr.trim().to_string())
        }
    }
}

#[async_trait]
impl DeviceSession for OpenSshSession {
    async fn run(&mut self, command: &str, timeout: Duration) -> Result<String, OpsError> {
        // The command is wrapped in single quotes for the remote shell, so
        // a quote inside it would terminate the sanctioned invocation.
        if command.contains('\'') {
            return Err(OpsError::RemoteCommand(format!(
                "refusing command with quote characters: {}",
                command
            )));
        }
        debug!("running on {}: {}", self.host, command);

        let child = Command::new("ssh")
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg("ConnectTimeout=10")
            .arg(format!("{}@{}", self.username, self.host))
            .arg(format!("cli -c '{}'", command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

        let output = tokio::time::timeout(timeout, child)
            .await
            .map_err(|_| {
                OpsError::RemoteCommand(format!(
                    "command timed out after {}s: {}",
                    timeout.as_secs(),
                    command
                ))
            })?
            .map_err(|e| OpsError::Connect(ConnectError::Other(e.to_string())))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        // ssh exits 255 on transport failure; anything else came from the
        // remote command itself.
        if output.status.code() == Some(255) {
            return Err(OpsError::Connect(Self::classify_ssh_stderr(&stderr)));
        }
        if !output.status.success() {
            return Err(OpsError::RemoteCommand(if stderr.trim().is_empty() {
                stdout
            } else {
                stderr
            }));
        }

        Ok(stdout)
    }

    async fn rpc(&mut self, request: RpcRequest) -> Result<RpcReply, OpsError> {
        let command = lower_rpc(&request);
        let text = self.run(&command, DEFAULT_COMMAND_TIMEOUT).await?;
        Ok(RpcReply::Text(text))
    }

    async fn close(self: Box<Self>) {
        // Stateless transport: each command ran over its own connection, so
        // there is nothing to tear down beyond logging the lifecycle.
        debug!("closed session to {}", self.host);
    }
}

/// Lower a structured RPC to the CLI form the device accepts.
fn lower_rpc(request: &RpcRequest) -> String {
    match request {
        RpcRequest::Reboot { at: Some(at), .. } => format!("request system reboot at {}", at),
        RpcRequest::Reboot {
            in_minutes: Some(minutes),
            ..
        } => format!("request system reboot in {}", minutes),
        RpcRequest::Reboot { .. } => "request system reboot".to_string(),
        RpcRequest::RestartProcess {
            name,
            immediate: true,
        } => format!("restart {} immediately", name),
        RpcRequest::RestartProcess { name, .. } => format!("restart {}", name),
    }
}

/// Logged at startup so operators configuring device passwords know what
/// actually grants access with this adapter.
pub const AUTH_NOTE: &str = "device sessions use the system OpenSSH client with key-based \
     authentication; stored device passwords are not sent to devices";

/// Warn loudly at startup if the adapter's transport is missing.
pub async fn check_transport() {
    match Command::new("ssh").arg("-V").output().await {
        Ok(_) => {}
        Err(e) => warn!("ssh client not found on PATH - device actions will fail: {}", e),
    }
}
