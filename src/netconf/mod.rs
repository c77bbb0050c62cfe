pub mod failures;
pub mod ssh;

use async_trait::async_trait;
use std::time::Duration;

use crate::errors::{ConnectError, OpsError};

/// Timeout for ordinary CLI-equivalent commands.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// RSI generation walks the whole system and can take most of half an hour.
pub const RSI_TIMEOUT: Duration = Duration::from_secs(1800);

/// Structured calls the session can issue besides plain CLI commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcRequest {
    /// Reboot the device. `at` is a Junos `yymmddHHMM` timestamp; at most one
    /// of `at` / `in_minutes` is set, neither means reboot now.
    Reboot {
        at: Option<String>,
        in_minutes: Option<u64>,
    },
    /// Restart a software process. `immediate` sends the hard-kill form.
    RestartProcess { name: String, immediate: bool },
}

/// Reply shapes the device produces for structured calls.
///
/// The hard-kill restart form acks with a bare boolean; everything else
/// answers with free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcReply {
    Status(bool),
    Text(String),
}

/// One open, authenticated connection to a managed device.
///
/// Owned exclusively by the action handler that opened it; `close` consumes
/// the session and must be called exactly once on every exit path.
#[async_trait]
pub trait DeviceSession: Send {
    /// Run a CLI-equivalent command and return the textual response.
    async fn run(&mut self, command: &str, timeout: Duration) -> Result<String, OpsError>;

    /// Issue a structured RPC.
    async fn rpc(&mut self, request: RpcRequest) -> Result<RpcReply, OpsError>;

    async fn close(self: Box<Self>);
}

/// Opens sessions to managed devices. The production implementation wraps
/// the management transport; tests substitute scripted fakes.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    async fn connect(
        &self,
        host: &str,
        username: &str,
        password: &str,
    ) -> Result<Box<dyn DeviceSession>, ConnectError>;
}
