//! Action handlers: one detached job per operator-requested remote action.
//!
//! Every handler follows the same shape: acquire credentials, open a
//! session, do the work, close the session at a single point, report the
//! outcome to chat. Nothing propagates past a handler - each runs detached
//! from any caller able to react.

pub mod diag;
pub mod reboot;
pub mod restart;

use std::sync::Arc;
use tracing::{error, warn};

use crate::credentials::{CredentialKind, CredentialStore};
use crate::errors::OpsError;
use crate::logsink::EventLog;
use crate::netconf::{DeviceConnector, DeviceSession};
use crate::notify::ChatSink;

/// The external capabilities a job needs, bundled for cheap cloning into
/// spawned tasks.
#[derive(Clone)]
pub struct Capabilities {
    pub chat: Arc<dyn ChatSink>,
    pub credentials: Arc<dyn CredentialStore>,
    pub connector: Arc<dyn DeviceConnector>,
    pub log: Arc<dyn EventLog>,
}

/// Send a chat message, logging (but not propagating) delivery failures.
/// Returns the relay correlation id when delivery succeeded.
pub(crate) async fn notify(caps: &Capabilities, chat_id: &str, content: &str) -> Option<String> {
    match caps.chat.send(content, chat_id).await {
        Ok(id) => Some(id),
        Err(e) => {
            error!("chat delivery failed: {}", e);
            None
        }
    }
}

/// Resolve credentials and open a session, reporting any failure to the
/// operator. Returns `None` when the job cannot proceed; in that case no
/// session is left open.
pub(crate) async fn connect_or_report(
    caps: &Capabilities,
    device: &str,
    chat_id: &str,
) -> Option<Box<dyn DeviceSession>> {
    let credential = match caps
        .credentials
        .resolve(CredentialKind::Device, device)
        .await
    {
        Ok(Some(credential)) => credential,
        Ok(None) => {
            warn!("no credentials on file for {}", device);
            notify(
                caps,
                chat_id,
                &format!("I couldn't get a password to connect to {}", device),
            )
            .await;
            return None;
        }
        Err(e) => {
            error!("credential store unavailable: {}", e);
            notify(
                caps,
                chat_id,
                &format!("I couldn't get a password to connect to {} ({})", device, e),
            )
            .await;
            return None;
        }
    };

    match caps
        .connector
        .connect(device, &credential.username, &credential.password)
        .await
    {
        Ok(session) => Some(session),
        Err(e) => {
            warn!("connect to {} failed: {}", device, e);
            notify(caps, chat_id, &e.operator_hint(device)).await;
            None
        }
    }
}

/// Log and report a terminal job failure in one place.
pub(crate) async fn report_failure(
    caps: &Capabilities,
    chat_id: &str,
    device: &str,
    what: &str,
    err: &OpsError,
) {
    error!("{} on {} failed: {}", what, device, err);
    let content = match err {
        OpsError::Connect(connect) => connect.operator_hint(device),
        other => format!(
            "I've hit a snag with the {} on {}. Does this make sense to you? {}",
            what, device, other
        ),
    };
    notify(caps, chat_id, &content).await;
}
