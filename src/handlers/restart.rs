//! Process Restart Controller: graceful (SIGTERM) or immediate (SIGKILL)
//! restart of one software process on one device.

use tracing::{info, warn};

use crate::errors::OpsError;
use crate::handlers::{connect_or_report, notify, report_failure, Capabilities};
use crate::netconf::failures::{classify_remote_failure, sanitize_remote_error, RemoteFailure};
use crate::netconf::{RpcReply, RpcRequest};

/// Restarting the forwarding process takes the management plane down with
/// it, so a dropped connection mid-call is the expected success signal.
const FORWARDING: &str = "forwarding";

/// Process names are bare identifiers on the device. Anything else never
/// reaches a command line.
fn is_process_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-')
}

pub async fn run(
    caps: Capabilities,
    device: String,
    chat_id: String,
    process: String,
    immediate: bool,
) {
    if !is_process_name(&process) {
        warn!("rejected process name for {}: {:?}", device, process);
        notify(
            &caps,
            &chat_id,
            "That doesn't look like a process name to me",
        )
        .await;
        return;
    }

    if process == FORWARDING {
        notify(
            &caps,
            &chat_id,
            "Restarting the forwarding process - expect disruption for 5+ minutes",
        )
        .await;
    }

    let Some(mut session) = connect_or_report(&caps, &device, &chat_id).await else {
        return;
    };

    info!(
        "restarting {} on {} ({})",
        process,
        device,
        if immediate { "immediate" } else { "graceful" }
    );
    let outcome = session
        .rpc(RpcRequest::RestartProcess {
            name: process.clone(),
            immediate,
        })
        .await;
    session.close().await;

    match outcome {
        Ok(RpcReply::Status(true)) => {
            notify(
                &caps,
                &chat_id,
                &format!("{}: restarted the {} process", device, process),
            )
            .await;
        }
        Ok(RpcReply::Status(false)) => {
            notify(
                &caps,
                &chat_id,
                &format!(
                    "{}: there were problems restarting {} - maybe check the system logs",
                    device, process
                ),
            )
            .await;
        }
        Ok(RpcReply::Text(text)) => {
            let text = strip_output_tags(&text);
            notify(&caps, &chat_id, &format!("{}: {}", device, text.trim())).await;
        }
        Err(OpsError::Connect(_)) if process == FORWARDING => {
            info!("disconnected from {} while restarting forwarding - expected", device);
            notify(
                &caps,
                &chat_id,
                &format!(
                    "I've been disconnected from {} - this is normal when restarting \
                     the forwarding process",
                    device
                ),
            )
            .await;
        }
        Err(OpsError::RemoteCommand(text)) => {
            report_rpc_failure(&caps, &device, &chat_id, &process, &text).await;
        }
        Err(e) => report_failure(&caps, &chat_id, &device, "process restart", &e).await,
    }
}

async fn report_rpc_failure(
    caps: &Capabilities,
    device: &str,
    chat_id: &str,
    process: &str,
    text: &str,
) {
    match classify_remote_failure(text) {
        RemoteFailure::Disconnected if process == FORWARDING => {
            info!("disconnected from {} while restarting forwarding - expected", device);
            notify(
                caps,
                chat_id,
                &format!(
                    "I've been disconnected from {} - this is normal when restarting \
                     the forwarding process",
                    device
                ),
            )
            .await;
        }
        RemoteFailure::ProcessNotActive => {
            let err = OpsError::ProcessNotActive(process.to_string());
            warn!("{} on {}: {}", process, device, err);
            notify(
                caps,
                chat_id,
                &format!(
                    "The {} process can't be restarted - it is not in use on this system",
                    process
                ),
            )
            .await;
        }
        RemoteFailure::UnknownProcess => {
            let err = OpsError::UnknownProcess(process.to_string());
            warn!("{} on {}: {}", process, device, err);
            notify(
                caps,
                chat_id,
                &format!(
                    "The {} process does not exist on this system - is this a typo?",
                    process
                ),
            )
            .await;
        }
        _ => {
            warn!("RPC error restarting {} on {}: {}", process, device, text);
            notify(
                caps,
                chat_id,
                &format!(
                    "An RPC error occurred while talking to {}: {}",
                    device,
                    sanitize_remote_error(text)
                ),
            )
            .await;
        }
    }
}

/// The graceful restart reply arrives wrapped in `<output>` tags.
fn strip_output_tags(text: &str) -> String {
    text.replace("<output>", "").replace("</output>", "")
}
