//! Central classification of free-text device failures.
//!
//! Junos reports most mid-operation failures as prose, not structure. Every
//! substring the service keys behavior on lives here, in one mapping, so
//! handlers never scatter their own string checks.

/// Known failure shapes inside free-text remote responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteFailure {
    /// "another shutdown is running" - a reboot is already scheduled on the
    /// device. Recoverable: report, don't fail.
    RebootAlreadyScheduled,
    /// "subsystem not running" - the target process exists but is not active.
    ProcessNotActive,
    /// "invalid daemon" - the target process name is not known to the device.
    UnknownProcess,
    /// "not logged in" - the FTP server rejected the device's credentials.
    TransferAuth,
    /// "could not fetch local copy of file" - the archive to upload is gone.
    ArchiveMissing,
    /// The transport dropped mid-operation. Expected when the operation
    /// takes the management plane down (reboot, forwarding restart).
    Disconnected,
    Other,
}

pub fn classify_remote_failure(text: &str) -> RemoteFailure {
    let lower = text.to_lowercase();
    if lower.contains("another shutdown is running") {
        RemoteFailure::RebootAlreadyScheduled
    } else if lower.contains("subsystem not running") {
        RemoteFailure::ProcessNotActive
    } else if lower.contains("invalid daemon") {
        RemoteFailure::UnknownProcess
    } else if lower.contains("not logged in") {
        RemoteFailure::TransferAuth
    } else if lower.contains("could not fetch local copy of file") {
        RemoteFailure::ArchiveMissing
    } else if lower.contains("connection closed")
        || lower.contains("connection reset")
        || lower.contains("socket is closed")
        || lower.contains("session terminated")
    {
        RemoteFailure::Disconnected
    } else {
        RemoteFailure::Other
    }
}

/// Strip shell echo framing from a remote error before showing it to an
/// operator: the `cli -c` invocation wrapper, stray `% '` prompts, and
/// literal CRLF escape runs.
pub fn sanitize_remote_error(text: &str) -> String {
    let mut out = text.to_string();
    for framing in ["% '", "cli -c \"'", "'cli -c", "\\r\\n\\r\\n", "\\r\\n"] {
        out = out.replace(framing, " ");
    }
    out = out.replace(['"', '\''], "");
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
