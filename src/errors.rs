use thiserror::Error;

/// Typed error hierarchy for opsrelay.
///
/// Use at module boundaries (gateway, dispatcher, action handlers, capability
/// adapters). Internal/leaf functions can continue using `anyhow::Result`;
/// the `Internal` variant allows seamless conversion via the `?` operator.
#[derive(Debug, Error)]
pub enum OpsError {
    /// Webhook signature did not match. Dropped silently - the caller is
    /// unauthenticated, so no operator notification is produced.
    #[error("webhook signature mismatch")]
    Authentication,

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// A chat command arrived without a DEVICE entity.
    #[error("no device name in the request")]
    MissingTarget,

    #[error("{0} is not a valid unit of time")]
    UnitParse(String),

    #[error("invalid reboot schedule: {0}")]
    InvalidSchedule(String),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("remote command failed: {0}")]
    RemoteCommand(String),

    #[error("the {0} process is not running on this system")]
    ProcessNotActive(String),

    #[error("the {0} process does not exist on this system")]
    UnknownProcess(String),

    #[error("no credentials available for {0}")]
    CredentialUnavailable(String),

    #[error("chat relay error: {0}")]
    ChatRelay(String),

    #[error("event log error: {0}")]
    LogSink(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Connection failure taxonomy at the remote-session boundary.
///
/// The vendor library reports these as distinct exception types; the
/// capability contract keeps them as structured variants so handlers never
/// have to sniff free text to tell "refused" from "wrong password".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("connection refused")]
    Refused,
    #[error("connection timed out")]
    Timeout,
    #[error("authentication rejected")]
    AuthFailed,
    #[error("unknown host")]
    UnknownHost,
    #[error("connection error: {0}")]
    Other(String),
}

impl ConnectError {
    /// Operator-facing hint for a failed connection attempt.
    pub fn operator_hint(&self, host: &str) -> String {
        match self {
            ConnectError::Refused => format!(
                "{} refused my connection. Check SSH settings, including acceptable ciphers.",
                host
            ),
            ConnectError::Timeout => format!(
                "I didn't get a response from {}. Check the hostname or IP address, \
                 and make sure this is a Junos device with NETCONF enabled.",
                host
            ),
            ConnectError::AuthFailed => format!(
                "{} denied my authentication attempt. Can you check that I have \
                 the right username and password?",
                host
            ),
            ConnectError::UnknownHost => format!(
                "I couldn't resolve {}. Are you sure the hostname is spelled correctly?",
                host
            ),
            ConnectError::Other(detail) => format!(
                "{} won't let me connect, and I'm not sure why. Perhaps this means \
                 something to you: {}",
                host, detail
            ),
        }
    }
}

pub type OpsResult<T> = std::result::Result<T, OpsError>;
