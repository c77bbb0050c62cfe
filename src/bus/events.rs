use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// One row of the top-CPU-consumers table a device agent attaches to
/// `RTPERF_CPU` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopProcess {
    pub pid: String,
    pub user: String,
    pub cpu: f64,
    pub command: String,
}

/// Optional structured payload attached to an event by the device agent.
///
/// The agent sends either a list of process rows or a plain string (often
/// empty), so this deserializes untagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventDetail {
    TopProcesses(Vec<TopProcess>),
    Text(String),
}

impl EventDetail {
    /// Whether there is anything worth showing an operator.
    pub fn is_empty(&self) -> bool {
        match self {
            EventDetail::TopProcesses(rows) => rows.is_empty(),
            EventDetail::Text(text) => text.trim().is_empty(),
        }
    }

    /// Render for inclusion in a chat notification.
    pub fn render(&self) -> String {
        match self {
            EventDetail::TopProcesses(rows) => rows
                .iter()
                .map(|p| format!("{} {} {:.2}% {}", p.pid, p.user, p.cpu, p.command))
                .collect::<Vec<_>>()
                .join("<br>"),
            EventDetail::Text(text) => text.trim().to_string(),
        }
    }
}

/// The webhook body exactly as the device agent sends it.
#[derive(Debug, Clone, Deserialize)]
pub struct WireEvent {
    pub event: String,
    pub process: String,
    pub message: String,
    pub hostname: String,
    #[serde(default)]
    pub detail: Option<EventDetail>,
}

impl WireEvent {
    /// Normalize into an [`InboundEvent`], recording the sending address.
    ///
    /// The device repeats the event id inside the message text and wraps
    /// values in single quotes; both are stripped here so notifications read
    /// cleanly. Priority is assigned later by the classifier.
    pub fn into_event(self, source_address: IpAddr) -> InboundEvent {
        let message = self
            .message
            .replace(&self.event, "")
            .replace('\'', "")
            .trim()
            .to_string();
        let detail = self.detail.filter(|d| !d.is_empty());
        InboundEvent {
            event_id: self.event,
            process: self.process,
            message,
            hostname: self.hostname,
            source_address,
            detail,
            priority: 0,
        }
    }
}

/// A verified, normalized device event. Immutable once classified; consumed
/// exactly once by the dispatcher.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub event_id: String,
    pub process: String,
    pub message: String,
    pub hostname: String,
    pub source_address: IpAddr,
    pub detail: Option<EventDetail>,
    /// 1 (most urgent) .. 4 (ignore). Zero until the classifier runs.
    pub priority: u8,
}

/// Entity labels the external NLP extractor can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityLabel {
    Device,
    Time,
    Date,
    Process,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub label: EntityLabel,
    pub value: String,
}

/// An operator chat message plus its extracted entities. Ephemeral - lives
/// only for the duration of dispatch.
#[derive(Debug, Clone)]
pub struct ChatCommand {
    pub chat_id: String,
    pub raw_message: String,
    pub entities: Vec<Entity>,
}

impl ChatCommand {
    /// All DEVICE entities, in order of appearance.
    pub fn devices(&self) -> Vec<&str> {
        self.entities
            .iter()
            .filter(|e| e.label == EntityLabel::Device)
            .map(|e| e.value.as_str())
            .collect()
    }

    /// First entity with the given label, if any.
    pub fn first(&self, label: EntityLabel) -> Option<&str> {
        self.entities
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.value.as_str())
    }
}
