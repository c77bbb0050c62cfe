//! Event router: the single consumer of both inbound channels.
//!
//! Device events either become a chat notification plus a log-sink record,
//! a local diagnostic line, or nothing, depending on priority. Chat
//! commands are matched against a fixed phrase table and fan out into
//! detached handler tasks - the router never waits on a device.

use chrono::Local;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::bus::{ChatCommand, EntityLabel, InboundEvent};
use crate::config::FtpConfig;
use crate::handlers::{self, notify, Capabilities};
use crate::handlers::reboot::RebootSchedule;
use crate::logsink::{encode_source_address, EventRecord};

/// What a matched phrase resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhraseAction {
    CollectLogs,
    Reboot,
    RestartProcess,
}

/// The command-phrase registry, resolved once at startup. First match wins.
const PHRASES: &[(&str, PhraseAction)] = &[
    ("juno log", PhraseAction::CollectLogs),
    ("reboot", PhraseAction::Reboot),
    ("restart process", PhraseAction::RestartProcess),
];

fn match_phrase(message: &str) -> Option<PhraseAction> {
    let lower = message.to_lowercase();
    PHRASES
        .iter()
        .find(|(phrase, _)| lower.contains(phrase))
        .map(|(_, action)| *action)
}

/// One operator-requested unit of work, executed as a detached task.
#[derive(Debug, Clone)]
pub struct ActionJob {
    pub id: Uuid,
    pub device: String,
    pub chat_id: String,
    pub kind: ActionKind,
}

#[derive(Debug, Clone)]
pub enum ActionKind {
    CollectLogs,
    CollectExtensiveLogs,
    Reboot { schedule: RebootSchedule },
    Restart { process: String, immediate: bool },
}

pub struct Dispatcher {
    caps: Capabilities,
    /// Channel that device events are reported into.
    event_chat_id: String,
    log_table: String,
    ftp: FtpConfig,
}

impl Dispatcher {
    pub fn new(caps: Capabilities, event_chat_id: String, log_table: String, ftp: FtpConfig) -> Self {
        Self {
            caps,
            event_chat_id,
            log_table,
            ftp,
        }
    }

    /// Consume both inbound channels until they close.
    pub async fn run(
        self,
        mut events_rx: mpsc::Receiver<InboundEvent>,
        mut commands_rx: mpsc::Receiver<ChatCommand>,
    ) {
        loop {
            tokio::select! {
                event = events_rx.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                command = commands_rx.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }
        }
        info!("dispatcher channels closed, stopping");
    }

    /// Device-event path.
    pub async fn handle_event(&self, event: InboundEvent) {
        match event.priority {
            1 | 2 => self.notify_and_log(&event).await,
            3 => info!(
                "junos event: {} on {}: {}",
                event.event_id, event.hostname, event.message
            ),
            _ => debug!("dropping priority-{} event {}", event.priority, event.event_id),
        }
    }

    async fn notify_and_log(&self, event: &InboundEvent) {
        let content = format_event_message(event);

        // No correlation id means no chat message to reference: log the
        // delivery failure locally and skip the record.
        let Some(correlation_id) = notify(&self.caps, &self.event_chat_id, &content).await else {
            error!(
                "event {} on {} not recorded: chat delivery failed",
                event.event_id, event.hostname
            );
            return;
        };

        let now = Local::now();
        let record = EventRecord {
            device: event.hostname.clone(),
            event: event.event_id.clone(),
            description: event.message.clone(),
            logdate: now.format("%Y-%m-%d").to_string(),
            logtime: now.format("%H:%M:%S").to_string(),
            source: encode_source_address(event.source_address),
            message: correlation_id,
        };
        if let Err(e) = self.caps.log.write(&self.log_table, &record).await {
            error!("event log write failed: {}", e);
        }
    }

    /// Chat-command path. Matches the phrase table, acknowledges, and
    /// launches one detached job per target device. Returns immediately.
    pub async fn handle_command(&self, command: ChatCommand) {
        let Some(action) = match_phrase(&command.raw_message) else {
            debug!("unmatched command: {}", command.raw_message);
            notify(
                &self.caps,
                &command.chat_id,
                "Sorry, I'm not sure what you're asking me to do",
            )
            .await;
            return;
        };

        let devices = command.devices();
        if devices.is_empty() {
            warn!("command without a DEVICE entity: {}", command.raw_message);
            notify(
                &self.caps,
                &command.chat_id,
                "Sorry, you'll need to give me a device name",
            )
            .await;
            return;
        }

        let lower = command.raw_message.to_lowercase();
        match action {
            PhraseAction::CollectLogs => {
                let kind = if lower.contains("extensive") {
                    ActionKind::CollectExtensiveLogs
                } else {
                    ActionKind::CollectLogs
                };
                for device in devices {
                    notify(
                        &self.caps,
                        &command.chat_id,
                        &format!("I'll get the logs for {}. Give me a few minutes", device),
                    )
                    .await;
                    self.launch(ActionJob {
                        id: Uuid::new_v4(),
                        device: device.to_string(),
                        chat_id: command.chat_id.clone(),
                        kind: kind.clone(),
                    });
                }
            }
            PhraseAction::Reboot => {
                let schedule = match RebootSchedule::from_entities(
                    command.first(EntityLabel::Time),
                    command.first(EntityLabel::Date),
                    Local::now().naive_local(),
                ) {
                    Ok(schedule) => schedule,
                    Err(e) => {
                        // Operator-input problem: report and stop before any
                        // device is contacted.
                        warn!("rejected reboot request: {}", e);
                        notify(&self.caps, &command.chat_id, &e.to_string()).await;
                        return;
                    }
                };
                for device in devices {
                    notify(&self.caps, &command.chat_id, &schedule.describe(device)).await;
                    self.launch(ActionJob {
                        id: Uuid::new_v4(),
                        device: device.to_string(),
                        chat_id: command.chat_id.clone(),
                        kind: ActionKind::Reboot {
                            schedule: schedule.clone(),
                        },
                    });
                }
            }
            PhraseAction::RestartProcess => {
                let Some(process) = command.first(EntityLabel::Process) else {
                    notify(
                        &self.caps,
                        &command.chat_id,
                        "I need at least one process to restart",
                    )
                    .await;
                    return;
                };
                let immediate = lower.contains("immediate");
                for device in devices {
                    notify(
                        &self.caps,
                        &command.chat_id,
                        &format!(
                            "Restarting the {} process on {}{}",
                            process,
                            device,
                            if immediate { " immediately" } else { "" }
                        ),
                    )
                    .await;
                    self.launch(ActionJob {
                        id: Uuid::new_v4(),
                        device: device.to_string(),
                        chat_id: command.chat_id.clone(),
                        kind: ActionKind::Restart {
                            process: process.to_string(),
                            immediate,
                        },
                    });
                }
            }
        }
    }

    /// Spawn one job as a detached task. Fire-and-forget by design: there
    /// is no join, no result channel, and no cancellation.
    pub fn launch(&self, job: ActionJob) {
        let caps = self.caps.clone();
        let ftp = self.ftp.clone();
        info!("launching job {} ({:?}) for {}", job.id, job.kind, job.device);
        tokio::spawn(async move {
            match job.kind {
                ActionKind::CollectLogs => {
                    handlers::diag::run(caps, ftp, job.device, job.chat_id, false).await;
                }
                ActionKind::CollectExtensiveLogs => {
                    handlers::diag::run(caps, ftp, job.device, job.chat_id, true).await;
                }
                ActionKind::Reboot { schedule } => {
                    handlers::reboot::run(caps, job.device, job.chat_id, schedule).await;
                }
                ActionKind::Restart { process, immediate } => {
                    handlers::restart::run(caps, job.device, job.chat_id, process, immediate)
                        .await;
                }
            }
        });
    }
}

/// Render an event for the notification channel: the cleaned message, the
/// reporting hostname, and any structured detail the agent attached.
fn format_event_message(event: &InboundEvent) -> String {
    match &event.detail {
        Some(detail) if event.priority == 1 => format!(
            "{} on <b>{}</b><br>{}",
            event.message,
            event.hostname,
            detail.render()
        ),
        _ => format!("{} on <b>{}</b>", event.message, event.hostname),
    }
}
