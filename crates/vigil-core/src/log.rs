// ── Event log ──
//
// Append-only audit/alert stream consumed by external reporting. Each
// entry kind has a fixed message format. Records are mirrored to
// `tracing` and broadcast to live subscribers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::model::{ItemKind, ItemRef, NotificationType, State, StateType, SuppressionReason};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub seq: u64,
    pub time: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DowntimePhase {
    Started,
    Stopped,
    Cancelled,
}

/// One loggable occurrence. Formatting lives here so every producer
/// emits the same shape for the same kind of event.
pub(crate) enum Entry<'a> {
    Check {
        item: &'a ItemRef,
        state: State,
        attempt: u32,
        output: &'a str,
        passive: bool,
    },
    Alert {
        item: &'a ItemRef,
        state: State,
        state_type: StateType,
        attempt: u32,
        output: &'a str,
    },
    Downtime {
        item: &'a ItemRef,
        phase: DowntimePhase,
    },
    ContactNotification {
        item: &'a ItemRef,
        contact: &'a str,
        notification_type: NotificationType,
        state: State,
        number: u32,
        command_name: &'a str,
        output: &'a str,
    },
    MasterNotification {
        item: &'a ItemRef,
        notification_type: NotificationType,
        number: u32,
        suppression: Option<SuppressionReason>,
    },
    ExternalCommand {
        line: &'a str,
    },
    CommandRejected {
        line: &'a str,
        reason: &'a str,
    },
    Warning {
        message: String,
    },
}

fn prefix(item: &ItemRef) -> &'static str {
    match item.kind() {
        ItemKind::Host => "HOST",
        ItemKind::Service => "SERVICE",
    }
}

impl Entry<'_> {
    fn render(&self) -> (LogLevel, String) {
        match self {
            Self::Check {
                item,
                state,
                attempt,
                output,
                passive,
            } => (
                state.log_level(),
                format!(
                    "{} {} CHECK: {item};{state};{attempt};{output}",
                    if *passive { "PASSIVE" } else { "ACTIVE" },
                    prefix(item),
                ),
            ),
            Self::Alert {
                item,
                state,
                state_type,
                attempt,
                output,
            } => (
                state.log_level(),
                format!(
                    "{} ALERT: {item};{state};{state_type};{attempt};{output}",
                    prefix(item)
                ),
            ),
            Self::Downtime { item, phase } => {
                let noun = match item.kind() {
                    ItemKind::Host => "Host",
                    ItemKind::Service => "Service",
                };
                let tail = match phase {
                    DowntimePhase::Started => {
                        format!("STARTED; {noun} has entered a period of scheduled downtime")
                    }
                    DowntimePhase::Stopped => {
                        format!("STOPPED; {noun} has exited from a period of scheduled downtime")
                    }
                    DowntimePhase::Cancelled => format!(
                        "CANCELLED; Scheduled downtime for {} has been cancelled.",
                        noun.to_lowercase()
                    ),
                };
                (
                    LogLevel::Info,
                    format!("{} DOWNTIME ALERT: {item};{tail}", prefix(item)),
                )
            }
            Self::ContactNotification {
                item,
                contact,
                notification_type,
                state,
                number,
                command_name,
                output,
            } => {
                let (level, label) = match notification_type {
                    NotificationType::Problem => (state.log_level(), state.to_string()),
                    NotificationType::Recovery => (LogLevel::Info, state.to_string()),
                    NotificationType::DowntimeStart | NotificationType::DowntimeEnd => {
                        (LogLevel::Info, format!("{notification_type} ({state})"))
                    }
                };
                (
                    level,
                    format!(
                        "{} NOTIFICATION: {contact};{item};{label};{number};{command_name};{output}",
                        prefix(item)
                    ),
                )
            }
            Self::MasterNotification {
                item,
                notification_type,
                number,
                suppression,
            } => {
                let outcome = match suppression {
                    None => "DISPATCHED".to_owned(),
                    Some(reason) => format!("SUPPRESSED ({reason})"),
                };
                (
                    LogLevel::Info,
                    format!(
                        "{} NOTIFICATION MASTER: {item};{notification_type};{number};{outcome}",
                        prefix(item)
                    ),
                )
            }
            Self::ExternalCommand { line } => {
                (LogLevel::Info, format!("EXTERNAL COMMAND: {line}"))
            }
            Self::CommandRejected { line, reason } => (
                LogLevel::Error,
                format!("EXTERNAL COMMAND REJECTED: {reason}: {line}"),
            ),
            Self::Warning { message } => (LogLevel::Warning, format!("WARNING: {message}")),
        }
    }
}

/// Append-only, per-engine event log.
#[derive(Debug, Default)]
pub struct EventLog {
    records: Vec<LogRecord>,
    next_seq: u64,
    subscribers: Option<broadcast::Sender<Arc<LogRecord>>>,
    /// Keep at most this many stored records, dropping the oldest.
    retention: Option<usize>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log that also broadcasts each record to `tx`'s subscribers.
    pub fn with_broadcast(tx: broadcast::Sender<Arc<LogRecord>>) -> Self {
        Self {
            subscribers: Some(tx),
            ..Self::default()
        }
    }

    /// Bound the stored records to the newest `limit`. Subscribers still
    /// see every record.
    #[must_use]
    pub fn with_retention(mut self, limit: usize) -> Self {
        self.retention = Some(limit);
        self.trim();
        self
    }

    pub(crate) fn record(&mut self, time: DateTime<Utc>, entry: &Entry<'_>) {
        let (level, message) = entry.render();
        self.append(time, level, message);
    }

    pub fn append(&mut self, time: DateTime<Utc>, level: LogLevel, message: String) {
        match level {
            LogLevel::Info => info!(target: "vigil::events", "{message}"),
            LogLevel::Warning => warn!(target: "vigil::events", "{message}"),
            LogLevel::Error => error!(target: "vigil::events", "{message}"),
        }

        let record = LogRecord {
            seq: self.next_seq,
            time,
            level,
            message,
        };
        self.next_seq += 1;

        if let Some(tx) = &self.subscribers {
            // No receivers is fine.
            let _ = tx.send(Arc::new(record.clone()));
        }
        self.records.push(record);
        self.trim();
    }

    fn trim(&mut self) {
        if let Some(limit) = self.retention {
            let excess = self.records.len().saturating_sub(limit);
            if excess > 0 {
                self.records.drain(..excess);
            }
        }
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// `(level, message)` pairs in occurrence order.
    pub fn entries(&self) -> Vec<(LogLevel, &str)> {
        self.records
            .iter()
            .map(|r| (r.level, r.message.as_str()))
            .collect()
    }

    /// Records matching an optional level and an optional substring.
    pub fn filter(&self, level: Option<LogLevel>, text: Option<&str>) -> Vec<&LogRecord> {
        self.records
            .iter()
            .filter(|r| level.is_none_or(|l| r.level == l))
            .filter(|r| text.is_none_or(|t| r.message.contains(t)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop stored records. Sequence numbers keep increasing.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}
