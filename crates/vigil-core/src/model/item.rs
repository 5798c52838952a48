// ── Monitored item domain types ──

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::comment::Comment;
use super::downtime::Downtime;
use super::ids::{CommentId, DowntimeId, ItemKind, ItemRef};
use crate::log::LogLevel;

// ── States ──────────────────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum HostState {
    Up,
    Down,
    Unreachable,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ServiceState {
    Ok,
    Warning,
    Critical,
    Unknown,
}

/// Health state of an item; the variant always matches the item kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum State {
    Host(HostState),
    Service(ServiceState),
}

impl State {
    /// The healthy state for an item kind.
    pub fn ok_for(kind: ItemKind) -> Self {
        match kind {
            ItemKind::Host => Self::Host(HostState::Up),
            ItemKind::Service => Self::Service(ServiceState::Ok),
        }
    }

    /// Map a plugin return code to a state.
    ///
    /// Hosts: 0 UP, 1 DOWN, 2 UNREACHABLE. Services: 0 OK, 1 WARNING,
    /// 2 CRITICAL, 3 UNKNOWN. Anything else is rejected.
    pub fn from_code(kind: ItemKind, code: u8) -> Option<Self> {
        match (kind, code) {
            (ItemKind::Host, 0) => Some(Self::Host(HostState::Up)),
            (ItemKind::Host, 1) => Some(Self::Host(HostState::Down)),
            (ItemKind::Host, 2) => Some(Self::Host(HostState::Unreachable)),
            (ItemKind::Service, 0) => Some(Self::Service(ServiceState::Ok)),
            (ItemKind::Service, 1) => Some(Self::Service(ServiceState::Warning)),
            (ItemKind::Service, 2) => Some(Self::Service(ServiceState::Critical)),
            (ItemKind::Service, 3) => Some(Self::Service(ServiceState::Unknown)),
            _ => None,
        }
    }

    pub fn kind(self) -> ItemKind {
        match self {
            Self::Host(_) => ItemKind::Host,
            Self::Service(_) => ItemKind::Service,
        }
    }

    /// OK for services, UP for hosts.
    pub fn is_ok(self) -> bool {
        matches!(
            self,
            Self::Host(HostState::Up) | Self::Service(ServiceState::Ok)
        )
    }

    /// Level used when this state shows up in the event log.
    pub fn log_level(self) -> LogLevel {
        match self {
            Self::Host(HostState::Up) | Self::Service(ServiceState::Ok) => LogLevel::Info,
            Self::Host(HostState::Unreachable) | Self::Service(ServiceState::Warning) => {
                LogLevel::Warning
            }
            Self::Host(HostState::Down)
            | Self::Service(ServiceState::Critical | ServiceState::Unknown) => LogLevel::Error,
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Host(s) => write!(f, "{s}"),
            Self::Service(s) => write!(f, "{s}"),
        }
    }
}

/// Confirmation status of the current state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum StateType {
    Soft,
    Hard,
}

// ── Item settings ───────────────────────────────────────────────────

/// Per-item tuning supplied by the configuration store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSettings {
    pub max_attempts: u32,
    /// Seconds between re-notifications of an outstanding problem. 0 = notify once.
    pub notification_interval_secs: u64,
    pub notifications_enabled: bool,
}

impl Default for ItemSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            notification_interval_secs: 3600,
            notifications_enabled: true,
        }
    }
}

// ── MonitoredItem ───────────────────────────────────────────────────

/// A host or service under monitoring, together with the downtimes and
/// comments it owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredItem {
    pub item: ItemRef,
    pub state: State,
    pub state_type: StateType,
    pub attempt: u32,
    pub max_attempts: u32,
    pub output: String,
    pub last_check: Option<DateTime<Utc>>,

    pub downtimes: IndexMap<DowntimeId, Downtime>,
    pub(crate) scheduled_downtime_depth: u32,
    pub comments: IndexMap<CommentId, Comment>,

    pub current_notification_number: u32,
    pub notifications_enabled: bool,
    pub notification_interval_secs: u64,

    /// Contacts that received the current problem, for recovery fan-out.
    #[serde(default)]
    pub(crate) notified_contacts: BTreeSet<String>,
}

impl MonitoredItem {
    /// New item in HARD OK/UP, attempt 1.
    pub fn new(item: ItemRef, settings: &ItemSettings) -> Self {
        let state = State::ok_for(item.kind());
        Self {
            item,
            state,
            state_type: StateType::Hard,
            attempt: 1,
            max_attempts: settings.max_attempts.max(1),
            output: String::new(),
            last_check: None,
            downtimes: IndexMap::new(),
            scheduled_downtime_depth: 0,
            comments: IndexMap::new(),
            current_notification_number: 0,
            notifications_enabled: settings.notifications_enabled,
            notification_interval_secs: settings.notification_interval_secs,
            notified_contacts: BTreeSet::new(),
        }
    }

    pub fn kind(&self) -> ItemKind {
        self.item.kind()
    }

    /// Number of downtimes currently in effect.
    pub fn scheduled_downtime_depth(&self) -> u32 {
        self.scheduled_downtime_depth
    }

    pub fn in_scheduled_downtime(&self) -> bool {
        self.scheduled_downtime_depth > 0
    }

    /// Confirmed (HARD) non-OK state.
    pub fn is_hard_problem(&self) -> bool {
        self.state_type == StateType::Hard && !self.state.is_ok()
    }
}
