// ── Notification domain types ──
//
// Masters are the escalation anchor for a state event; contact
// notifications hang off a master (or off a downtime announcement) and
// are the only ones that reach the transport.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::ids::{ItemRef, NotificationId};
use super::item::State;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum NotificationType {
    Problem,
    Recovery,
    DowntimeStart,
    DowntimeEnd,
}

impl NotificationType {
    /// Downtime announcements bypass downtime suppression and leave the
    /// notification number untouched.
    pub fn is_downtime_announcement(self) -> bool {
        matches!(self, Self::DowntimeStart | Self::DowntimeEnd)
    }
}

/// Why a master produced no contact notification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SuppressionReason {
    Downtime,
    NotificationsDisabled,
    OutsidePeriod,
    NoContacts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum NotificationKind {
    Master {
        /// Set when no contact was notified.
        suppression: Option<SuppressionReason>,
        /// Contacts that received a contact notification under this master.
        contacts: Vec<String>,
        /// Re-notification deadline for outstanding problems.
        next_notification_at: Option<DateTime<Utc>>,
    },
    Contact {
        master: Option<NotificationId>,
        contact: String,
        command_name: String,
        command_line: String,
        env: BTreeMap<String, String>,
        escalated: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub item: ItemRef,
    pub notification_type: NotificationType,
    pub state: State,
    pub output: String,
    /// `current_notification_number` of the item when this was raised.
    pub number: u32,
    pub created_at: DateTime<Utc>,
    pub author: Option<String>,
    pub comment: Option<String>,
    pub kind: NotificationKind,
}

impl Notification {
    pub fn is_master(&self) -> bool {
        matches!(self.kind, NotificationKind::Master { .. })
    }

    /// A master nobody received. Contact notifications are never suppressed:
    /// excluded contacts simply get none.
    pub fn suppressed(&self) -> bool {
        matches!(
            self.kind,
            NotificationKind::Master {
                suppression: Some(_),
                ..
            }
        )
    }

    /// Command line handed to the transport; `None` for masters.
    pub fn command_line(&self) -> Option<&str> {
        match &self.kind {
            NotificationKind::Contact { command_line, .. } => Some(command_line),
            NotificationKind::Master { .. } => None,
        }
    }

    pub fn contact(&self) -> Option<&str> {
        match &self.kind {
            NotificationKind::Contact { contact, .. } => Some(contact),
            NotificationKind::Master { .. } => None,
        }
    }
}
