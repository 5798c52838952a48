// ── Contact domain types ──
//
// Contacts, their notification periods and the escalation chain are
// owned by the configuration store; the engine only reads them.

use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// A contact's notification period. Daily ranges are evaluated in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePeriod {
    #[default]
    Always,
    Never,
    Daily(Vec<DailyRange>),
}

impl TimePeriod {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Daily(ranges) => {
                let time = at.time();
                ranges.iter().any(|r| r.contains(time))
            }
        }
    }
}

/// `HH:MM-HH:MM`; a range whose end precedes its start wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl DailyRange {
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= time && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

impl FromStr for DailyRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| format!("expected HH:MM-HH:MM, got '{s}'"))?;
        let parse = |t: &str| {
            NaiveTime::parse_from_str(t.trim(), "%H:%M")
                .map_err(|e| format!("invalid time '{}': {e}", t.trim()))
        };
        Ok(Self {
            start: parse(start)?,
            end: parse(end)?,
        })
    }
}

/// Named command line template with `$MACRO$` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub name: String,
    pub line: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub alias: Option<String>,
    pub notifications_enabled: bool,
    pub period: TimePeriod,
    pub host_command: CommandTemplate,
    pub service_command: CommandTemplate,
}

/// Replaces the item contacts for notification numbers in
/// `first_notification..=last_notification` (`last == 0` is open ended).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escalation {
    pub first_notification: u32,
    pub last_notification: u32,
    pub contacts: Vec<String>,
}

impl Escalation {
    pub fn applies_to(&self, number: u32) -> bool {
        number >= self.first_notification
            && (self.last_notification == 0 || number <= self.last_notification)
    }
}
