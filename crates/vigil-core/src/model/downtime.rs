// ── Scheduled downtime ──
//
// A downtime is owned by the item it targets. Other downtimes refer to
// it only by id (`trigger_id`, `activate_me`), resolved through the
// engine's lookup table.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CommentId, DowntimeId, ItemRef};
use crate::error::CoreError;

/// Parameters of a `schedule` call, as decoded from an external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DowntimeRequest {
    pub item: ItemRef,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub fixed: bool,
    pub trigger_id: Option<DowntimeId>,
    /// Length of the active period of a flexible downtime, in seconds.
    /// Ignored (recomputed) for fixed downtimes.
    pub duration_secs: i64,
    pub author: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Downtime {
    pub id: DowntimeId,
    #[serde(rename = "ref")]
    pub item: ItemRef,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub fixed: bool,
    pub duration_secs: i64,
    pub trigger_id: Option<DowntimeId>,
    pub author: String,
    pub comment: String,
    pub entry_time: DateTime<Utc>,

    pub is_in_effect: bool,
    pub real_end_time: DateTime<Utc>,
    pub has_been_triggered: bool,
    pub can_be_deleted: bool,
    pub activate_me: Vec<DowntimeId>,
    pub comment_id: Option<CommentId>,
}

impl Downtime {
    /// Build a pending downtime. Fixed downtimes get `duration = end - start`.
    pub fn new(request: DowntimeRequest, entry_time: DateTime<Utc>) -> Result<Self, CoreError> {
        let DowntimeRequest {
            item,
            start_time,
            end_time,
            fixed,
            trigger_id,
            duration_secs,
            author,
            comment,
        } = request;

        let duration_secs = if fixed {
            if end_time <= start_time {
                return Err(CoreError::InvalidWindow {
                    reason: format!(
                        "end time {} is not after start time {}",
                        end_time.timestamp(),
                        start_time.timestamp()
                    ),
                });
            }
            (end_time - start_time).num_seconds()
        } else {
            if duration_secs <= 0 {
                return Err(CoreError::InvalidWindow {
                    reason: format!("flexible downtime needs a positive duration, got {duration_secs}"),
                });
            }
            let fits = TimeDelta::try_seconds(duration_secs)
                .and_then(|d| end_time.checked_add_signed(d))
                .is_some();
            if !fits {
                return Err(CoreError::InvalidWindow {
                    reason: format!("flexible downtime duration {duration_secs} is out of range"),
                });
            }
            duration_secs
        };

        Ok(Self {
            id: DowntimeId::new(),
            item,
            start_time,
            end_time,
            fixed,
            duration_secs,
            trigger_id,
            author,
            comment,
            entry_time,
            is_in_effect: false,
            real_end_time: end_time,
            has_been_triggered: false,
            can_be_deleted: false,
            activate_me: Vec::new(),
            comment_id: None,
        })
    }

    /// `None` when the stored duration does not fit a `TimeDelta`, which
    /// only a hand-edited serialized downtime can carry.
    pub fn duration(&self) -> Option<TimeDelta> {
        TimeDelta::try_seconds(self.duration_secs)
    }

    /// End of the active period when the downtime starts at `now`.
    /// Saturates at the latest representable instant.
    pub fn end_if_started_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        if self.fixed {
            return self.end_time;
        }
        self.duration()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Window accepts activation at `now`. The end bound is exclusive:
    /// a downtime reaching its end at the same instant expires instead.
    pub fn window_open(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now < self.end_time
    }

    /// Never activated, waiting for its window, a problem, or its trigger.
    pub fn is_pending(&self) -> bool {
        !self.is_in_effect && !self.has_been_triggered && !self.can_be_deleted
    }

    pub fn to_json(&self) -> Result<serde_json::Value, CoreError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, CoreError> {
        Ok(serde_json::from_value(value)?)
    }
}

impl fmt::Display for Downtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const CTIME: &str = "%a %b %e %H:%M:%S %Y";
        write!(
            f,
            "{} {} Downtime id={} {} - {}",
            if self.is_in_effect { "active" } else { "inactive" },
            if self.fixed { "fixed" } else { "flexible" },
            self.id,
            self.start_time.format(CTIME),
            self.end_time.format(CTIME),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn request(fixed: bool, start: i64, end: i64, duration: i64) -> DowntimeRequest {
        DowntimeRequest {
            item: ItemRef::host("host.uuid"),
            start_time: at(start),
            end_time: at(end),
            fixed,
            trigger_id: None,
            duration_secs: duration,
            author: "me".into(),
            comment: "created by me!".into(),
        }
    }

    #[test]
    fn fixed_duration_is_derived_from_window() {
        let now = 1_527_877_800;
        let dt = Downtime::new(request(true, now, now + 5, 0), at(now)).unwrap();
        assert_eq!(dt.duration_secs, 5);
        assert_eq!(dt.real_end_time, dt.end_time);
        assert!(!dt.is_in_effect);
        assert!(!dt.has_been_triggered);
        assert!(!dt.can_be_deleted);
        assert!(dt.activate_me.is_empty());
        assert!(dt.comment_id.is_none());
    }

    #[test]
    fn fixed_rejects_empty_window() {
        let err = Downtime::new(request(true, 100, 100, 0), at(0)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidWindow { .. }));
    }

    #[test]
    fn flexible_rejects_non_positive_duration() {
        let err = Downtime::new(request(false, 0, 3600, 0), at(0)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidWindow { .. }));
        assert!(Downtime::new(request(false, 0, 3600, -5), at(0)).is_err());
    }

    #[test]
    fn flexible_rejects_out_of_range_duration() {
        let err = Downtime::new(request(false, 0, 3600, i64::MAX), at(0)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidWindow { .. }));
    }

    #[test]
    fn oversized_restored_duration_saturates() {
        let mut dt = Downtime::new(request(false, 0, 3600, 5), at(0)).unwrap();
        dt.duration_secs = i64::MAX;
        assert!(dt.duration().is_none());
        assert_eq!(dt.end_if_started_at(at(10)), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn json_round_trip_is_lossless() {
        let mut dt = Downtime::new(request(false, 10, 3610, 5), at(10)).unwrap();
        dt.activate_me.push(DowntimeId::new());
        dt.trigger_id = Some(DowntimeId::new());
        dt.comment_id = Some(CommentId::new());
        dt.is_in_effect = true;
        dt.has_been_triggered = true;

        let restored = Downtime::from_json(dt.to_json().unwrap()).unwrap();
        assert_eq!(dt, restored);
    }

    #[test]
    fn serialized_form_uses_ref_key() {
        let dt = Downtime::new(request(true, 0, 60, 0), at(0)).unwrap();
        let json = dt.to_json().unwrap();
        assert_eq!(json["ref"]["kind"], "host");
        assert_eq!(json["ref"]["host"], "host.uuid");
        assert_eq!(json["duration_secs"], 60);
    }

    #[test]
    fn window_end_is_exclusive() {
        let dt = Downtime::new(request(true, 100, 200, 0), at(0)).unwrap();
        assert!(!dt.window_open(at(99)));
        assert!(dt.window_open(at(100)));
        assert!(dt.window_open(at(199)));
        assert!(!dt.window_open(at(200)));
    }

    #[test]
    fn display_shows_activity_and_kind() {
        let dt = Downtime::new(request(true, 0, 60, 0), at(0)).unwrap();
        let text = dt.to_string();
        assert!(text.starts_with("inactive fixed Downtime id="));
        assert!(text.contains(&dt.id.to_string()));
    }
}
