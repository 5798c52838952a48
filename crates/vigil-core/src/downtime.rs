// ── Downtime manager ──
//
// Lifecycle of scheduled downtimes: scheduling, time-driven activation
// and expiry, problem-driven activation of flexible downtimes, trigger
// chain release and cancellation. Announcements are not sent from here;
// every start/stop is collected as a `DowntimeEvent` and handed to the
// notification engine by the caller once the manager is done.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::comments;
use crate::error::CoreError;
use crate::log::{DowntimePhase, Entry, EventLog};
use crate::model::{Downtime, DowntimeId, DowntimeRequest, ItemKind, NotificationType};
use crate::registry::Registry;
use crate::state::TransitionEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DowntimeEventKind {
    Started,
    Stopped,
    Cancelled,
}

impl DowntimeEventKind {
    /// Announcement sent to contacts for this event.
    pub fn notification_type(self) -> NotificationType {
        match self {
            Self::Started => NotificationType::DowntimeStart,
            Self::Stopped | Self::Cancelled => NotificationType::DowntimeEnd,
        }
    }

    fn phase(self) -> DowntimePhase {
        match self {
            Self::Started => DowntimePhase::Started,
            Self::Stopped => DowntimePhase::Stopped,
            Self::Cancelled => DowntimePhase::Cancelled,
        }
    }
}

/// A downtime entering or leaving effect. `downtime` is a snapshot taken
/// at that moment (it may already be gone from its item).
#[derive(Debug, Clone)]
pub struct DowntimeEvent {
    pub kind: DowntimeEventKind,
    pub downtime: Downtime,
}

/// Borrowing view over the registry and log for one engine step.
pub struct DowntimeManager<'a> {
    registry: &'a mut Registry,
    log: &'a mut EventLog,
    events: Vec<DowntimeEvent>,
}

impl<'a> DowntimeManager<'a> {
    pub fn new(registry: &'a mut Registry, log: &'a mut EventLog) -> Self {
        Self {
            registry,
            log,
            events: Vec::new(),
        }
    }

    /// Start/stop events collected so far, in occurrence order.
    pub fn into_events(self) -> Vec<DowntimeEvent> {
        self.events
    }

    // ── Scheduling ───────────────────────────────────────────────────

    /// Validate and attach a new pending downtime.
    pub fn schedule(
        &mut self,
        request: DowntimeRequest,
        now: DateTime<Utc>,
    ) -> Result<DowntimeId, CoreError> {
        self.registry.resolve(&request.item)?;
        let downtime = Downtime::new(request, now)?;
        let id = downtime.id;
        self.insert(downtime, now)?;
        Ok(id)
    }

    /// Attach an already validated downtime, link it under its trigger and
    /// activate it at once if it is due.
    pub(crate) fn insert(
        &mut self,
        mut downtime: Downtime,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let dangling = downtime
            .trigger_id
            .filter(|parent| self.registry.downtime(parent).is_none());
        if let Some(parent) = dangling {
            self.warn(
                now,
                format!(
                    "trigger downtime {parent} not found, downtime {} is self-triggered",
                    downtime.id
                ),
            );
            downtime.trigger_id = None;
        }

        let id = downtime.id;
        let trigger = downtime.trigger_id;
        let fixed = downtime.fixed;
        let window_open = downtime.window_open(now);
        debug!(downtime_id = %id, item = %downtime.item, fixed, "downtime scheduled");
        self.registry.attach_downtime(downtime)?;

        match trigger {
            Some(parent) => {
                let parent_active = self.registry.downtime_mut(&parent).is_some_and(|p| {
                    p.activate_me.push(id);
                    p.is_in_effect
                });
                if parent_active && window_open {
                    self.activate(id, now);
                }
            }
            None if fixed && window_open => {
                self.activate(id, now);
            }
            None => {}
        }
        Ok(())
    }

    /// Re-attach a deserialized downtime. An active one re-enters effect:
    /// depth is re-derived and a missing comment is recreated.
    pub fn restore(&mut self, mut downtime: Downtime, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.registry.resolve(&downtime.item)?;
        if let Some(previous) = self.registry.detach_downtime(&downtime.id) {
            debug!(downtime_id = %downtime.id, "replacing downtime on restore");
            self.release_effect(&previous, now);
        }

        let owner = downtime.item.clone();
        let active = downtime.is_in_effect;
        let item = self
            .registry
            .get_mut(&owner)
            .ok_or_else(|| CoreError::UnknownTarget {
                target: owner.to_string(),
            })?;

        if active {
            item.scheduled_downtime_depth += 1;
            let has_comment = downtime
                .comment_id
                .is_some_and(|cid| item.comments.contains_key(&cid));
            if !has_comment {
                let text = comment_text(&downtime, item.kind());
                downtime.comment_id = Some(comments::add(item, &downtime.author, text, now));
            }
        } else {
            downtime.comment_id = None;
        }
        self.registry.attach_downtime(downtime)
    }

    // ── Time and state driven activation ─────────────────────────────

    /// Expire finished downtimes, drop stale pending ones and start fixed
    /// downtimes whose window is open. Oldest `entry_time` first.
    pub fn on_time_tick(&mut self, now: DateTime<Utc>) {
        let mut expired = Vec::new();
        let mut stale = Vec::new();
        for dt in self.registry.downtimes() {
            if dt.is_in_effect {
                if dt.real_end_time <= now {
                    expired.push(dt.id);
                }
            } else if dt.end_time <= now {
                stale.push(dt.id);
            }
        }
        for id in expired {
            self.deactivate(&id, DowntimeEventKind::Stopped, now);
        }
        for id in stale {
            self.discard(&id, now);
        }

        // Scanned after removals so children orphaned above start this tick.
        let due: Vec<DowntimeId> = self
            .registry
            .downtimes()
            .into_iter()
            .filter(|dt| {
                dt.is_pending() && dt.fixed && dt.trigger_id.is_none() && dt.window_open(now)
            })
            .map(|dt| dt.id)
            .collect();
        for id in due {
            self.activate(id, now);
        }
    }

    /// Start pending flexible downtimes of the item when it sits in a
    /// confirmed problem inside their window.
    pub fn on_state_transition(&mut self, event: &TransitionEvent, now: DateTime<Utc>) {
        if !event.is_hard_problem() {
            return;
        }
        let Some(item) = self.registry.get(&event.item) else {
            return;
        };

        let mut due: Vec<&Downtime> = item
            .downtimes
            .values()
            .filter(|dt| {
                !dt.fixed && dt.trigger_id.is_none() && dt.is_pending() && dt.window_open(now)
            })
            .collect();
        due.sort_by_key(|dt| dt.entry_time);
        let due: Vec<DowntimeId> = due.into_iter().map(|dt| dt.id).collect();

        for id in due {
            self.activate(id, now);
        }
    }

    // ── Activation ───────────────────────────────────────────────────

    /// Put a downtime in effect and release the downtimes it triggers.
    pub fn activate(&mut self, id: DowntimeId, now: DateTime<Utc>) {
        let mut visited = HashSet::new();
        self.activate_chain(id, now, &mut visited);
    }

    fn activate_chain(
        &mut self,
        id: DowntimeId,
        now: DateTime<Utc>,
        visited: &mut HashSet<DowntimeId>,
    ) {
        if !visited.insert(id) {
            self.warn(now, format!("downtime trigger cycle through {id}"));
            return;
        }
        let Some(owner) = self.registry.owner_of(&id).cloned() else {
            self.warn(now, format!("downtime {id} vanished before activation"));
            return;
        };
        let Some(item) = self.registry.get_mut(&owner) else {
            return;
        };
        let Some(dt) = item.downtimes.get(&id) else {
            return;
        };
        if dt.is_in_effect {
            return;
        }

        let text = comment_text(dt, owner.kind());
        let author = dt.author.clone();
        let comment_id = comments::add(item, &author, text, now);
        item.scheduled_downtime_depth += 1;

        let Some(dt) = item.downtimes.get_mut(&id) else {
            return;
        };
        dt.is_in_effect = true;
        dt.has_been_triggered = true;
        dt.real_end_time = dt.end_if_started_at(now);
        dt.comment_id = Some(comment_id);
        let snapshot = dt.clone();

        debug!(downtime_id = %id, item = %owner, real_end = %snapshot.real_end_time, "downtime started");
        self.log.record(
            now,
            &Entry::Downtime {
                item: &owner,
                phase: DowntimePhase::Started,
            },
        );

        let children = snapshot.activate_me.clone();
        self.events.push(DowntimeEvent {
            kind: DowntimeEventKind::Started,
            downtime: snapshot,
        });

        for child in children {
            let ready = self
                .registry
                .downtime(&child)
                .is_some_and(|c| c.is_pending() && c.window_open(now));
            if ready {
                self.activate_chain(child, now, visited);
            }
        }
    }

    // ── Deactivation and cancellation ────────────────────────────────

    /// Take a downtime out of effect and delete it. A pending downtime is
    /// deleted without any event.
    fn deactivate(&mut self, id: &DowntimeId, kind: DowntimeEventKind, now: DateTime<Utc>) {
        let Some(mut dt) = self.registry.detach_downtime(id) else {
            return;
        };
        self.unlink_from_parent(&dt);

        if kind != DowntimeEventKind::Cancelled {
            self.orphan_children(&dt, now);
        }
        if !dt.is_in_effect {
            debug!(downtime_id = %id, "pending downtime removed");
            return;
        }

        let owner = dt.item.clone();
        self.release_effect(&dt, now);
        dt.is_in_effect = false;
        dt.can_be_deleted = true;
        dt.comment_id = None;

        debug!(downtime_id = %id, item = %owner, ?kind, "downtime ended");
        self.log.record(
            now,
            &Entry::Downtime {
                item: &owner,
                phase: kind.phase(),
            },
        );
        self.events.push(DowntimeEvent { kind, downtime: dt });
    }

    /// Cancel a downtime and everything it triggers. Unknown ids are a
    /// warning and a no-op; returns whether anything was cancelled.
    pub fn cancel(&mut self, id: &DowntimeId, now: DateTime<Utc>) -> bool {
        if self.registry.downtime(id).is_none() {
            self.warn(now, format!("cannot cancel downtime {id}: not found"));
            return false;
        }
        let mut visited = HashSet::new();
        self.cancel_chain(*id, now, &mut visited);
        true
    }

    fn cancel_chain(
        &mut self,
        id: DowntimeId,
        now: DateTime<Utc>,
        visited: &mut HashSet<DowntimeId>,
    ) {
        if !visited.insert(id) {
            return;
        }
        let Some(children) = self.registry.downtime(&id).map(|dt| dt.activate_me.clone()) else {
            return;
        };
        self.deactivate(&id, DowntimeEventKind::Cancelled, now);
        for child in children {
            self.cancel_chain(child, now, visited);
        }
    }

    /// Silently delete a downtime that never entered effect.
    fn discard(&mut self, id: &DowntimeId, now: DateTime<Utc>) {
        if let Some(dt) = self.registry.detach_downtime(id) {
            self.unlink_from_parent(&dt);
            self.orphan_children(&dt, now);
            debug!(downtime_id = %id, item = %dt.item, "pending downtime expired without activation");
        }
    }

    /// Undo the depth and comment of a detached downtime that was in effect.
    fn release_effect(&mut self, dt: &Downtime, now: DateTime<Utc>) {
        if !dt.is_in_effect {
            return;
        }
        let owner = &dt.item;
        let mut inconsistent = false;
        if let Some(item) = self.registry.get_mut(owner) {
            if item.scheduled_downtime_depth == 0 {
                inconsistent = true;
            } else {
                item.scheduled_downtime_depth -= 1;
            }
            if let Some(cid) = dt.comment_id {
                comments::remove(item, &cid);
            }
        }
        if inconsistent {
            self.warn(
                now,
                format!(
                    "downtime depth of {owner} already zero while ending downtime {}",
                    dt.id
                ),
            );
        }
    }

    /// Pending children of a removed parent fall back to self-triggered.
    fn orphan_children(&mut self, parent: &Downtime, now: DateTime<Utc>) {
        for child_id in &parent.activate_me {
            let Some(child) = self.registry.downtime_mut(child_id) else {
                continue;
            };
            if child.trigger_id != Some(parent.id) || !child.is_pending() {
                continue;
            }
            child.trigger_id = None;
            self.warn(
                now,
                format!(
                    "trigger downtime {} is gone, downtime {child_id} is self-triggered",
                    parent.id
                ),
            );
        }
    }

    fn unlink_from_parent(&mut self, dt: &Downtime) {
        if let Some(parent) = dt.trigger_id.and_then(|p| self.registry.downtime_mut(&p)) {
            parent.activate_me.retain(|child| *child != dt.id);
        }
    }

    fn warn(&mut self, now: DateTime<Utc>, message: String) {
        warn!("{message}");
        self.log.record(now, &Entry::Warning { message });
    }
}

/// Comment attached to an item while a downtime is in effect.
fn comment_text(dt: &Downtime, kind: ItemKind) -> String {
    const STAMP: &str = "%Y-%m-%d %H:%M:%S";
    let noun = match kind {
        ItemKind::Host => "host",
        ItemKind::Service => "service",
    };
    let start = dt.start_time.format(STAMP);
    let end = dt.end_time.format(STAMP);
    if dt.fixed {
        format!(
            "This {noun} has been scheduled for fixed downtime from {start} to {end}. \
             Notifications for the {noun} will not be sent out during that time period."
        )
    } else {
        let hours = dt.duration_secs / 3600;
        let minutes = (dt.duration_secs % 3600) / 60;
        format!(
            "This {noun} has been scheduled for flexible downtime starting between {start} and \
             {end} and lasting for a period of {hours} hours and {minutes} minutes. \
             Notifications for the {noun} will not be sent out during that time period."
        )
    }
}
