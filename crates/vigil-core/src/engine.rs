// ── Engine ──
//
// Serializes every event against one registry: time ticks, check
// results, external commands and cancellations. Each event first runs
// the time sweep at its `now`, then flows through the state machine, the
// downtime manager and the notification engine in that order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::command::{self, ExternalCommand, ParsedCommand};
use crate::downtime::{DowntimeEvent, DowntimeManager};
use crate::error::CoreError;
use crate::log::{Entry, EventLog};
use crate::model::{
    Downtime, DowntimeId, DowntimeRequest, ItemRef, MonitoredItem, Notification, State,
    StateType,
};
use crate::notify::{ContactDirectory, NotificationEngine};
use crate::registry::Registry;
use crate::state::{self, TransitionEvent};

/// Input accepted by [`Engine::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    CheckResult {
        item: ItemRef,
        state: State,
        output: String,
    },
    Command(String),
    CancelDowntime(DowntimeId),
    Tick,
}

/// What an event did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Transition(TransitionEvent),
    DowntimeScheduled { id: DowntimeId },
    DowntimeCancelled { id: DowntimeId, found: bool },
    Ticked,
}

/// Point-in-time copy of the engine for readers outside the actor.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub taken_at: DateTime<Utc>,
    pub items: Vec<MonitoredItem>,
    pub pending_actions: Vec<Notification>,
}

#[derive(Debug)]
pub struct Engine {
    registry: Registry,
    notifier: NotificationEngine,
    log: EventLog,
}

impl Engine {
    pub fn new(registry: Registry, directory: Arc<dyn ContactDirectory>) -> Self {
        Self {
            registry,
            notifier: NotificationEngine::new(directory),
            log: EventLog::new(),
        }
    }

    /// Replace the event log, e.g. with one that broadcasts.
    #[must_use]
    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = log;
        self
    }

    /// Process one event at `now`.
    pub fn handle(&mut self, now: DateTime<Utc>, event: EngineEvent) -> Result<Outcome, CoreError> {
        match event {
            EngineEvent::CheckResult {
                item,
                state,
                output,
            } => self
                .process_check_result(&item, state, &output, now)
                .map(Outcome::Transition),
            EngineEvent::Command(line) => self.process_command(&line, now),
            EngineEvent::CancelDowntime(id) => Ok(Outcome::DowntimeCancelled {
                id,
                found: self.cancel_downtime(&id, now),
            }),
            EngineEvent::Tick => {
                self.tick(now);
                Ok(Outcome::Ticked)
            }
        }
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Time sweep: downtime activation/expiry, then re-notification.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        let events = {
            let mut mgr = DowntimeManager::new(&mut self.registry, &mut self.log);
            mgr.on_time_tick(now);
            mgr.into_events()
        };
        self.announce(&events, now);
        self.notifier
            .on_time_tick(&mut self.registry, &mut self.log, now);
    }

    /// Apply an actively collected check result.
    pub fn process_check_result(
        &mut self,
        item: &ItemRef,
        state: State,
        output: &str,
        now: DateTime<Utc>,
    ) -> Result<TransitionEvent, CoreError> {
        self.tick(now);
        self.apply_check_result(item, state, output, now, false)
    }

    /// Parse and apply one external command line.
    pub fn process_command(&mut self, line: &str, now: DateTime<Utc>) -> Result<Outcome, CoreError> {
        let line = line.trim();
        let parsed = command::parse(line);
        self.apply_command(line, parsed, now)
    }

    /// Like [`Engine::process_command`], but the line's own bracketed
    /// timestamp drives `clock`, which never moves backwards. Unparseable
    /// lines are rejected at the current clock.
    pub fn process_stamped_command(
        &mut self,
        line: &str,
        clock: &mut DateTime<Utc>,
    ) -> Result<Outcome, CoreError> {
        let line = line.trim();
        let parsed = command::parse(line);
        if let Ok(p) = &parsed {
            *clock = (*clock).max(p.submitted_at);
        }
        self.apply_command(line, parsed, *clock)
    }

    fn apply_command(
        &mut self,
        line: &str,
        parsed: Result<ParsedCommand, CoreError>,
        now: DateTime<Utc>,
    ) -> Result<Outcome, CoreError> {
        self.tick(now);
        let parsed = match parsed {
            Ok(parsed) => parsed,
            Err(e) => return Err(self.reject(line, e, now)),
        };
        debug!(directive = parsed.command.name(), submitted_at = %parsed.submitted_at, "external command");

        match parsed.command {
            ExternalCommand::ScheduleDowntime(request) => {
                let downtime = match self
                    .registry
                    .resolve(&request.item)
                    .and_then(|_| Downtime::new(request, now))
                {
                    Ok(dt) => dt,
                    Err(e) => return Err(self.reject(line, e, now)),
                };
                self.log.record(now, &Entry::ExternalCommand { line });
                let id = downtime.id;
                self.insert_downtime(downtime, now)?;
                Ok(Outcome::DowntimeScheduled { id })
            }
            ExternalCommand::DeleteDowntime { kind, id } => {
                self.log.record(now, &Entry::ExternalCommand { line });
                let owner_kind = self.registry.owner_of(&id).map(ItemRef::kind);
                let found = match owner_kind {
                    Some(actual) if actual != kind => {
                        self.warning(now, format!("downtime {id} is not a {kind} downtime"));
                        false
                    }
                    _ => self.cancel_downtime(&id, now),
                };
                Ok(Outcome::DowntimeCancelled { id, found })
            }
            ExternalCommand::ProcessCheckResult {
                item,
                state,
                output,
            } => {
                if let Err(e) = self.registry.resolve(&item).map(|_| ()) {
                    return Err(self.reject(line, e, now));
                }
                self.log.record(now, &Entry::ExternalCommand { line });
                self.apply_check_result(&item, state, &output, now, true)
                    .map(Outcome::Transition)
            }
        }
    }

    /// Schedule a downtime directly (without the command grammar).
    pub fn schedule_downtime(
        &mut self,
        request: DowntimeRequest,
        now: DateTime<Utc>,
    ) -> Result<DowntimeId, CoreError> {
        self.tick(now);
        self.registry.resolve(&request.item)?;
        let downtime = Downtime::new(request, now)?;
        let id = downtime.id;
        self.insert_downtime(downtime, now)?;
        Ok(id)
    }

    /// Cancel a downtime and the downtimes it triggers. Unknown ids are a
    /// logged no-op; returns whether anything was cancelled.
    pub fn cancel_downtime(&mut self, id: &DowntimeId, now: DateTime<Utc>) -> bool {
        self.tick(now);
        let (found, events) = {
            let mut mgr = DowntimeManager::new(&mut self.registry, &mut self.log);
            let found = mgr.cancel(id, now);
            (found, mgr.into_events())
        };
        self.announce(&events, now);
        found
    }

    /// Re-insert a persisted downtime into its item.
    pub fn restore_downtime(&mut self, downtime: Downtime, now: DateTime<Utc>) -> Result<(), CoreError> {
        DowntimeManager::new(&mut self.registry, &mut self.log).restore(downtime, now)
    }

    // ── Read access ──────────────────────────────────────────────────

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn item(&self, item: &ItemRef) -> Option<&MonitoredItem> {
        self.registry.get(item)
    }

    pub fn downtime(&self, id: &DowntimeId) -> Option<&Downtime> {
        self.registry.downtime(id)
    }

    /// All downtimes, oldest entry first.
    pub fn downtimes(&self) -> Vec<&Downtime> {
        self.registry.downtimes()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Queued contact notifications plus outstanding PROBLEM masters.
    pub fn pending_actions(&self) -> Vec<&Notification> {
        self.notifier.pending_actions()
    }

    /// The open PROBLEM master for `item`, if any.
    pub fn outstanding_problem(&self, item: &ItemRef) -> Option<&Notification> {
        self.notifier.outstanding(item)
    }

    /// Drain contact notifications for delivery.
    pub fn take_dispatches(&mut self) -> Vec<Notification> {
        self.notifier.take_dispatches()
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> EngineSnapshot {
        EngineSnapshot {
            taken_at: now,
            items: self.registry.items().cloned().collect(),
            pending_actions: self.pending_actions().into_iter().cloned().collect(),
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    fn apply_check_result(
        &mut self,
        item_ref: &ItemRef,
        state: State,
        output: &str,
        now: DateTime<Utc>,
        passive: bool,
    ) -> Result<TransitionEvent, CoreError> {
        if state.kind() != item_ref.kind() {
            return Err(CoreError::malformed(format!(
                "state {state} does not apply to {} {item_ref}",
                item_ref.kind()
            )));
        }
        let item = self
            .registry
            .get_mut(item_ref)
            .ok_or_else(|| CoreError::UnknownTarget {
                target: item_ref.to_string(),
            })?;

        let event = state::record_result(item, state, output, now);
        self.log.record(
            now,
            &Entry::Check {
                item: item_ref,
                state,
                attempt: event.attempt,
                output,
                passive,
            },
        );
        if event.is_state_change() || event.new_state_type == StateType::Soft {
            self.log.record(
                now,
                &Entry::Alert {
                    item: item_ref,
                    state,
                    state_type: event.new_state_type,
                    attempt: event.attempt,
                    output,
                },
            );
        }

        let events = {
            let mut mgr = DowntimeManager::new(&mut self.registry, &mut self.log);
            mgr.on_state_transition(&event, now);
            mgr.into_events()
        };
        self.announce(&events, now);
        self.notifier
            .on_state_transition(&mut self.registry, &mut self.log, &event, now);
        Ok(event)
    }

    fn insert_downtime(&mut self, downtime: Downtime, now: DateTime<Utc>) -> Result<(), CoreError> {
        let events = {
            let mut mgr = DowntimeManager::new(&mut self.registry, &mut self.log);
            mgr.insert(downtime, now)?;
            mgr.into_events()
        };
        self.announce(&events, now);
        Ok(())
    }

    fn announce(&mut self, events: &[DowntimeEvent], now: DateTime<Utc>) {
        for event in events {
            self.notifier
                .on_downtime_event(&mut self.registry, &mut self.log, event, now);
        }
    }

    fn reject(&mut self, line: &str, err: CoreError, now: DateTime<Utc>) -> CoreError {
        warn!(error = %err, "external command rejected");
        self.log.record(
            now,
            &Entry::CommandRejected {
                line,
                reason: &err.to_string(),
            },
        );
        err
    }

    fn warning(&mut self, now: DateTime<Utc>, message: String) {
        warn!("{message}");
        self.log.record(now, &Entry::Warning { message });
    }
}
