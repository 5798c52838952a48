// ── Item state machine ──
//
// SOFT/HARD confirmation of raw check results. Pure state computation:
// never fails, never touches downtimes or notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{ItemRef, MonitoredItem, State, StateType};

/// Outcome of applying one check result to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub item: ItemRef,
    pub old_state: State,
    pub new_state: State,
    pub old_state_type: StateType,
    pub new_state_type: StateType,
    pub attempt: u32,
    pub output: String,
    pub timestamp: DateTime<Utc>,
}

impl TransitionEvent {
    /// Either the state or its confirmation status moved.
    pub fn is_state_change(&self) -> bool {
        self.old_state != self.new_state || self.old_state_type != self.new_state_type
    }

    /// Landed in a confirmed non-OK state.
    pub fn is_hard_problem(&self) -> bool {
        self.new_state_type == StateType::Hard && !self.new_state.is_ok()
    }

    /// First confirmation of a problem, or a confirmed problem changing state.
    pub fn raises_problem(&self) -> bool {
        self.is_hard_problem()
            && (self.old_state_type == StateType::Soft || self.old_state != self.new_state)
    }

    /// Confirmed problem returning to OK/UP.
    pub fn raises_recovery(&self) -> bool {
        self.new_state.is_ok() && !self.old_state.is_ok() && self.old_state_type == StateType::Hard
    }
}

/// Apply a raw check result to `item`.
///
/// - OK/UP always lands HARD with `attempt = 1`.
/// - A state change while HARD restarts counting at 1; leaving OK/UP goes
///   SOFT unless `max_attempts` is 1, moving between problem states stays HARD.
/// - A repeated problem while SOFT increments `attempt` (capped at
///   `max_attempts`) and becomes HARD once the ceiling is reached.
pub fn record_result(
    item: &mut MonitoredItem,
    raw_state: State,
    output: &str,
    now: DateTime<Utc>,
) -> TransitionEvent {
    let old_state = item.state;
    let old_state_type = item.state_type;

    let (state_type, attempt) = if raw_state.is_ok() {
        (StateType::Hard, 1)
    } else {
        match old_state_type {
            StateType::Hard if old_state == raw_state => (StateType::Hard, item.attempt),
            StateType::Hard if old_state.is_ok() && item.max_attempts > 1 => (StateType::Soft, 1),
            StateType::Hard => (StateType::Hard, 1),
            StateType::Soft => {
                let attempt = (item.attempt + 1).min(item.max_attempts);
                let state_type = if attempt >= item.max_attempts {
                    StateType::Hard
                } else {
                    StateType::Soft
                };
                (state_type, attempt)
            }
        }
    };

    item.state = raw_state;
    item.state_type = state_type;
    item.attempt = attempt;
    output.clone_into(&mut item.output);
    item.last_check = Some(now);

    TransitionEvent {
        item: item.item.clone(),
        old_state,
        new_state: raw_state,
        old_state_type,
        new_state_type: state_type,
        attempt,
        output: output.to_owned(),
        timestamp: now,
    }
}
