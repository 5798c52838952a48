// ── Core error types ──
//
// Errors surfaced to callers of the engine. Time ticks and state
// transitions never fail; only scheduling, command parsing and explicit
// lookups do.

use thiserror::Error;

use crate::model::DowntimeId;

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Scheduling ───────────────────────────────────────────────────
    #[error("Invalid downtime window: {reason}")]
    InvalidWindow { reason: String },

    // ── External commands ────────────────────────────────────────────
    #[error("Malformed command: {reason}")]
    MalformedCommand { reason: String },

    #[error("Unknown target: {target}")]
    UnknownTarget { target: String },

    // ── Lookups ──────────────────────────────────────────────────────
    #[error("Downtime not found: {id}")]
    UnknownDowntime { id: DowntimeId },

    // ── Persistence ──────────────────────────────────────────────────
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Runtime ──────────────────────────────────────────────────────
    #[error("Engine stopped")]
    EngineStopped,
}

impl CoreError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedCommand {
            reason: reason.into(),
        }
    }
}
