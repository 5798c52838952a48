//! Alerting core for host and service monitoring.
//!
//! This crate decides, for every monitored item, whether its current
//! health constitutes a confirmed problem, whether that problem is covered
//! by scheduled downtime, and which notifications must go out:
//!
//! - **[`state`]**: SOFT/HARD confirmation of raw check results into
//!   [`TransitionEvent`]s.
//!
//! - **[`DowntimeManager`]**: Fixed and flexible downtimes, trigger chains,
//!   expiry and cancellation. Downtimes are owned by their item and looked
//!   up by id through the [`Registry`].
//!
//! - **[`NotificationEngine`]**: Master and contact notifications,
//!   suppression, escalation through a [`ContactDirectory`], re-notification
//!   and DOWNTIMESTART / DOWNTIMEEND announcements.
//!
//! - **[`command`]**: Parser for `[<ts>] DIRECTIVE;...` external command
//!   lines.
//!
//! - **[`EventLog`]**: Append-only audit stream with fixed message formats.
//!
//! - **[`Engine`]**: Serializes every event against one registry.
//!   **[`Monitor`]** runs an engine in an actor task with a periodic tick
//!   and hands contact notifications to a [`Transport`].

pub mod command;
pub mod comments;
pub mod downtime;
pub mod engine;
pub mod error;
pub mod log;
pub mod model;
pub mod monitor;
pub mod notify;
pub mod registry;
pub mod state;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{ExternalCommand, ParsedCommand};
pub use downtime::{DowntimeEvent, DowntimeEventKind, DowntimeManager};
pub use engine::{Engine, EngineEvent, EngineSnapshot, Outcome};
pub use error::CoreError;
pub use log::{EventLog, LogLevel, LogRecord};
pub use monitor::{
    ChannelTransport, Clock, ManualClock, Monitor, MonitorConfig, SystemClock, TracingTransport,
    Transport,
};
pub use notify::{ContactDirectory, NotificationEngine, ResolvedContact, StaticDirectory};
pub use registry::Registry;
pub use state::TransitionEvent;

pub use model::{
    CommandTemplate, Comment, CommentId, Contact, DailyRange, Downtime, DowntimeId,
    DowntimeRequest, Escalation, HostState, ItemKind, ItemRef, ItemSettings, MonitoredItem,
    Notification, NotificationId, NotificationKind, NotificationType, ServiceState, State,
    StateType, SuppressionReason, TimePeriod,
};
