// ── Domain model ──
//
// Items own their downtimes and comments; everything else refers to
// them by id.

pub mod comment;
pub mod contact;
pub mod downtime;
pub mod ids;
pub mod item;
pub mod notification;

pub use comment::Comment;
pub use contact::{CommandTemplate, Contact, DailyRange, Escalation, TimePeriod};
pub use downtime::{Downtime, DowntimeRequest};
pub use ids::{CommentId, DowntimeId, ItemKind, ItemRef, NotificationId};
pub use item::{HostState, ItemSettings, MonitoredItem, ServiceState, State, StateType};
pub use notification::{Notification, NotificationKind, NotificationType, SuppressionReason};
