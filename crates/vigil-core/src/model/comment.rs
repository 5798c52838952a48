use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CommentId, ItemRef};

/// Audit entry attached to an item while one of its downtimes is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub item: ItemRef,
    pub author: String,
    pub text: String,
    pub entry_time: DateTime<Utc>,
}
