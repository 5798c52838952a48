// ── Comment ledger ──
//
// Storage only: comments live on the item they annotate and are created
// and removed by the downtime manager.

use chrono::{DateTime, Utc};

use crate::model::{Comment, CommentId, MonitoredItem};

pub fn add(
    item: &mut MonitoredItem,
    author: &str,
    text: String,
    now: DateTime<Utc>,
) -> CommentId {
    let id = CommentId::new();
    item.comments.insert(
        id,
        Comment {
            id,
            item: item.item.clone(),
            author: author.to_owned(),
            text,
            entry_time: now,
        },
    );
    id
}

pub fn remove(item: &mut MonitoredItem, id: &CommentId) -> Option<Comment> {
    item.comments.shift_remove(id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{ItemRef, ItemSettings};

    #[test]
    fn add_then_remove() {
        let mut item = MonitoredItem::new(ItemRef::host("h"), &ItemSettings::default());
        let now = DateTime::from_timestamp(0, 0).unwrap();
        let id = add(&mut item, "admin", "maintenance".into(), now);
        assert_eq!(item.comments.len(), 1);
        assert_eq!(item.comments[&id].author, "admin");

        let removed = remove(&mut item, &id).unwrap();
        assert_eq!(removed.text, "maintenance");
        assert!(item.comments.is_empty());
        assert!(remove(&mut item, &id).is_none());
    }
}
