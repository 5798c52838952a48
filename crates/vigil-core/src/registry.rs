// ── Item registry ──
//
// Arena of monitored items keyed by `ItemRef`, plus the downtime id ->
// owner lookup table that trigger chains and cancellation resolve
// through. Items own their downtimes; the table only points at them.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::CoreError;
use crate::model::{Downtime, DowntimeId, ItemRef, ItemSettings, MonitoredItem};

#[derive(Debug, Default)]
pub struct Registry {
    items: IndexMap<ItemRef, MonitoredItem>,
    downtime_owner: HashMap<DowntimeId, ItemRef>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item. Returns `false` (and changes nothing) if it exists.
    pub fn insert(&mut self, item: ItemRef, settings: &ItemSettings) -> bool {
        if self.items.contains_key(&item) {
            return false;
        }
        self.items
            .insert(item.clone(), MonitoredItem::new(item, settings));
        true
    }

    pub fn get(&self, item: &ItemRef) -> Option<&MonitoredItem> {
        self.items.get(item)
    }

    pub fn get_mut(&mut self, item: &ItemRef) -> Option<&mut MonitoredItem> {
        self.items.get_mut(item)
    }

    /// Look an item up, failing the way the command processor reports it.
    pub fn resolve(&self, item: &ItemRef) -> Result<&MonitoredItem, CoreError> {
        self.items.get(item).ok_or_else(|| CoreError::UnknownTarget {
            target: item.to_string(),
        })
    }

    pub fn items(&self) -> impl Iterator<Item = &MonitoredItem> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    // ── Downtime lookup table ────────────────────────────────────────

    pub fn owner_of(&self, id: &DowntimeId) -> Option<&ItemRef> {
        self.downtime_owner.get(id)
    }

    pub fn downtime(&self, id: &DowntimeId) -> Option<&Downtime> {
        let owner = self.downtime_owner.get(id)?;
        self.items.get(owner)?.downtimes.get(id)
    }

    pub(crate) fn downtime_mut(&mut self, id: &DowntimeId) -> Option<&mut Downtime> {
        let owner = self.downtime_owner.get(id)?;
        self.items.get_mut(owner)?.downtimes.get_mut(id)
    }

    /// All downtimes, oldest `entry_time` first; ties keep insertion order.
    pub fn downtimes(&self) -> Vec<&Downtime> {
        let mut all: Vec<&Downtime> = self
            .items
            .values()
            .flat_map(|item| item.downtimes.values())
            .collect();
        all.sort_by_key(|dt| dt.entry_time);
        all
    }

    /// Hand a downtime to its target item.
    pub(crate) fn attach_downtime(&mut self, downtime: Downtime) -> Result<(), CoreError> {
        let item = self
            .items
            .get_mut(&downtime.item)
            .ok_or_else(|| CoreError::UnknownTarget {
                target: downtime.item.to_string(),
            })?;
        self.downtime_owner.insert(downtime.id, downtime.item.clone());
        item.downtimes.insert(downtime.id, downtime);
        Ok(())
    }

    /// Remove a downtime from its owner's collection and the lookup table.
    pub(crate) fn detach_downtime(&mut self, id: &DowntimeId) -> Option<Downtime> {
        let owner = self.downtime_owner.remove(id)?;
        self.items.get_mut(&owner)?.downtimes.shift_remove(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::DowntimeRequest;
    use chrono::DateTime;

    fn downtime_for(item: ItemRef) -> Downtime {
        let t = DateTime::from_timestamp(1_000, 0).unwrap();
        Downtime::new(
            DowntimeRequest {
                item,
                start_time: t,
                end_time: t + chrono::TimeDelta::seconds(60),
                fixed: true,
                trigger_id: None,
                duration_secs: 0,
                author: "a".into(),
                comment: "c".into(),
            },
            t,
        )
        .unwrap()
    }

    #[test]
    fn insert_is_idempotent() {
        let mut reg = Registry::new();
        assert!(reg.insert(ItemRef::host("h"), &ItemSettings::default()));
        assert!(!reg.insert(ItemRef::host("h"), &ItemSettings::default()));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn resolve_unknown_is_unknown_target() {
        let reg = Registry::new();
        let err = reg.resolve(&ItemRef::service("h", "s")).unwrap_err();
        assert!(matches!(err, CoreError::UnknownTarget { target } if target == "h;s"));
    }

    #[test]
    fn attach_and_detach_keep_lookup_in_sync() {
        let mut reg = Registry::new();
        let svc = ItemRef::service("h", "s");
        reg.insert(svc.clone(), &ItemSettings::default());

        let dt = downtime_for(svc.clone());
        let id = dt.id;
        reg.attach_downtime(dt).unwrap();
        assert_eq!(reg.owner_of(&id), Some(&svc));
        assert!(reg.downtime(&id).is_some());

        let removed = reg.detach_downtime(&id).unwrap();
        assert_eq!(removed.id, id);
        assert!(reg.owner_of(&id).is_none());
        assert!(reg.get(&svc).unwrap().downtimes.is_empty());
    }

    #[test]
    fn attach_to_unknown_item_fails() {
        let mut reg = Registry::new();
        let err = reg
            .attach_downtime(downtime_for(ItemRef::host("ghost")))
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownTarget { .. }));
    }
}
