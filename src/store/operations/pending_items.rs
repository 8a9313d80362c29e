use crate::monitor::types::PendingItem;
use crate::store::keys;
use crate::store::{Store, StoreError};

impl Store {
    /// Insert the entry unless the item is already tracked.
    ///
    /// Returns `true` when this call created the entry. An existing entry is
    /// never overwritten, so the earliest queue-entry time wins.
    pub fn track_pending_item(&self, item: &PendingItem) -> Result<bool, StoreError> {
        let key = keys::pending_item_key(&item.item_id);
        let bytes = Self::serialize(item)?;
        let swapped = self
            .pending_items
            .compare_and_swap(key.as_bytes(), None as Option<&[u8]>, Some(bytes))?;
        Ok(swapped.is_ok())
    }

    pub fn get_pending_item(&self, item_id: &str) -> Result<Option<PendingItem>, StoreError> {
        let key = keys::pending_item_key(item_id);
        match self.pending_items.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// Atomically remove and return the entry. Of two concurrent callers only
    /// one receives it.
    pub fn take_pending_item(&self, item_id: &str) -> Result<Option<PendingItem>, StoreError> {
        let key = keys::pending_item_key(item_id);
        match self.pending_items.remove(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn list_pending_items(&self) -> Result<Vec<PendingItem>, StoreError> {
        let mut items = Vec::new();
        for item in self.pending_items.iter() {
            let (key, value) = item?;
            match Self::deserialize::<PendingItem>(&value) {
                Ok(pending) => items.push(pending),
                Err(e) => {
                    tracing::warn!(
                        key = %String::from_utf8_lossy(&key),
                        error = %e,
                        "Skipping unreadable pending item"
                    );
                }
            }
        }
        Ok(items)
    }

    pub fn count_pending_items(&self) -> usize {
        self.pending_items.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::tempdir;

    use super::*;
    use crate::monitor::types::{QueueReason, Target};

    #[test]
    fn first_tracking_wins() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("pending-db").to_str().unwrap()).unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        let target = Target::comment("c1", "p1");

        let first = PendingItem::new(&target, t0, QueueReason::AutomatedFilter);
        let later = PendingItem::new(&target, t0 + Duration::hours(1), QueueReason::UserReport);
        assert!(store.track_pending_item(&first).unwrap());
        assert!(!store.track_pending_item(&later).unwrap());

        let stored = store.get_pending_item("c1").unwrap().unwrap();
        assert_eq!(stored, first);
        assert_eq!(store.count_pending_items(), 1);
    }

    #[test]
    fn take_removes_exactly_once() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("pending-take").to_str().unwrap()).unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        store
            .track_pending_item(&PendingItem::new(
                &Target::post("p9"),
                t0,
                QueueReason::UpstreamFilter,
            ))
            .unwrap();

        assert!(store.take_pending_item("p9").unwrap().is_some());
        assert!(store.take_pending_item("p9").unwrap().is_none());
        assert!(store.list_pending_items().unwrap().is_empty());
    }
}
