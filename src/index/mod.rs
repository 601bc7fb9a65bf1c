//! Content index: the denormalized store of searchable records plus the
//! maintainer that keeps it synchronized with the canonical content store.

mod maintainer;

pub use maintainer::{EngagementDelta, IndexMaintainer};

use crate::models::{ContentIndexRecord, RecordStatus};
use chrono::Utc;
use dashmap::DashMap;

/// Concurrent store of Content Index Records, keyed by content id.
///
/// Entry-level locking serializes concurrent writes for the same key;
/// readers work on cloned snapshots and tolerate slightly stale counters.
#[derive(Default)]
pub struct IndexStore {
    records: DashMap<i64, ContentIndexRecord>,
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the record for its content id. The whole record swaps in one
    /// map operation, so a reader never observes a partially-written record.
    pub fn upsert(&self, record: ContentIndexRecord) {
        self.records.insert(record.content_id, record);
    }

    pub fn get(&self, content_id: i64) -> Option<ContentIndexRecord> {
        self.records.get(&content_id).map(|r| r.clone())
    }

    pub fn get_active(&self, content_id: i64) -> Option<ContentIndexRecord> {
        self.records
            .get(&content_id)
            .filter(|r| r.status == RecordStatus::Active)
            .map(|r| r.clone())
    }

    /// Flag a record as removed. Idempotent; returns false when no record
    /// exists for the id.
    pub fn mark_removed(&self, content_id: i64) -> bool {
        match self.records.get_mut(&content_id) {
            Some(mut record) => {
                record.status = RecordStatus::Removed;
                record.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Apply counter deltas atomically under the entry guard and recompute
    /// the quality score. Counters saturate at zero.
    pub fn adjust_counters(&self, content_id: i64, delta: EngagementDelta) -> bool {
        match self.records.get_mut(&content_id) {
            Some(mut record) => {
                let views = shift(record.view_count, delta.views);
                let likes = shift(record.like_count, delta.likes);
                let favorites = shift(record.favorite_count, delta.favorites);
                let comments = shift(record.comment_count, delta.comments);
                record.update_engagement(views, likes, favorites, comments);
                record.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Snapshot of all active records.
    pub fn active_records(&self) -> Vec<ContentIndexRecord> {
        self.records
            .iter()
            .filter(|r| r.status == RecordStatus::Active)
            .map(|r| r.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn shift(count: u64, delta: i64) -> u64 {
    if delta >= 0 {
        count.saturating_add(delta as u64)
    } else {
        count.saturating_sub(delta.unsigned_abs())
    }
}
