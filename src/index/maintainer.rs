use super::IndexStore;
use crate::models::{build_search_text, summarize, ContentIndexRecord, RecordStatus};
use crate::stores::{CategoryDirectory, ContentStore, InteractionLog, UserDirectory};
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Signed engagement counter deltas applied by interaction events.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngagementDelta {
    pub views: i64,
    pub likes: i64,
    pub favorites: i64,
    pub comments: i64,
}

/// Keeps the content index synchronized with the canonical content store.
///
/// All derived fields are rebuilt from source data on every upsert. Name
/// lookups are best-effort: on directory failure the previously indexed
/// name is kept rather than failing the whole upsert.
pub struct IndexMaintainer {
    store: Arc<IndexStore>,
    content: Arc<dyn ContentStore>,
    categories: Arc<dyn CategoryDirectory>,
    users: Arc<dyn UserDirectory>,
    interactions: Arc<dyn InteractionLog>,
}

impl IndexMaintainer {
    pub fn new(
        store: Arc<IndexStore>,
        content: Arc<dyn ContentStore>,
        categories: Arc<dyn CategoryDirectory>,
        users: Arc<dyn UserDirectory>,
        interactions: Arc<dyn InteractionLog>,
    ) -> Self {
        Self {
            store,
            content,
            categories,
            users,
            interactions,
        }
    }

    /// Re-index one content item from its canonical record.
    ///
    /// Unpublished or absent content flips any existing record to removed;
    /// a fresh fetch while published rebuilds the whole record in place.
    pub async fn upsert_index(&self, content_id: i64) -> Result<()> {
        let item = match self.content.fetch(content_id).await? {
            Some(item) if item.published => item,
            _ => {
                if self.store.mark_removed(content_id) {
                    info!(content_id, "content unpublished, index record removed");
                } else {
                    debug!(content_id, "upsert for unknown content, nothing indexed");
                }
                return Ok(());
            }
        };

        let existing = self.store.get(content_id);

        let category_name = match item.category_id {
            Some(category_id) => match self.categories.name_of(category_id).await {
                Ok(name) => name,
                Err(err) => {
                    warn!(content_id, category_id, error = %err, "category lookup failed, keeping stale name");
                    existing.as_ref().and_then(|r| r.category_name.clone())
                }
            },
            None => None,
        };

        let author_name = match self.users.name_of(item.author_id).await {
            Ok(name) => name,
            Err(err) => {
                warn!(content_id, author_id = item.author_id, error = %err, "author lookup failed, keeping stale name");
                existing.as_ref().and_then(|r| r.author_name.clone())
            }
        };

        let counts = self.interactions.engagement_counts(content_id).await?;

        let mut record = ContentIndexRecord {
            content_id,
            title: item.title.clone(),
            summary: summarize(&item.body),
            search_text: build_search_text(
                &item.title,
                &item.body,
                &item.tags,
                category_name.as_deref(),
                author_name.as_deref(),
            ),
            category_id: item.category_id,
            category_name,
            tags: item.tags,
            author_id: item.author_id,
            author_name,
            content_type: item.content_type,
            view_count: 0,
            like_count: 0,
            favorite_count: 0,
            comment_count: 0,
            quality_score: 0.0,
            status: RecordStatus::Active,
            created_at: existing.map(|r| r.created_at).unwrap_or(item.created_at),
            updated_at: Utc::now(),
        };
        record.update_engagement(counts.views, counts.likes, counts.favorites, item.comment_count);

        self.store.upsert(record);
        debug!(content_id, "index record upserted");
        Ok(())
    }

    /// Flag the record for a deleted or unpublished content item as removed.
    pub fn remove_index(&self, content_id: i64) -> bool {
        let removed = self.store.mark_removed(content_id);
        if removed {
            info!(content_id, "index record marked removed");
        } else {
            debug!(content_id, "remove for unindexed content, nothing to do");
        }
        removed
    }

    /// Drop the whole index and re-index every published content item.
    /// Returns the number of records indexed.
    pub async fn rebuild_index(&self) -> Result<usize> {
        let items = self.content.list_published().await?;
        self.store.clear();

        let mut indexed = 0usize;
        for item in &items {
            match self.upsert_index(item.id).await {
                Ok(()) => indexed += 1,
                Err(err) => {
                    warn!(content_id = item.id, error = %err, "rebuild skipped one item");
                }
            }
        }

        info!(indexed, "index rebuild finished");
        Ok(indexed)
    }

    /// Re-index a batch of content ids, skipping (and logging) failures.
    pub async fn batch_upsert(&self, content_ids: &[i64]) -> usize {
        let mut indexed = 0usize;
        for &content_id in content_ids {
            match self.upsert_index(content_id).await {
                Ok(()) => indexed += 1,
                Err(err) => warn!(content_id, error = %err, "batch upsert skipped one item"),
            }
        }
        indexed
    }

    /// Apply counter deltas from a single interaction event without a full
    /// re-index. Quality is recomputed under the store's entry guard.
    pub fn adjust_engagement(&self, content_id: i64, delta: EngagementDelta) -> bool {
        let applied = self.store.adjust_counters(content_id, delta);
        if !applied {
            debug!(content_id, "engagement delta for unindexed content dropped");
        }
        applied
    }
}
