//! Collaborator interfaces consumed by the discovery engine.
//!
//! The canonical content store, the id-to-name directories and the
//! interaction log are owned by other services; everything here is consumed
//! through these traits. In-memory implementations back the default wiring
//! and the test suites.

mod memory;

pub use memory::{
    MemoryCategoryDirectory, MemoryContentStore, MemoryInteractionLog, MemoryUserDirectory,
};

use crate::models::{ContentItem, Interaction, InteractionKind};
use anyhow::Result;
use async_trait::async_trait;

/// Per-content engagement counters aggregated from the interaction log.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngagementCounts {
    pub views: u64,
    pub likes: u64,
    pub favorites: u64,
}

/// Canonical content records, read-only here. The index maintainer polls
/// this store on upsert/rebuild.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn fetch(&self, content_id: i64) -> Result<Option<ContentItem>>;
    async fn list_published(&self) -> Result<Vec<ContentItem>>;
}

/// Category id -> name lookup. Best-effort: callers degrade to a stale or
/// missing name when this collaborator is unavailable.
#[async_trait]
pub trait CategoryDirectory: Send + Sync {
    async fn name_of(&self, category_id: i64) -> Result<Option<String>>;
}

/// User id -> display name lookup, same degradation contract as categories.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn name_of(&self, user_id: i64) -> Result<Option<String>>;
}

/// Append-only interaction history, read-only here.
///
/// Implementations return interactions newest-first.
#[async_trait]
pub trait InteractionLog: Send + Sync {
    async fn interactions_of(&self, user_id: i64, limit: usize) -> Result<Vec<Interaction>>;

    async fn interactions_by_kind(
        &self,
        user_id: i64,
        kind: InteractionKind,
        limit: usize,
    ) -> Result<Vec<Interaction>>;

    /// Distinct users with any interaction on the given content.
    async fn users_who_interacted(&self, content_id: i64) -> Result<Vec<i64>>;

    async fn engagement_counts(&self, content_id: i64) -> Result<EngagementCounts>;
}
