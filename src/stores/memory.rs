use super::{CategoryDirectory, ContentStore, EngagementCounts, InteractionLog, UserDirectory};
use crate::models::{ContentItem, Interaction, InteractionKind};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::RwLock;

/// Duplicate views from the same IP within this window are dropped by the
/// recorder; the store itself has no uniqueness constraint on views.
const DEFAULT_VIEW_COOLDOWN_SECS: i64 = 300;

#[derive(Default)]
pub struct MemoryContentStore {
    items: DashMap<i64, ContentItem>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, item: ContentItem) {
        self.items.insert(item.id, item);
    }

    pub fn remove(&self, content_id: i64) -> Option<ContentItem> {
        self.items.remove(&content_id).map(|(_, item)| item)
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn fetch(&self, content_id: i64) -> Result<Option<ContentItem>> {
        Ok(self.items.get(&content_id).map(|item| item.clone()))
    }

    async fn list_published(&self) -> Result<Vec<ContentItem>> {
        Ok(self
            .items
            .iter()
            .filter(|item| item.published)
            .map(|item| item.clone())
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryCategoryDirectory {
    names: DashMap<i64, String>,
}

impl MemoryCategoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, category_id: i64, name: impl Into<String>) {
        self.names.insert(category_id, name.into());
    }
}

#[async_trait]
impl CategoryDirectory for MemoryCategoryDirectory {
    async fn name_of(&self, category_id: i64) -> Result<Option<String>> {
        Ok(self.names.get(&category_id).map(|name| name.clone()))
    }
}

#[derive(Default)]
pub struct MemoryUserDirectory {
    names: DashMap<i64, String>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: i64, name: impl Into<String>) {
        self.names.insert(user_id, name.into());
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn name_of(&self, user_id: i64) -> Result<Option<String>> {
        Ok(self.names.get(&user_id).map(|name| name.clone()))
    }
}

/// In-memory interaction recorder and log.
///
/// Likes and favorites are unique per (user, content, kind); replays are
/// no-ops. Views are append-only with per-IP cooldown suppression.
pub struct MemoryInteractionLog {
    records: RwLock<Vec<Interaction>>,
    view_cooldown: Duration,
}

impl Default for MemoryInteractionLog {
    fn default() -> Self {
        Self::with_cooldown_secs(DEFAULT_VIEW_COOLDOWN_SECS)
    }
}

impl MemoryInteractionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cooldown_secs(secs: i64) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            view_cooldown: Duration::seconds(secs),
        }
    }

    /// Record a like or favorite. Returns false when the interaction
    /// already exists.
    pub fn record(&self, user_id: i64, content_id: i64, kind: InteractionKind) -> bool {
        let mut records = self.records.write().expect("interaction log poisoned");
        let exists = records
            .iter()
            .any(|r| r.user_id == user_id && r.content_id == content_id && r.kind == kind);
        if exists {
            return false;
        }
        records.push(Interaction {
            user_id,
            content_id,
            kind,
            created_at: Utc::now(),
            ip: None,
        });
        true
    }

    /// Record a view, suppressing repeats from the same IP inside the
    /// cooldown window. Returns false when suppressed.
    pub fn record_view(&self, user_id: i64, content_id: i64, ip: &str) -> bool {
        let now = Utc::now();
        let mut records = self.records.write().expect("interaction log poisoned");
        let recent_duplicate = records.iter().any(|r| {
            r.kind == InteractionKind::View
                && r.content_id == content_id
                && r.ip.as_deref() == Some(ip)
                && now - r.created_at < self.view_cooldown
        });
        if recent_duplicate {
            return false;
        }
        records.push(Interaction {
            user_id,
            content_id,
            kind: InteractionKind::View,
            created_at: now,
            ip: Some(ip.to_string()),
        });
        true
    }
}

#[async_trait]
impl InteractionLog for MemoryInteractionLog {
    async fn interactions_of(&self, user_id: i64, limit: usize) -> Result<Vec<Interaction>> {
        let records = self.records.read().expect("interaction log poisoned");
        let mut mine: Vec<Interaction> = records
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        mine.truncate(limit);
        Ok(mine)
    }

    async fn interactions_by_kind(
        &self,
        user_id: i64,
        kind: InteractionKind,
        limit: usize,
    ) -> Result<Vec<Interaction>> {
        let records = self.records.read().expect("interaction log poisoned");
        let mut mine: Vec<Interaction> = records
            .iter()
            .filter(|r| r.user_id == user_id && r.kind == kind)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        mine.truncate(limit);
        Ok(mine)
    }

    async fn users_who_interacted(&self, content_id: i64) -> Result<Vec<i64>> {
        let records = self.records.read().expect("interaction log poisoned");
        let users: HashSet<i64> = records
            .iter()
            .filter(|r| r.content_id == content_id)
            .map(|r| r.user_id)
            .collect();
        Ok(users.into_iter().collect())
    }

    async fn engagement_counts(&self, content_id: i64) -> Result<EngagementCounts> {
        let records = self.records.read().expect("interaction log poisoned");
        let mut counts = EngagementCounts::default();
        for record in records.iter().filter(|r| r.content_id == content_id) {
            match record.kind {
                InteractionKind::View => counts.views += 1,
                InteractionKind::Like => counts.likes += 1,
                InteractionKind::Favorite => counts.favorites += 1,
            }
        }
        Ok(counts)
    }
}
