//! Recommendation engine: six strategies over the content index and the
//! interaction log, each returning ranked search hits.

pub mod similarity;

use crate::index::IndexStore;
use crate::models::{InteractionKind, SearchHit};
use crate::stores::InteractionLog;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use similarity::{content_similarity, user_similarity};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 50;

/// How many of the most similar users the collaborative strategy keeps.
const SIMILAR_USER_LIMIT: usize = 20;
/// Likes pulled per similar user when scoring candidates.
const LIKES_PER_USER: usize = 50;
/// Interaction history window used to build a behavior profile.
const PROFILE_LIKES: usize = 50;
const PROFILE_FAVORITES: usize = 30;
/// Recent interactions excluded from results as already-seen.
const SEEN_WINDOW: usize = 200;
const TOP_CATEGORIES: usize = 3;
const TOP_TAGS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    ContentBased,
    Collaborative,
    Behavior,
    Popularity,
    Freshness,
    Hybrid,
}

impl Strategy {
    /// Human-readable explanation of how the strategy picks content.
    pub fn explain(&self) -> &'static str {
        match self {
            Strategy::ContentBased => {
                "Content similar to the given item, weighted by shared category, tags, type and author."
            }
            Strategy::Collaborative => {
                "Content liked by users whose interaction history overlaps yours the most."
            }
            Strategy::Behavior => {
                "Unseen content from the categories and tags you interact with most."
            }
            Strategy::Popularity => "The highest quality-scored published content.",
            Strategy::Freshness => "The most recently published content.",
            Strategy::Hybrid => {
                "A blend: behavior matches, content similar to your last like, popular and fresh items."
            }
        }
    }
}

/// Produces recommendations from the index and the interaction log.
///
/// Personalized strategies degrade to the popularity ranking when the
/// subject has no usable history; sparse data is normal, not an error.
pub struct RecommendationEngine {
    store: Arc<IndexStore>,
    interactions: Arc<dyn InteractionLog>,
}

impl RecommendationEngine {
    pub fn new(store: Arc<IndexStore>, interactions: Arc<dyn InteractionLog>) -> Self {
        Self { store, interactions }
    }

    /// Dispatch one recommendation request. Never fails: a strategy that
    /// errors or comes back empty is replaced by the popularity ranking.
    ///
    /// `subject_id` is a content id for the content-based strategy, a user
    /// id for the personalized ones, and an optional category filter
    /// (when positive) for popularity and freshness.
    pub async fn recommend(
        &self,
        strategy: Strategy,
        subject_id: i64,
        limit: usize,
    ) -> Vec<SearchHit> {
        let limit = clamp_limit(limit);
        match strategy {
            Strategy::ContentBased => self.content_based(subject_id, limit),
            Strategy::Collaborative => {
                let outcome = self.collaborative(subject_id, limit).await;
                self.with_fallback(strategy, outcome, limit)
            }
            Strategy::Behavior => {
                let outcome = self.behavior_based(subject_id, limit).await;
                self.with_fallback(strategy, outcome, limit)
            }
            Strategy::Popularity => self.popularity(category_filter(subject_id), limit),
            Strategy::Freshness => self.freshness(category_filter(subject_id), limit),
            Strategy::Hybrid => {
                let outcome = self.hybrid(subject_id, limit).await;
                self.with_fallback(strategy, outcome, limit)
            }
        }
    }

    /// Content most similar to one source item. An untracked source yields
    /// nothing: there is no profile to extrapolate from.
    pub fn content_based(&self, content_id: i64, limit: usize) -> Vec<SearchHit> {
        let limit = clamp_limit(limit);
        let source = match self.store.get_active(content_id) {
            Some(source) => source,
            None => {
                debug!(content_id, "content-based request for unindexed content");
                return Vec::new();
            }
        };

        let mut scored: Vec<(f64, SearchHit)> = self
            .store
            .active_records()
            .into_iter()
            .filter(|candidate| candidate.content_id != content_id)
            .filter_map(|candidate| {
                let score = content_similarity(&source, &candidate);
                if score > 0.0 {
                    let mut hit = SearchHit::from_record(&candidate);
                    hit.relevance_score = Some(score);
                    Some((score, hit))
                } else {
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().take(limit).map(|(_, hit)| hit).collect()
    }

    /// Content liked by the users most similar to the subject, scored by
    /// accumulated user similarity.
    pub async fn collaborative(&self, user_id: i64, limit: usize) -> Result<Vec<SearchHit>> {
        let limit = clamp_limit(limit);
        let mine = self.interactions.interactions_of(user_id, SEEN_WINDOW).await?;
        if mine.is_empty() {
            info!(user_id, "no interaction history, collaborative yields nothing");
            return Ok(Vec::new());
        }
        let my_contents: HashSet<i64> = mine.iter().map(|i| i.content_id).collect();

        // Candidate neighbors: anyone who touched any of my contents.
        let mut neighbors: HashSet<i64> = HashSet::new();
        for &content_id in &my_contents {
            for other in self.interactions.users_who_interacted(content_id).await? {
                if other != user_id {
                    neighbors.insert(other);
                }
            }
        }

        let mut similar: Vec<(i64, f64)> = Vec::new();
        for other in neighbors {
            let theirs = self.interactions.interactions_of(other, SEEN_WINDOW).await?;
            let their_contents: HashSet<i64> = theirs.iter().map(|i| i.content_id).collect();
            let score = user_similarity(&my_contents, &their_contents);
            if score > 0.0 {
                similar.push((other, score));
            }
        }
        similar.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        similar.truncate(SIMILAR_USER_LIMIT);

        // Sum neighbor similarity over their liked contents I have not seen.
        let mut candidate_scores: HashMap<i64, f64> = HashMap::new();
        for (other, score) in &similar {
            let likes = self
                .interactions
                .interactions_by_kind(*other, InteractionKind::Like, LIKES_PER_USER)
                .await?;
            for like in likes {
                if !my_contents.contains(&like.content_id) {
                    *candidate_scores.entry(like.content_id).or_insert(0.0) += score;
                }
            }
        }

        let mut hits: Vec<SearchHit> = candidate_scores
            .into_iter()
            .filter_map(|(content_id, score)| {
                self.store.get_active(content_id).map(|record| {
                    let mut hit = SearchHit::from_record(&record);
                    hit.relevance_score = Some(crate::models::round2(score));
                    hit
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    /// Unseen content matching the subject's preferred categories and tags,
    /// ranked by quality.
    pub async fn behavior_based(&self, user_id: i64, limit: usize) -> Result<Vec<SearchHit>> {
        let limit = clamp_limit(limit);
        let mut profile_interactions = self
            .interactions
            .interactions_by_kind(user_id, InteractionKind::Like, PROFILE_LIKES)
            .await?;
        profile_interactions.extend(
            self.interactions
                .interactions_by_kind(user_id, InteractionKind::Favorite, PROFILE_FAVORITES)
                .await?,
        );
        if profile_interactions.is_empty() {
            info!(user_id, "no likes or favorites, behavior profile is empty");
            return Ok(Vec::new());
        }

        let mut category_counts: HashMap<i64, usize> = HashMap::new();
        let mut tag_counts: HashMap<String, usize> = HashMap::new();
        for interaction in &profile_interactions {
            if let Some(record) = self.store.get_active(interaction.content_id) {
                if let Some(category_id) = record.category_id {
                    *category_counts.entry(category_id).or_insert(0) += 1;
                }
                for tag in similarity::tag_set(&record.tags) {
                    *tag_counts.entry(tag).or_insert(0) += 1;
                }
            }
        }

        let top_categories = top_keys(category_counts, TOP_CATEGORIES);
        let top_tags = top_keys(tag_counts, TOP_TAGS);
        if top_categories.is_empty() && top_tags.is_empty() {
            return Ok(Vec::new());
        }

        let seen: HashSet<i64> = self
            .interactions
            .interactions_of(user_id, SEEN_WINDOW)
            .await?
            .into_iter()
            .map(|i| i.content_id)
            .collect();

        let mut hits: Vec<SearchHit> = self
            .store
            .active_records()
            .into_iter()
            .filter(|record| !seen.contains(&record.content_id))
            .filter(|record| {
                let in_category = record
                    .category_id
                    .map(|id| top_categories.contains(&id))
                    .unwrap_or(false);
                let has_tag = similarity::tag_set(&record.tags)
                    .iter()
                    .any(|tag| top_tags.contains(tag));
                in_category || has_tag
            })
            .map(|record| SearchHit::from_record(&record))
            .collect();

        hits.sort_by(|a, b| {
            b.quality_score
                .partial_cmp(&a.quality_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    /// Highest quality content, optionally restricted to one category.
    pub fn popularity(&self, category_id: Option<i64>, limit: usize) -> Vec<SearchHit> {
        let limit = clamp_limit(limit);
        let mut hits: Vec<SearchHit> = self
            .store
            .active_records()
            .into_iter()
            .filter(|record| match category_id {
                Some(id) => record.category_id == Some(id),
                None => true,
            })
            .map(|record| SearchHit::from_record(&record))
            .collect();
        hits.sort_by(|a, b| {
            b.quality_score
                .partial_cmp(&a.quality_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.updated_at.cmp(&a.updated_at))
        });
        hits.truncate(limit);
        hits
    }

    /// Most recently created content, optionally restricted to one category.
    pub fn freshness(&self, category_id: Option<i64>, limit: usize) -> Vec<SearchHit> {
        let limit = clamp_limit(limit);
        let mut hits: Vec<SearchHit> = self
            .store
            .active_records()
            .into_iter()
            .filter(|record| match category_id {
                Some(id) => record.category_id == Some(id),
                None => true,
            })
            .map(|record| SearchHit::from_record(&record))
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        hits.truncate(limit);
        hits
    }

    /// Quota blend: 40% behavior-personalized (popularity when the profile
    /// is empty), 20% content-based seeded by the most recent like, 30%
    /// popularity and the remainder freshness. Duplicates keep the
    /// higher-scored copy.
    pub async fn hybrid(&self, user_id: i64, limit: usize) -> Result<Vec<SearchHit>> {
        let limit = clamp_limit(limit);
        // Rounding remainders accrue to the highest-weight source, so tiny
        // limits still lead with the personalized slice.
        let freshness_quota = limit / 10;
        let popularity_quota = (limit * 3) / 10;
        let content_quota = limit / 5;
        let behavior_quota = limit - (freshness_quota + popularity_quota + content_quota);

        let mut pool: Vec<SearchHit> = Vec::new();

        if behavior_quota > 0 {
            let behavior = self.behavior_based(user_id, behavior_quota).await?;
            if behavior.is_empty() {
                pool.extend(self.popularity(None, behavior_quota));
            } else {
                pool.extend(behavior);
            }
        }

        if content_quota > 0 {
            let recent_likes = self
                .interactions
                .interactions_by_kind(user_id, InteractionKind::Like, 1)
                .await?;
            if let Some(like) = recent_likes.first() {
                pool.extend(self.content_based(like.content_id, content_quota));
            }
        }

        if popularity_quota > 0 {
            pool.extend(self.popularity(None, popularity_quota));
        }

        if freshness_quota > 0 {
            pool.extend(self.freshness(None, freshness_quota));
        }

        // Dedupe by id, keeping whichever copy scored higher.
        let mut best: HashMap<i64, SearchHit> = HashMap::new();
        for hit in pool {
            match best.get(&hit.id) {
                Some(existing) if existing.combined_score() >= hit.combined_score() => {}
                _ => {
                    best.insert(hit.id, hit);
                }
            }
        }

        let mut merged: Vec<SearchHit> = best.into_values().collect();
        merged.sort_by(|a, b| {
            b.combined_score()
                .partial_cmp(&a.combined_score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        merged.truncate(limit);
        Ok(merged)
    }

    /// Replace a failed or empty personalized result with the popularity
    /// ranking. Strategy failures are logged and never reach the caller.
    fn with_fallback(
        &self,
        strategy: Strategy,
        outcome: Result<Vec<SearchHit>>,
        limit: usize,
    ) -> Vec<SearchHit> {
        match outcome {
            Ok(hits) if !hits.is_empty() => hits,
            Ok(_) => {
                info!(?strategy, "personalized strategy empty, serving popularity");
                self.popularity(None, limit)
            }
            Err(err) => {
                warn!(?strategy, error = %err, "strategy failed, serving popularity");
                self.popularity(None, limit)
            }
        }
    }
}

fn clamp_limit(limit: usize) -> usize {
    if limit == 0 {
        DEFAULT_LIMIT
    } else {
        limit.min(MAX_LIMIT)
    }
}

fn category_filter(subject_id: i64) -> Option<i64> {
    (subject_id > 0).then_some(subject_id)
}

/// Keys of the map with the highest counts, at most `n` of them.
fn top_keys<K: std::hash::Hash + Eq + Ord>(counts: HashMap<K, usize>, n: usize) -> HashSet<K> {
    let mut entries: Vec<(K, usize)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(n);
    entries.into_iter().map(|(k, _)| k).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentIndexRecord, ContentType, RecordStatus};
    use crate::stores::MemoryInteractionLog;
    use chrono::{Duration, Utc};

    fn record(
        id: i64,
        category_id: Option<i64>,
        tags: &str,
        author_id: i64,
        quality: f64,
    ) -> ContentIndexRecord {
        let now = Utc::now();
        ContentIndexRecord {
            content_id: id,
            title: format!("content {id}"),
            summary: String::new(),
            search_text: String::new(),
            category_id,
            category_name: None,
            tags: tags.to_string(),
            author_id,
            author_name: None,
            content_type: ContentType::Text,
            view_count: 0,
            like_count: 0,
            favorite_count: 0,
            comment_count: 0,
            quality_score: quality,
            status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    fn engine() -> (Arc<IndexStore>, Arc<MemoryInteractionLog>, RecommendationEngine) {
        let store = Arc::new(IndexStore::new());
        let interactions = Arc::new(MemoryInteractionLog::new());
        let engine = RecommendationEngine::new(store.clone(), interactions.clone());
        (store, interactions, engine)
    }

    #[test]
    fn content_based_ranks_by_similarity() {
        let (store, _log, engine) = engine();
        store.upsert(record(1, Some(3), "math,algebra", 7, 1.0));
        store.upsert(record(2, Some(3), "math,algebra", 7, 1.0)); // near twin
        store.upsert(record(3, Some(3), "history", 8, 1.0)); // category only
        store.upsert(record(4, None, "poetry", 9, 1.0)); // type only

        let hits = engine.content_based(1, 10);
        let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
        assert!(hits[0].relevance_score.unwrap() > hits[1].relevance_score.unwrap());
        assert!(!ids.contains(&1));
    }

    #[test]
    fn content_based_unknown_source_is_empty() {
        let (store, _log, engine) = engine();
        store.upsert(record(1, Some(3), "math", 7, 1.0));
        assert!(engine.content_based(99, 10).is_empty());
    }

    #[tokio::test]
    async fn collaborative_recommends_neighbor_likes() {
        let (store, log, engine) = engine();
        store.upsert(record(10, Some(1), "", 1, 1.0));
        store.upsert(record(11, Some(1), "", 1, 1.0));
        store.upsert(record(12, Some(1), "", 1, 1.0));

        // Users 1 and 2 overlap on content 10; user 2 also likes 11 and 12.
        log.record(1, 10, InteractionKind::Like);
        log.record(2, 10, InteractionKind::Like);
        log.record(2, 11, InteractionKind::Like);
        log.record(2, 12, InteractionKind::Like);

        let hits = engine.collaborative(1, 10).await.unwrap();
        let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&11) && ids.contains(&12));
        // Already-interacted content is excluded.
        assert!(!ids.contains(&10));
    }

    #[tokio::test]
    async fn collaborative_without_history_is_empty() {
        let (_store, _log, engine) = engine();
        assert!(engine.collaborative(1, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn behavior_matches_preferred_categories_and_excludes_seen() {
        let (store, log, engine) = engine();
        store.upsert(record(10, Some(3), "math", 1, 1.0));
        store.upsert(record(11, Some(3), "", 1, 2.0)); // same category, unseen
        store.upsert(record(12, Some(9), "math", 2, 1.5)); // matching tag
        store.upsert(record(13, Some(9), "poetry", 2, 3.0)); // no overlap

        log.record(1, 10, InteractionKind::Like);

        let hits = engine.behavior_based(1, 10).await.unwrap();
        let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![11, 12]);
    }

    #[tokio::test]
    async fn recommend_falls_back_to_popularity() {
        let (store, _log, engine) = engine();
        store.upsert(record(1, Some(3), "", 1, 5.0));
        store.upsert(record(2, Some(3), "", 1, 2.0));

        // No history at all: behavior degrades to the popularity ranking.
        let hits = engine.recommend(Strategy::Behavior, 42, 10).await;
        let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    struct FailingLog;

    #[async_trait::async_trait]
    impl crate::stores::InteractionLog for FailingLog {
        async fn interactions_of(
            &self,
            _user_id: i64,
            _limit: usize,
        ) -> anyhow::Result<Vec<crate::models::Interaction>> {
            anyhow::bail!("interaction store unreachable")
        }

        async fn interactions_by_kind(
            &self,
            _user_id: i64,
            _kind: InteractionKind,
            _limit: usize,
        ) -> anyhow::Result<Vec<crate::models::Interaction>> {
            anyhow::bail!("interaction store unreachable")
        }

        async fn users_who_interacted(&self, _content_id: i64) -> anyhow::Result<Vec<i64>> {
            anyhow::bail!("interaction store unreachable")
        }

        async fn engagement_counts(
            &self,
            _content_id: i64,
        ) -> anyhow::Result<crate::stores::EngagementCounts> {
            anyhow::bail!("interaction store unreachable")
        }
    }

    #[tokio::test]
    async fn failing_interaction_log_degrades_to_popularity() {
        let store = Arc::new(IndexStore::new());
        store.upsert(record(1, Some(3), "", 1, 5.0));
        store.upsert(record(2, Some(3), "", 1, 2.0));
        let engine = RecommendationEngine::new(store, Arc::new(FailingLog));

        for strategy in [Strategy::Collaborative, Strategy::Behavior, Strategy::Hybrid] {
            let hits = engine.recommend(strategy, 42, 10).await;
            let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
            assert_eq!(ids, vec![1, 2], "{strategy:?} should serve popularity");
        }
    }

    #[tokio::test]
    async fn hybrid_small_limit_stays_personalized() {
        let (store, _log, engine) = engine();
        // Old but high quality vs brand new but unengaged.
        let mut seasoned = record(1, Some(3), "", 1, 9.0);
        seasoned.created_at = Utc::now() - Duration::days(60);
        store.upsert(seasoned);
        store.upsert(record(2, Some(3), "", 1, 0.1));

        // No history: the personalized slice falls back to popularity, and
        // with limit 1 that slice owns the whole budget.
        let hits = engine.hybrid(999, 1).await.unwrap();
        let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn popularity_filters_by_category_and_ranks_by_quality() {
        let (store, _log, engine) = engine();
        store.upsert(record(1, Some(3), "", 1, 1.0));
        store.upsert(record(2, Some(3), "", 1, 4.0));
        store.upsert(record(3, Some(9), "", 1, 9.0));

        let hits = engine.popularity(Some(3), 10);
        let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![2, 1]);

        let all = engine.popularity(None, 10);
        assert_eq!(all[0].id, 3);
    }

    #[test]
    fn freshness_ranks_by_created_at() {
        let (store, _log, engine) = engine();
        let mut old = record(1, None, "", 1, 9.0);
        old.created_at = Utc::now() - Duration::days(30);
        store.upsert(old);
        store.upsert(record(2, None, "", 1, 0.1));

        let hits = engine.freshness(None, 10);
        let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn hybrid_dedupes_and_respects_limit() {
        let (store, log, engine) = engine();
        for i in 1..=8 {
            store.upsert(record(i, Some(3), "math", 1, i as f64));
        }
        log.record(1, 1, InteractionKind::Like);
        log.record(2, 1, InteractionKind::Like);
        log.record(2, 2, InteractionKind::Like);

        let hits = engine.hybrid(1, 10).await.unwrap();
        assert!(hits.len() <= 10);
        let mut ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), before);

        // Scores are non-increasing.
        for pair in hits.windows(2) {
            assert!(pair[0].combined_score() >= pair[1].combined_score());
        }
    }

    #[tokio::test]
    async fn recommend_clamps_limit() {
        let (store, _log, engine) = engine();
        for i in 0..80 {
            store.upsert(record(i, None, "", 1, i as f64));
        }
        let hits = engine.recommend(Strategy::Popularity, 0, 500).await;
        assert_eq!(hits.len(), MAX_LIMIT);

        let defaulted = engine.recommend(Strategy::Popularity, 0, 0).await;
        assert_eq!(defaulted.len(), DEFAULT_LIMIT);
    }

    #[test]
    fn every_strategy_has_an_explanation() {
        for strategy in [
            Strategy::ContentBased,
            Strategy::Collaborative,
            Strategy::Behavior,
            Strategy::Popularity,
            Strategy::Freshness,
            Strategy::Hybrid,
        ] {
            assert!(!strategy.explain().is_empty());
        }
    }
}
