//! Hot keyword analytics: per-keyword search/click accounting, trend
//! scoring, ranking windows and the stale keyword sweep.

use crate::models::{HotKeyword, KeywordStatus};
use crate::stores::CategoryDirectory;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

const MAX_RANKING_LIMIT: usize = 100;
const MAX_SUGGESTIONS: usize = 10;
const MIN_SUGGESTION_PREFIX: usize = 2;
const TRENDING_WINDOW_DAYS: i64 = 7;

/// Ranking window selector for hot keyword queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingPeriod {
    Daily,
    Weekly,
    Monthly,
    Trending,
    Overall,
}

impl Default for RankingPeriod {
    fn default() -> Self {
        RankingPeriod::Overall
    }
}

/// Which rolling counter a period reset clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetPeriod {
    Daily,
    Weekly,
    Monthly,
}

/// Aggregate keyword statistics for the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct KeywordStatistics {
    pub total_keywords: usize,
    pub total_searches: u64,
    pub total_clicks: u64,
    pub searches_today: u64,
}

/// Tracks every normalized search term ever seen and its analytics.
///
/// One entry per keyword; entry guards serialize concurrent updates to the
/// same term. Category names are resolved before touching the map so no
/// entry guard is ever held across an await.
pub struct TrendTracker {
    keywords: DashMap<String, HotKeyword>,
    categories: Arc<dyn CategoryDirectory>,
}

impl TrendTracker {
    pub fn new(categories: Arc<dyn CategoryDirectory>) -> Self {
        Self {
            keywords: DashMap::new(),
            categories,
        }
    }

    /// Account one search for a keyword, creating its entry on first sight.
    ///
    /// `result_count` overwrites the stored value (most recent search wins);
    /// a category hint on first sight tags the keyword for related-keyword
    /// grouping.
    pub async fn record_search(
        &self,
        raw_keyword: &str,
        result_count: u64,
        category_id: Option<i64>,
    ) {
        let keyword = normalize(raw_keyword);
        if keyword.is_empty() {
            return;
        }

        // Resolve the category name first: DashMap entry guards must not
        // live across an await point.
        let category_name = match category_id {
            Some(id) => match self.categories.name_of(id).await {
                Ok(name) => name,
                Err(err) => {
                    warn!(category_id = id, error = %err, "category lookup failed for keyword tagging");
                    None
                }
            },
            None => None,
        };

        let now = Utc::now();
        let mut entry = self
            .keywords
            .entry(keyword.clone())
            .or_insert_with(|| HotKeyword::new(keyword.clone(), now));
        if entry.category_id.is_none() {
            entry.category_id = category_id;
            entry.category_name = category_name;
        }
        entry.record_search(result_count, now);
        debug!(keyword = %keyword, result_count, "search recorded");
    }

    /// Account one click on a result for a keyword. Unknown keywords are
    /// ignored; a click without a prior search is a client bug.
    pub fn record_click(&self, raw_keyword: &str) -> bool {
        let keyword = normalize(raw_keyword);
        match self.keywords.get_mut(&keyword) {
            Some(mut entry) => {
                entry.record_click(Utc::now());
                true
            }
            None => {
                debug!(keyword = %keyword, "click for untracked keyword ignored");
                false
            }
        }
    }

    pub fn trend_score(&self, raw_keyword: &str) -> Option<f64> {
        self.keywords
            .get(&normalize(raw_keyword))
            .map(|k| k.trend_score)
    }

    /// Ranked hot keywords for one window. Limit is capped at 100.
    ///
    /// Daily/weekly/monthly rank by the rolling counter and skip zero
    /// entries; trending ranks the last 7 days of activity by trend score;
    /// overall ranks everything by trend score.
    pub fn ranking(&self, period: RankingPeriod, limit: usize) -> Vec<HotKeyword> {
        let limit = limit.clamp(1, MAX_RANKING_LIMIT);
        let now = Utc::now();

        let mut ranked: Vec<HotKeyword> = self
            .keywords
            .iter()
            .filter(|k| k.status == KeywordStatus::Active)
            .filter(|k| match period {
                RankingPeriod::Daily => k.daily_count > 0,
                RankingPeriod::Weekly => k.weekly_count > 0,
                RankingPeriod::Monthly => k.monthly_count > 0,
                RankingPeriod::Trending => {
                    now - k.last_searched_at <= Duration::days(TRENDING_WINDOW_DAYS)
                }
                RankingPeriod::Overall => true,
            })
            .map(|k| k.clone())
            .collect();

        match period {
            RankingPeriod::Daily => ranked.sort_by(|a, b| b.daily_count.cmp(&a.daily_count)),
            RankingPeriod::Weekly => ranked.sort_by(|a, b| b.weekly_count.cmp(&a.weekly_count)),
            RankingPeriod::Monthly => ranked.sort_by(|a, b| b.monthly_count.cmp(&a.monthly_count)),
            RankingPeriod::Trending | RankingPeriod::Overall => ranked.sort_by(|a, b| {
                b.trend_score
                    .partial_cmp(&a.trend_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
        }

        ranked.truncate(limit);
        ranked
    }

    /// Clear one rolling counter on every keyword. Idempotent; returns the
    /// number of keywords touched.
    pub fn reset_period(&self, period: ResetPeriod) -> usize {
        let mut touched = 0usize;
        for mut entry in self.keywords.iter_mut() {
            match period {
                ResetPeriod::Daily => entry.daily_count = 0,
                ResetPeriod::Weekly => entry.weekly_count = 0,
                ResetPeriod::Monthly => entry.monthly_count = 0,
            }
            touched += 1;
        }
        info!(?period, touched, "period counters reset");
        touched
    }

    /// Drop keywords with at most `max_count` lifetime searches whose last
    /// search predates `cutoff`. Returns the number removed.
    pub fn cleanup(&self, max_count: u64, cutoff: DateTime<Utc>) -> usize {
        let before = self.keywords.len();
        self.keywords
            .retain(|_, k| !(k.search_count <= max_count && k.last_searched_at < cutoff));
        // Concurrent inserts during the sweep can grow the map past `before`.
        let removed = before.saturating_sub(self.keywords.len());
        info!(removed, max_count, "stale keyword sweep finished");
        removed
    }

    /// Prefix suggestions for the search box. Prefixes shorter than 2 chars
    /// return nothing; results rank by lifetime search count, at most
    /// `min(limit, 10)` of them.
    pub fn suggest(&self, raw_prefix: &str, limit: usize) -> Vec<String> {
        let prefix = normalize(raw_prefix);
        if prefix.chars().count() < MIN_SUGGESTION_PREFIX {
            return Vec::new();
        }
        let limit = limit.clamp(1, MAX_SUGGESTIONS);

        let mut matches: Vec<(String, u64)> = self
            .keywords
            .iter()
            .filter(|k| k.status == KeywordStatus::Active && k.keyword.starts_with(&prefix))
            .map(|k| (k.keyword.clone(), k.search_count))
            .collect();
        matches.sort_by(|a, b| b.1.cmp(&a.1));
        matches.truncate(limit);
        matches.into_iter().map(|(keyword, _)| keyword).collect()
    }

    /// Keywords in the same category as the given one, ranked by trend
    /// score. Falls back to the overall trend ranking when the keyword is
    /// untracked or untagged.
    pub fn related_keywords(&self, raw_keyword: &str, limit: usize) -> Vec<String> {
        let keyword = normalize(raw_keyword);
        let limit = limit.clamp(1, MAX_RANKING_LIMIT);

        let category_id = self
            .keywords
            .get(&keyword)
            .and_then(|k| k.category_id);

        let mut related: Vec<HotKeyword> = match category_id {
            Some(category_id) => self
                .keywords
                .iter()
                .filter(|k| {
                    k.status == KeywordStatus::Active
                        && k.category_id == Some(category_id)
                        && k.keyword != keyword
                })
                .map(|k| k.clone())
                .collect(),
            None => {
                return self
                    .ranking(RankingPeriod::Overall, limit)
                    .into_iter()
                    .map(|k| k.keyword)
                    .filter(|k| *k != keyword)
                    .take(limit)
                    .collect()
            }
        };

        related.sort_by(|a, b| {
            b.trend_score
                .partial_cmp(&a.trend_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        related.truncate(limit);
        related.into_iter().map(|k| k.keyword).collect()
    }

    /// Aggregate statistics across all tracked keywords.
    pub fn statistics(&self) -> KeywordStatistics {
        let mut stats = KeywordStatistics {
            total_keywords: 0,
            total_searches: 0,
            total_clicks: 0,
            searches_today: 0,
        };
        for keyword in self.keywords.iter() {
            stats.total_keywords += 1;
            stats.total_searches += keyword.search_count;
            stats.total_clicks += keyword.click_count;
            stats.searches_today += keyword.daily_count;
        }
        stats
    }

    /// Keywords whose most recent search found nothing, ranked by search
    /// count. Surfaces content gaps to editors.
    pub fn failed_keywords(&self, limit: usize) -> Vec<HotKeyword> {
        let limit = limit.clamp(1, MAX_RANKING_LIMIT);
        let mut failed: Vec<HotKeyword> = self
            .keywords
            .iter()
            .filter(|k| k.result_count == 0 && k.search_count > 0)
            .map(|k| k.clone())
            .collect();
        failed.sort_by(|a, b| b.search_count.cmp(&a.search_count));
        failed.truncate(limit);
        failed
    }
}

fn normalize(keyword: &str) -> String {
    keyword.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryCategoryDirectory;

    fn tracker() -> TrendTracker {
        let categories = Arc::new(MemoryCategoryDirectory::new());
        categories.insert(3, "Mathematics");
        TrendTracker::new(categories)
    }

    #[tokio::test]
    async fn search_recording_normalizes_keywords() {
        let tracker = tracker();
        tracker.record_search("  Rust  ", 5, None).await;
        tracker.record_search("rust", 4, None).await;

        let ranked = tracker.ranking(RankingPeriod::Overall, 10);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].keyword, "rust");
        assert_eq!(ranked[0].search_count, 2);
        // Most recent search wins for result_count.
        assert_eq!(ranked[0].result_count, 4);
    }

    #[tokio::test]
    async fn empty_keyword_is_not_tracked() {
        let tracker = tracker();
        tracker.record_search("   ", 5, None).await;
        assert!(tracker.ranking(RankingPeriod::Overall, 10).is_empty());
    }

    #[tokio::test]
    async fn clicks_require_prior_search() {
        let tracker = tracker();
        assert!(!tracker.record_click("rust"));

        tracker.record_search("rust", 3, None).await;
        assert!(tracker.record_click("Rust"));

        let ranked = tracker.ranking(RankingPeriod::Overall, 10);
        assert_eq!(ranked[0].click_count, 1);
    }

    #[tokio::test]
    async fn daily_ranking_skips_idle_keywords() {
        let tracker = tracker();
        tracker.record_search("rust", 3, None).await;
        tracker.record_search("rust", 3, None).await;
        tracker.record_search("tokio", 1, None).await;

        tracker.reset_period(ResetPeriod::Daily);
        tracker.reset_period(ResetPeriod::Daily); // idempotent
        tracker.record_search("tokio", 1, None).await;

        let daily = tracker.ranking(RankingPeriod::Daily, 10);
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].keyword, "tokio");

        // Lifetime counters survive the reset.
        let overall = tracker.ranking(RankingPeriod::Overall, 10);
        let rust = overall.iter().find(|k| k.keyword == "rust").unwrap();
        assert_eq!(rust.search_count, 2);
    }

    #[tokio::test]
    async fn ranking_orders_by_trend_score() {
        let tracker = tracker();
        tracker.record_search("quiet", 1, None).await;
        for _ in 0..10 {
            tracker.record_search("loud", 5, None).await;
        }
        tracker.record_click("loud");

        let ranked = tracker.ranking(RankingPeriod::Overall, 10);
        assert_eq!(ranked[0].keyword, "loud");
        assert!(ranked[0].trend_score > ranked[1].trend_score);
    }

    #[tokio::test]
    async fn ranking_limit_is_capped() {
        let tracker = tracker();
        for i in 0..150 {
            tracker.record_search(&format!("kw{i}"), 1, None).await;
        }
        assert_eq!(tracker.ranking(RankingPeriod::Overall, 500).len(), 100);
    }

    #[tokio::test]
    async fn cleanup_drops_stale_low_volume_keywords() {
        let tracker = tracker();
        tracker.record_search("rare", 1, None).await;
        for _ in 0..10 {
            tracker.record_search("popular", 5, None).await;
        }

        // Cutoff in the future: everything is "old enough", so only the
        // count threshold decides.
        let removed = tracker.cleanup(5, Utc::now() + Duration::hours(1));
        assert_eq!(removed, 1);
        let remaining = tracker.ranking(RankingPeriod::Overall, 10);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].keyword, "popular");

        // Recently searched keywords survive a past cutoff.
        let removed = tracker.cleanup(100, Utc::now() - Duration::days(90));
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn suggestions_rank_by_search_count_and_cap() {
        let tracker = tracker();
        for _ in 0..3 {
            tracker.record_search("rust async", 2, None).await;
        }
        tracker.record_search("rust web", 2, None).await;
        tracker.record_search("python", 2, None).await;

        let suggestions = tracker.suggest("ru", 10);
        assert_eq!(suggestions, vec!["rust async", "rust web"]);

        // A smaller limit is honored, keeping the highest search counts.
        assert_eq!(tracker.suggest("ru", 1), vec!["rust async"]);

        assert!(tracker.suggest("r", 10).is_empty());
        assert!(tracker.suggest("", 10).is_empty());

        for i in 0..15 {
            tracker.record_search(&format!("rust {i}"), 1, None).await;
        }
        // The server-side cap holds no matter what the caller asks for.
        assert_eq!(tracker.suggest("rust", 50).len(), 10);
    }

    #[tokio::test]
    async fn related_keywords_share_a_category() {
        let tracker = tracker();
        tracker.record_search("algebra", 3, Some(3)).await;
        tracker.record_search("geometry", 3, Some(3)).await;
        tracker.record_search("calculus", 3, Some(3)).await;
        tracker.record_search("poetry", 3, Some(9)).await;

        let related = tracker.related_keywords("algebra", 10);
        assert_eq!(related.len(), 2);
        assert!(related.contains(&"geometry".to_string()));
        assert!(related.contains(&"calculus".to_string()));
        assert!(!related.contains(&"poetry".to_string()));
    }

    #[tokio::test]
    async fn related_keywords_fall_back_to_overall_ranking() {
        let tracker = tracker();
        tracker.record_search("alpha", 3, None).await;
        tracker.record_search("beta", 3, None).await;

        let related = tracker.related_keywords("alpha", 10);
        assert_eq!(related, vec!["beta".to_string()]);

        let unknown = tracker.related_keywords("never-seen", 10);
        assert_eq!(unknown.len(), 2);
    }

    #[tokio::test]
    async fn statistics_aggregate_all_keywords() {
        let tracker = tracker();
        tracker.record_search("a", 1, None).await;
        tracker.record_search("a", 1, None).await;
        tracker.record_search("b", 0, None).await;
        tracker.record_click("a");

        let stats = tracker.statistics();
        assert_eq!(stats.total_keywords, 2);
        assert_eq!(stats.total_searches, 3);
        assert_eq!(stats.total_clicks, 1);
        assert_eq!(stats.searches_today, 3);
    }

    #[tokio::test]
    async fn failed_keywords_surface_zero_result_searches() {
        let tracker = tracker();
        tracker.record_search("found", 4, None).await;
        tracker.record_search("missing", 0, None).await;
        tracker.record_search("missing", 0, None).await;
        tracker.record_search("also missing", 0, None).await;

        let failed = tracker.failed_keywords(10);
        assert_eq!(failed.len(), 2);
        assert_eq!(failed[0].keyword, "missing");
    }
}
