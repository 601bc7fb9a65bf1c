use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Quality score weights. They sum to 1.0; log damping keeps runaway
/// popularity from drowning out newer content.
const VIEW_WEIGHT: f64 = 0.3;
const LIKE_WEIGHT: f64 = 0.25;
const FAVORITE_WEIGHT: f64 = 0.25;
const COMMENT_WEIGHT: f64 = 0.2;

/// Trend decay half-life tuning: e^(-hours/168) reaches 1/e after one week.
const TREND_DECAY_HOURS: f64 = 168.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
    Video,
    Document,
    Link,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Active,
    Removed,
}

/// Denormalized, query-optimized snapshot of one published content item.
///
/// Exists iff the source content is published. All derived fields
/// (summary, search text, quality score) are recomputed on upsert, never
/// hand-set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentIndexRecord {
    pub content_id: i64,
    pub title: String,
    /// Truncated snippet, at most 500 chars plus an ellipsis.
    pub summary: String,
    /// Title + body + tags + category name + author name, space-joined.
    /// Fuzzy matching runs against a lower-cased view of this field.
    pub search_text: String,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    /// Comma-delimited tag list as stored by the content service.
    pub tags: String,
    pub author_id: i64,
    pub author_name: Option<String>,
    pub content_type: ContentType,
    pub view_count: u64,
    pub like_count: u64,
    pub favorite_count: u64,
    pub comment_count: u64,
    pub quality_score: f64,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentIndexRecord {
    /// Replace the engagement counters and recompute the quality score.
    pub fn update_engagement(&mut self, views: u64, likes: u64, favorites: u64, comments: u64) {
        self.view_count = views;
        self.like_count = likes;
        self.favorite_count = favorites;
        self.comment_count = comments;
        self.quality_score = quality_score(views, likes, favorites, comments);
    }
}

/// Log-weighted blend of engagement counters, rounded to 2 decimals.
/// Monotonically non-decreasing in every counter.
pub fn quality_score(views: u64, likes: u64, favorites: u64, comments: u64) -> f64 {
    let score = ((views + 1) as f64).ln() * VIEW_WEIGHT
        + ((likes + 1) as f64).ln() * LIKE_WEIGHT
        + ((favorites + 1) as f64).ln() * FAVORITE_WEIGHT
        + ((comments + 1) as f64).ln() * COMMENT_WEIGHT;
    round2(score)
}

/// Build the 500-char summary snippet for an index record.
pub fn summarize(body: &str) -> String {
    if body.chars().count() > 500 {
        let mut summary: String = body.chars().take(500).collect();
        summary.push_str("...");
        summary
    } else {
        body.to_string()
    }
}

/// Concatenate the searchable fields into one matching target.
pub fn build_search_text(
    title: &str,
    body: &str,
    tags: &str,
    category_name: Option<&str>,
    author_name: Option<&str>,
) -> String {
    let mut parts: Vec<&str> = vec![title, body, tags];
    if let Some(name) = category_name {
        parts.push(name);
    }
    if let Some(name) = author_name {
        parts.push(name);
    }
    parts
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordStatus {
    Active,
    Disabled,
}

/// Aggregate analytics for one normalized search term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotKeyword {
    pub keyword: String,
    pub search_count: u64,
    /// Result count of the most recent search, not a running sum.
    pub result_count: u64,
    pub click_count: u64,
    pub trend_score: f64,
    pub daily_count: u64,
    pub weekly_count: u64,
    pub monthly_count: u64,
    pub last_searched_at: DateTime<Utc>,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub status: KeywordStatus,
    pub created_at: DateTime<Utc>,
}

impl HotKeyword {
    pub fn new(keyword: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            keyword: keyword.into(),
            search_count: 0,
            result_count: 0,
            click_count: 0,
            trend_score: 0.0,
            daily_count: 0,
            weekly_count: 0,
            monthly_count: 0,
            last_searched_at: now,
            category_id: None,
            category_name: None,
            status: KeywordStatus::Active,
            created_at: now,
        }
    }

    /// Apply one search: bump every rolling counter, overwrite the result
    /// count, stamp the search time and recompute the trend score.
    pub fn record_search(&mut self, result_count: u64, now: DateTime<Utc>) {
        self.search_count += 1;
        self.daily_count += 1;
        self.weekly_count += 1;
        self.monthly_count += 1;
        self.result_count = result_count;
        self.last_searched_at = now;
        self.recalculate(now);
    }

    /// Apply one click on a search result for this keyword. Search counters
    /// are untouched.
    pub fn record_click(&mut self, now: DateTime<Utc>) {
        self.click_count += 1;
        self.recalculate(now);
    }

    /// Recompute the trend score as of `now`.
    ///
    /// base = ln(searches+1) * 10, damped by time decay (floored at half the
    /// undecayed value), boosted by click-through rate, and penalized when
    /// the last search found nothing.
    pub fn recalculate(&mut self, now: DateTime<Utc>) {
        let mut score = ((self.search_count + 1) as f64).ln() * 10.0;

        let hours = ((now - self.last_searched_at).num_seconds() as f64 / 3600.0).max(0.0);
        let decay = (-hours / TREND_DECAY_HOURS).exp();
        score *= 0.5 + 0.5 * decay;

        if self.search_count > 0 {
            let click_rate = self.click_count as f64 / self.search_count as f64;
            score *= 1.0 + click_rate;
        }

        score *= if self.result_count > 0 { 1.2 } else { 0.8 };

        self.trend_score = round2(score);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Like,
    Favorite,
    View,
}

/// One user-content interaction event. Written by the external interaction
/// recorder; a read-only input for recommendations here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: i64,
    pub content_id: i64,
    pub kind: InteractionKind,
    pub created_at: DateTime<Utc>,
    pub ip: Option<String>,
}

/// Canonical content item as served by the content store collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub tags: String,
    pub category_id: Option<i64>,
    pub author_id: i64,
    pub content_type: ContentType,
    pub published: bool,
    pub comment_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Search / recommendation result row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: i64,
    pub title: String,
    pub summary: String,
    pub content_type: ContentType,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub tags: String,
    pub author_id: i64,
    pub author_name: Option<String>,
    pub view_count: u64,
    pub like_count: u64,
    pub favorite_count: u64,
    pub comment_count: u64,
    pub quality_score: f64,
    /// Strategy-specific relevance, when a recommendation strategy scored
    /// this hit. Search results leave it unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlighted_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlighted_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlighted_tags: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SearchHit {
    pub fn from_record(record: &ContentIndexRecord) -> Self {
        Self {
            id: record.content_id,
            title: record.title.clone(),
            summary: record.summary.clone(),
            content_type: record.content_type,
            category_id: record.category_id,
            category_name: record.category_name.clone(),
            tags: record.tags.clone(),
            author_id: record.author_id,
            author_name: record.author_name.clone(),
            view_count: record.view_count,
            like_count: record.like_count,
            favorite_count: record.favorite_count,
            comment_count: record.comment_count,
            quality_score: record.quality_score,
            relevance_score: None,
            highlighted_title: None,
            highlighted_summary: None,
            highlighted_tags: None,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    /// Combined ranking key used by the hybrid blender.
    pub fn combined_score(&self) -> f64 {
        self.quality_score + self.relevance_score.unwrap_or(0.0)
    }
}

/// One page of ranked search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage {
    pub results: Vec<SearchHit>,
    pub total: u64,
    pub page: usize,
    pub page_size: usize,
}

impl SearchPage {
    pub fn empty(page: usize, page_size: usize) -> Self {
        Self {
            results: Vec::new(),
            total: 0,
            page,
            page_size,
        }
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
