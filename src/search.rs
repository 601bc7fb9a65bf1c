//! Query engine: fuzzy and full-text search over the content index, with
//! filtering, ranking, pagination and highlighting.

use crate::index::IndexStore;
use crate::models::{ContentIndexRecord, ContentType, SearchHit, SearchPage};
use crate::trends::TrendTracker;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 100;

/// One search request, as bound from query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub keyword: String,
    pub category_id: Option<i64>,
    pub content_type: Option<ContentType>,
    pub author_id: Option<i64>,
    #[serde(default)]
    pub page: usize,
    #[serde(default)]
    pub page_size: usize,
    /// Full-text token matching instead of fuzzy substring matching.
    #[serde(default)]
    pub use_full_text: bool,
    #[serde(default)]
    pub highlight: bool,
}

/// Searches the content index and feeds keyword analytics as a side effect.
pub struct QueryEngine {
    store: Arc<IndexStore>,
    tracker: Arc<TrendTracker>,
}

impl QueryEngine {
    pub fn new(store: Arc<IndexStore>, tracker: Arc<TrendTracker>) -> Self {
        Self { store, tracker }
    }

    /// Run one search. An empty keyword short-circuits to an empty page
    /// without touching keyword analytics.
    ///
    /// Results rank by quality score, ties broken by recency. Trend
    /// accounting runs fire-and-forget so a slow tracker never delays the
    /// response.
    pub async fn search(&self, request: SearchRequest) -> SearchPage {
        let keyword = request.keyword.trim().to_lowercase();
        let page = request.page.max(1);
        let page_size = if request.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            request.page_size.min(MAX_PAGE_SIZE)
        };

        if keyword.is_empty() {
            return SearchPage::empty(page, page_size);
        }

        let mut matched: Vec<ContentIndexRecord> = self
            .store
            .active_records()
            .into_iter()
            .filter(|record| {
                if request.use_full_text {
                    matches_full_text(&record.search_text, &keyword)
                } else {
                    record.search_text.to_lowercase().contains(&keyword)
                }
            })
            .filter(|record| match request.category_id {
                Some(category_id) => record.category_id == Some(category_id),
                None => true,
            })
            .filter(|record| match request.content_type {
                Some(content_type) => record.content_type == content_type,
                None => true,
            })
            .filter(|record| match request.author_id {
                Some(author_id) => record.author_id == author_id,
                None => true,
            })
            .collect();

        matched.sort_by(|a, b| {
            b.quality_score
                .partial_cmp(&a.quality_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.updated_at.cmp(&a.updated_at))
        });

        let total = matched.len() as u64;
        let hits: Vec<SearchHit> = matched
            .iter()
            .skip(page.saturating_sub(1).saturating_mul(page_size))
            .take(page_size)
            .map(|record| {
                let mut hit = SearchHit::from_record(record);
                if request.highlight {
                    hit.highlighted_title = Some(highlight(&record.title, &keyword));
                    hit.highlighted_summary = Some(highlight(&record.summary, &keyword));
                    hit.highlighted_tags = Some(highlight(&record.tags, &keyword));
                }
                hit
            })
            .collect();

        debug!(keyword = %keyword, total, page, "search executed");

        let tracker = self.tracker.clone();
        let category_id = request.category_id;
        tokio::spawn(async move {
            tracker.record_search(&keyword, total, category_id).await;
        });

        SearchPage {
            results: hits,
            total,
            page,
            page_size,
        }
    }
}

/// True when every whitespace token of the keyword appears as a whole
/// token of the search text, case-insensitively.
fn matches_full_text(search_text: &str, keyword: &str) -> bool {
    let text = search_text.to_lowercase();
    let tokens: Vec<&str> = text.split_whitespace().collect();
    keyword
        .split_whitespace()
        .all(|needle| tokens.iter().any(|token| *token == needle))
}

/// Wrap every case-insensitive occurrence of the keyword in `<mark>` tags.
/// Matching walks chars, not bytes, so multibyte text cannot split a match
/// mid-character.
pub fn highlight(text: &str, keyword: &str) -> String {
    let needle: Vec<char> = keyword.to_lowercase().chars().collect();
    if needle.is_empty() {
        return text.to_string();
    }

    let chars: Vec<char> = text.chars().collect();
    let lowered: Vec<char> = text.to_lowercase().chars().collect();
    // Guard against case folds that change the char count (rare, but real).
    if lowered.len() != chars.len() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if i + needle.len() <= chars.len() && lowered[i..i + needle.len()] == needle[..] {
            out.push_str("<mark>");
            out.extend(&chars[i..i + needle.len()]);
            out.push_str("</mark>");
            i += needle.len();
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}
