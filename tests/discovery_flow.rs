//! End-to-end flow over the engines wired together the way the service
//! wires them: index rebuild, search with analytics, hot keywords,
//! recommendations, engagement updates and removal.

use chrono::Utc;
use discovery_service::index::{EngagementDelta, IndexMaintainer, IndexStore};
use discovery_service::models::{ContentItem, ContentType, InteractionKind};
use discovery_service::recommend::{RecommendationEngine, Strategy};
use discovery_service::search::{QueryEngine, SearchRequest};
use discovery_service::stores::{
    MemoryCategoryDirectory, MemoryContentStore, MemoryInteractionLog, MemoryUserDirectory,
};
use discovery_service::trends::{RankingPeriod, TrendTracker};
use std::sync::Arc;

struct Harness {
    content: Arc<MemoryContentStore>,
    interactions: Arc<MemoryInteractionLog>,
    maintainer: IndexMaintainer,
    query: QueryEngine,
    tracker: Arc<TrendTracker>,
    recommender: RecommendationEngine,
}

fn harness() -> Harness {
    let content = Arc::new(MemoryContentStore::new());
    let categories = Arc::new(MemoryCategoryDirectory::new());
    categories.insert(1, "Mathematics");
    categories.insert(2, "Programming");
    let users = Arc::new(MemoryUserDirectory::new());
    users.insert(100, "Ada");
    users.insert(101, "Grace");
    let interactions = Arc::new(MemoryInteractionLog::new());

    let store = Arc::new(IndexStore::new());
    let maintainer = IndexMaintainer::new(
        store.clone(),
        content.clone(),
        categories.clone(),
        users,
        interactions.clone(),
    );
    let tracker = Arc::new(TrendTracker::new(categories));
    let query = QueryEngine::new(store.clone(), tracker.clone());
    let recommender = RecommendationEngine::new(store, interactions.clone());

    Harness {
        content,
        interactions,
        maintainer,
        query,
        tracker,
        recommender,
    }
}

fn item(id: i64, title: &str, tags: &str, category_id: i64, author_id: i64) -> ContentItem {
    let now = Utc::now();
    ContentItem {
        id,
        title: title.to_string(),
        body: format!("Long form notes about {title}."),
        tags: tags.to_string(),
        category_id: Some(category_id),
        author_id,
        content_type: ContentType::Text,
        published: true,
        comment_count: 0,
        created_at: now,
        updated_at: now,
    }
}

async fn seed(h: &Harness) {
    h.content.upsert(item(1, "Linear Algebra Basics", "math,algebra", 1, 100));
    h.content.upsert(item(2, "Advanced Algebra", "math,algebra,proofs", 1, 100));
    h.content.upsert(item(3, "Rust Ownership Explained", "rust,memory", 2, 101));
    h.content.upsert(item(4, "Calculus Primer", "math,calculus", 1, 101));
    let mut draft = item(5, "Unpublished Draft", "draft", 2, 101);
    draft.published = false;
    h.content.upsert(draft);

    let indexed = h.maintainer.rebuild_index().await.unwrap();
    assert_eq!(indexed, 4);
}

#[tokio::test]
async fn search_ranks_engaged_content_first_and_feeds_trends() {
    let h = harness();
    seed(&h).await;

    // Content 2 accrues engagement, then its counters get refreshed.
    h.interactions.record(100, 2, InteractionKind::Like);
    h.interactions.record(101, 2, InteractionKind::Like);
    h.interactions.record_view(100, 2, "10.0.0.1");
    h.maintainer.upsert_index(2).await.unwrap();

    let page = h
        .query
        .search(SearchRequest {
            keyword: "algebra".into(),
            highlight: true,
            ..Default::default()
        })
        .await;
    assert_eq!(page.total, 2);
    assert_eq!(page.results[0].id, 2);
    assert!(page.results[0]
        .highlighted_title
        .as_deref()
        .unwrap()
        .contains("<mark>Algebra</mark>"));

    // The detached analytics task lands eventually.
    for _ in 0..100 {
        if h.tracker.trend_score("algebra").is_some() {
            break;
        }
        tokio::task::yield_now().await;
    }
    let hot = h.tracker.ranking(RankingPeriod::Daily, 10);
    assert_eq!(hot[0].keyword, "algebra");
    assert_eq!(hot[0].result_count, 2);

    // Clicking boosts the trend score.
    let before = h.tracker.trend_score("algebra").unwrap();
    assert!(h.tracker.record_click("algebra"));
    assert!(h.tracker.trend_score("algebra").unwrap() > before);
}

#[tokio::test]
async fn unpublished_and_removed_content_never_surface() {
    let h = harness();
    seed(&h).await;

    let page = h
        .query
        .search(SearchRequest {
            keyword: "draft".into(),
            ..Default::default()
        })
        .await;
    assert_eq!(page.total, 0);

    // Removing indexed content hides it from search and recommendations.
    assert!(h.maintainer.remove_index(3));
    let page = h
        .query
        .search(SearchRequest {
            keyword: "rust".into(),
            ..Default::default()
        })
        .await;
    assert_eq!(page.total, 0);
    let popular = h.recommender.popularity(None, 50);
    assert!(popular.iter().all(|hit| hit.id != 3));
}

#[tokio::test]
async fn recommendations_personalize_and_fall_back() {
    let h = harness();
    seed(&h).await;

    // Content-based: algebra items are each other's nearest neighbors.
    let similar = h.recommender.content_based(1, 10);
    assert_eq!(similar[0].id, 2);

    // A user with math likes gets unseen math content, not rust content.
    h.interactions.record(100, 1, InteractionKind::Like);
    h.interactions.record(100, 2, InteractionKind::Favorite);
    let behavior = h.recommender.behavior_based(100, 10).await.unwrap();
    let ids: Vec<i64> = behavior.iter().map(|hit| hit.id).collect();
    assert_eq!(ids, vec![4]);

    // A user with no history falls back to popularity.
    let fallback = h.recommender.recommend(Strategy::Hybrid, 999, 10).await;
    assert!(!fallback.is_empty());
    let mut seen: Vec<i64> = fallback.iter().map(|hit| hit.id).collect();
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), fallback.len());
}

#[tokio::test]
async fn engagement_deltas_reorder_popularity() {
    let h = harness();
    seed(&h).await;

    assert!(h.maintainer.adjust_engagement(
        4,
        EngagementDelta {
            views: 500,
            likes: 40,
            favorites: 10,
            comments: 5,
        },
    ));

    let popular = h.recommender.popularity(Some(1), 10);
    assert_eq!(popular[0].id, 4);

    let page = h
        .query
        .search(SearchRequest {
            keyword: "math".into(),
            ..Default::default()
        })
        .await;
    assert_eq!(page.results[0].id, 4);
}
