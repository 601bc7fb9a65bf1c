use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::{Duration, Utc};
use discovery_service::config::Config;
use discovery_service::error::AppError;
use discovery_service::index::{IndexMaintainer, IndexStore};
use discovery_service::models::{ContentType, HotKeyword, SearchPage};
use discovery_service::recommend::{RecommendationEngine, Strategy};
use discovery_service::search::{QueryEngine, SearchRequest};
use discovery_service::stores::{
    MemoryCategoryDirectory, MemoryContentStore, MemoryInteractionLog, MemoryUserDirectory,
};
use discovery_service::trends::{KeywordStatistics, RankingPeriod, ResetPeriod, TrendTracker};
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;

// ============================================
// Request Models
// ============================================

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    category_id: Option<i64>,
    content_type: Option<ContentType>,
    author_id: Option<i64>,
    #[serde(default)]
    page: usize,
    #[serde(default)]
    page_size: usize,
    #[serde(default)]
    full_text: bool,
    #[serde(default)]
    highlight: bool,
}

#[derive(Debug, Deserialize)]
struct SuggestionsParams {
    #[serde(default)]
    prefix: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct RelatedParams {
    #[serde(default)]
    keyword: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct RankingParams {
    #[serde(default)]
    period: RankingPeriod,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Deserialize)]
struct ClickPayload {
    keyword: String,
}

#[derive(Debug, Deserialize)]
struct ResetPayload {
    period: ResetPeriod,
}

#[derive(Debug, Deserialize)]
struct RecommendParams {
    strategy: Strategy,
    #[serde(default)]
    subject_id: i64,
    #[serde(default = "default_limit")]
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct ExplainParams {
    strategy: Strategy,
}

// ============================================
// Application State
// ============================================

#[derive(Clone)]
struct AppState {
    maintainer: Arc<IndexMaintainer>,
    query: Arc<QueryEngine>,
    tracker: Arc<TrendTracker>,
    recommender: Arc<RecommendationEngine>,
    config: Config,
}

// ============================================
// Route Handlers
// ============================================

async fn health_handler() -> &'static str {
    "OK"
}

async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<SearchPage> {
    let page = state
        .query
        .search(SearchRequest {
            keyword: params.q,
            category_id: params.category_id,
            content_type: params.content_type,
            author_id: params.author_id,
            page: params.page,
            page_size: params.page_size,
            use_full_text: params.full_text,
            highlight: params.highlight,
        })
        .await;
    Json(page)
}

async fn suggestions_handler(
    State(state): State<AppState>,
    Query(params): Query<SuggestionsParams>,
) -> Json<Vec<String>> {
    Json(state.tracker.suggest(&params.prefix, params.limit))
}

async fn related_keywords_handler(
    State(state): State<AppState>,
    Query(params): Query<RelatedParams>,
) -> Json<Vec<String>> {
    Json(state.tracker.related_keywords(&params.keyword, params.limit))
}

async fn hot_keywords_handler(
    State(state): State<AppState>,
    Query(params): Query<RankingParams>,
) -> Json<Vec<HotKeyword>> {
    Json(state.tracker.ranking(params.period, params.limit))
}

async fn keyword_stats_handler(State(state): State<AppState>) -> Json<KeywordStatistics> {
    Json(state.tracker.statistics())
}

async fn record_click_handler(
    State(state): State<AppState>,
    Json(payload): Json<ClickPayload>,
) -> Json<serde_json::Value> {
    let recorded = state.tracker.record_click(&payload.keyword);
    Json(serde_json::json!({ "recorded": recorded }))
}

async fn reset_period_handler(
    State(state): State<AppState>,
    Json(payload): Json<ResetPayload>,
) -> Json<serde_json::Value> {
    let touched = state.tracker.reset_period(payload.period);
    Json(serde_json::json!({ "keywords_reset": touched }))
}

async fn cleanup_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let cutoff = Utc::now() - Duration::days(state.config.cleanup.retention_days);
    let removed = state
        .tracker
        .cleanup(state.config.cleanup.max_search_count, cutoff);
    Json(serde_json::json!({ "keywords_removed": removed }))
}

async fn recommendations_handler(
    State(state): State<AppState>,
    Query(params): Query<RecommendParams>,
) -> Json<serde_json::Value> {
    let hits = state
        .recommender
        .recommend(params.strategy, params.subject_id, params.limit)
        .await;
    Json(serde_json::json!({
        "strategy": params.strategy,
        "count": hits.len(),
        "results": hits,
    }))
}

async fn explain_handler(Query(params): Query<ExplainParams>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "strategy": params.strategy,
        "explanation": params.strategy.explain(),
    }))
}

async fn upsert_index_handler(
    State(state): State<AppState>,
    Path(content_id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.maintainer.upsert_index(content_id).await?;
    Ok(Json(serde_json::json!({ "content_id": content_id })))
}

async fn remove_index_handler(
    State(state): State<AppState>,
    Path(content_id): Path<i64>,
) -> Json<serde_json::Value> {
    let removed = state.maintainer.remove_index(content_id);
    Json(serde_json::json!({ "content_id": content_id, "removed": removed }))
}

async fn rebuild_index_handler(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let indexed = state.maintainer.rebuild_index().await?;
    Ok(Json(serde_json::json!({ "indexed_count": indexed })))
}

// ============================================
// Application Setup
// ============================================

fn build_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        // Search
        .route("/api/v1/search", get(search_handler))
        .route("/api/v1/search/suggestions", get(suggestions_handler))
        .route("/api/v1/search/related", get(related_keywords_handler))
        // Keyword analytics
        .route("/api/v1/keywords/hot", get(hot_keywords_handler))
        .route("/api/v1/keywords/stats", get(keyword_stats_handler))
        .route("/api/v1/keywords/clicks", post(record_click_handler))
        .route("/api/v1/keywords/reset", post(reset_period_handler))
        .route("/api/v1/keywords/cleanup", post(cleanup_handler))
        // Recommendations
        .route("/api/v1/recommendations", get(recommendations_handler))
        .route("/api/v1/recommendations/explain", get(explain_handler))
        // Index maintenance
        .route(
            "/api/v1/index/:content_id",
            put(upsert_index_handler).delete(remove_index_handler),
        )
        .route("/api/v1/index/rebuild", post(rebuild_index_handler))
}

fn build_state(config: Config) -> AppState {
    let content = Arc::new(MemoryContentStore::new());
    let categories = Arc::new(MemoryCategoryDirectory::new());
    let users = Arc::new(MemoryUserDirectory::new());
    let interactions = Arc::new(MemoryInteractionLog::new());

    let store = Arc::new(IndexStore::new());
    let maintainer = Arc::new(IndexMaintainer::new(
        store.clone(),
        content,
        categories.clone(),
        users,
        interactions.clone(),
    ));
    let tracker = Arc::new(TrendTracker::new(categories));
    let query = Arc::new(QueryEngine::new(store.clone(), tracker.clone()));
    let recommender = Arc::new(RecommendationEngine::new(store, interactions));

    AppState {
        maintainer,
        query,
        tracker,
        recommender,
        config,
    }
}

// ============================================
// Main Entry Point
// ============================================

#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "discovery_service=debug".into()),
        )
        .init();

    let config = Config::from_env();
    let port = config.service.http_port;
    let service_name = config.service.service_name.clone();

    let state = build_state(config);
    let app = build_router().with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("{} listening on {}", service_name, addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind to {addr}: {e}")))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Config(format!("Server error: {e}")))?;

    Ok(())
}
