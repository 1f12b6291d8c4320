use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use shuttle_axum::axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::analyze::{AnalysisResult, SentimentEngine};
use crate::corrections::CorrectionRecord;
use crate::export::{self, ExportInput};
use crate::ingest::{self, types::Article};
use crate::pipeline::{self, AnalysisSnapshot};
use crate::refresh::{lock, RefreshCoordinator, RefreshOutcome};
use crate::themes::Theme;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<RefreshCoordinator>,
    /// Configured feed URLs (reported in exports).
    pub feeds: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(coordinator: Arc<RefreshCoordinator>, feeds: Vec<String>) -> Self {
        Self {
            coordinator,
            feeds: Arc::new(feeds),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/analyze", post(analyze))
        .route("/api/aggregate", post(aggregate))
        .route("/api/articles", get(articles))
        .route("/api/refresh", post(refresh))
        .route("/api/themes", get(themes).post(add_theme))
        .route("/api/themes/{id}", delete(remove_theme))
        .route("/api/sentiment/stats", get(sentiment_stats))
        .route("/api/sentiment/learn", post(sentiment_learn))
        .route("/api/sentiment/reset", post(sentiment_reset))
        .route("/api/corrections", post(corrections))
        .route("/api/export/json", get(export_json))
        .route("/api/export/csv", get(export_csv))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// `{ "success": false, "error": .. }` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(err: anyhow::Error) -> Self {
        warn!(target: "api", error = %format!("{err:#}"), "request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "success": false, "error": self.message })),
        )
            .into_response()
    }
}

fn parse_body<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::bad_request(format!("invalid body: {e}")))
}

fn engine_of(state: &AppState) -> std::sync::MutexGuard<'_, SentimentEngine> {
    lock(state.coordinator.engine())
}

async fn ensure_loaded(state: &AppState) {
    if state.coordinator.last_update().is_none() {
        state.coordinator.try_refresh().await;
    }
}

#[derive(Deserialize)]
struct AnalyzeReq {
    #[serde(default)]
    text: Option<String>,
}

async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let req: AnalyzeReq = parse_body(body)?;
    let text = req
        .text
        .ok_or_else(|| ApiError::bad_request("text is required"))?;
    let result = engine_of(&state).analyze(text.as_str());
    Ok(Json(result))
}

#[derive(Deserialize)]
struct AggregateReq {
    articles: Vec<Article>,
    /// Falls back to the configured themes.
    #[serde(default)]
    themes: Option<Vec<Theme>>,
}

async fn aggregate(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<AnalysisSnapshot>, ApiError> {
    let req: AggregateReq = parse_body(body)?;
    let themes = req.themes.unwrap_or_else(|| state.coordinator.themes());
    let (articles, _) = ingest::prepare_articles(req.articles, state.coordinator.content_max_chars());
    let previous = state.coordinator.history().latest();

    let run = {
        let mut engine = engine_of(&state);
        pipeline::aggregate(&mut engine, &articles, &themes, previous.as_ref())
    };
    info!(target: "api", articles = run.snapshot.total_articles, "ad-hoc aggregation");
    Ok(Json(run.snapshot))
}

async fn articles(State(state): State<AppState>) -> Json<Value> {
    ensure_loaded(&state).await;
    let st = state.coordinator.state();
    Json(json!({
        "articles": st.articles,
        "analysis": st.analysis,
        "lastUpdate": st.last_update,
        "isUpdating": state.coordinator.is_updating(),
        "iaCorrections": state.coordinator.corrections(),
    }))
}

async fn refresh(State(state): State<AppState>) -> Json<Value> {
    let outcome = state.coordinator.try_refresh().await;
    Json(json!({
        "success": true,
        "skipped": outcome == RefreshOutcome::Skipped,
        "lastUpdate": state.coordinator.last_update(),
    }))
}

async fn themes(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "success": true, "themes": state.coordinator.themes() }))
}

/// Keywords as a list or as one comma-separated string.
#[derive(Deserialize)]
#[serde(untagged)]
enum KeywordsInput {
    List(Vec<String>),
    Csv(String),
}

impl KeywordsInput {
    fn into_vec(self) -> Vec<String> {
        match self {
            KeywordsInput::List(v) => v,
            KeywordsInput::Csv(s) => s.split(',').map(str::to_string).collect(),
        }
    }
}

#[derive(Deserialize)]
struct NewThemeReq {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    keywords: Option<KeywordsInput>,
    #[serde(default)]
    color: Option<String>,
}

async fn add_theme(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let req: NewThemeReq = parse_body(body)?;
    let (Some(name), Some(keywords)) = (req.name.filter(|n| !n.trim().is_empty()), req.keywords) else {
        return Err(ApiError::bad_request("name and keywords are required"));
    };
    let theme = Theme {
        id: None,
        name,
        keywords: keywords.into_vec(),
        color: req.color.filter(|c| !c.trim().is_empty()),
    };
    let added = state
        .coordinator
        .add_theme(theme)
        .await
        .map_err(|e| ApiError::bad_request(format!("{e:#}")))?;
    Ok(Json(json!({ "success": true, "theme": added })))
}

async fn remove_theme(State(state): State<AppState>, Path(id): Path<String>) -> Json<Value> {
    let removed = state.coordinator.remove_theme(&id).await;
    Json(json!({ "success": true, "removed": removed }))
}

async fn sentiment_stats(State(state): State<AppState>) -> Json<Value> {
    let engine = engine_of(&state);
    Json(json!({
        "success": true,
        "learningStats": engine.learning_stats(),
        "lexiconInfo": { "totalWords": engine.lexicon().len() },
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LearnReq {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    expected_score: Option<f64>,
}

async fn sentiment_learn(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let req: LearnReq = parse_body(body)?;
    let (Some(text), Some(expected)) = (
        req.text.filter(|t| !t.trim().is_empty()),
        req.expected_score.filter(|s| s.is_finite()),
    ) else {
        return Err(ApiError::bad_request("text and expectedScore are required"));
    };

    let mut engine = engine_of(&state);
    let outcome = engine.learn_from_correction(&text, expected);
    Ok(Json(json!({
        "success": true,
        "correction": outcome,
        "learningStats": engine.learning_stats(),
    })))
}

async fn sentiment_reset(State(state): State<AppState>) -> Json<Value> {
    let mut engine = engine_of(&state);
    engine.reset();
    Json(json!({ "success": true, "learningStats": engine.learning_stats() }))
}

async fn corrections(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let records: Vec<CorrectionRecord> = parse_body(body)?;
    let received = records.len();
    let applied = state.coordinator.apply_corrections(records);
    Ok(Json(json!({ "success": true, "received": received, "applied": applied })))
}

async fn export_json(State(state): State<AppState>) -> Result<Response, ApiError> {
    ensure_loaded(&state).await;
    let st = state.coordinator.state();
    let themes = state.coordinator.themes();
    let (learning_stats, lexicon) = {
        let engine = engine_of(&state);
        (engine.learning_stats(), engine.lexicon().to_document())
    };
    let body = export::json_export(
        ExportInput {
            state: &st,
            feeds: &state.feeds,
            themes: &themes,
            learning_stats,
            corrections: state.coordinator.corrections(),
            lexicon,
        },
        Utc::now(),
    )
    .map_err(ApiError::internal)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"theme-sentiment-export.json\"",
            ),
        ],
        body,
    )
        .into_response())
}

async fn export_csv(State(state): State<AppState>) -> Result<Response, ApiError> {
    ensure_loaded(&state).await;
    let body = export::csv_export(&state.coordinator.state()).map_err(ApiError::internal)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"theme-sentiment-export.csv\"",
            ),
        ],
        body,
    )
        .into_response())
}
