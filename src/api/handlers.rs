use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    models::{CatalogTitle, ChatAction, HistoryEntry, MediaType, RecommendationRequest, WatchProviders},
    services::{
        bingo::{Board, Line},
        chat::ChatSession,
    },
};

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default)]
    pub media_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegionQuery {
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegionResponse {
    pub region: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetBingoRequest {
    #[serde(default)]
    pub media_type: Option<MediaType>,
}

#[derive(Debug, Serialize)]
pub struct BingoResponse {
    #[serde(flatten)]
    pub board: Board,
    pub lines: Vec<Line>,
}

impl From<Board> for BingoResponse {
    fn from(board: Board) -> Self {
        Self {
            lines: board.lines(),
            board,
        }
    }
}

fn parse_media_type(value: &str) -> AppResult<MediaType> {
    value.parse().map_err(AppError::InvalidInput)
}

/// Health check
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

// Recommendations

pub async fn create_recommendation(
    State(state): State<AppState>,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<(StatusCode, Json<HistoryEntry>)> {
    let entry = state.recommendations.recommend(request).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn list_recommendations(State(state): State<AppState>) -> Json<Vec<HistoryEntry>> {
    Json(state.recommendations.store().list().await)
}

pub async fn clear_recommendations(State(state): State<AppState>) -> StatusCode {
    state.recommendations.store().clear().await;
    StatusCode::NO_CONTENT
}

pub async fn delete_recommendation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    if state.recommendations.store().remove(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Recommendation {}", id)))
    }
}

// Guided chat

pub async fn create_chat_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<ChatSession>) {
    (StatusCode::CREATED, Json(state.chat.create().await))
}

pub async fn get_chat_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ChatSession>> {
    Ok(Json(state.chat.get(&id).await?))
}

pub async fn chat_action(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(action): Json<ChatAction>,
) -> AppResult<Json<ChatSession>> {
    Ok(Json(state.chat.act(&id, action).await?))
}

pub async fn reset_chat_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ChatSession>> {
    Ok(Json(state.chat.reset(&id).await?))
}

// Browsing

pub async fn trending(
    State(state): State<AppState>,
    Path(media_type): Path<String>,
) -> AppResult<Json<Vec<CatalogTitle>>> {
    let media_type = parse_media_type(&media_type)?;
    Ok(Json(state.browse.trending(media_type).await?))
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<Vec<CatalogTitle>>> {
    let media_type = match params.media_type.as_deref() {
        Some(value) => parse_media_type(value)?,
        None => MediaType::Movie,
    };
    Ok(Json(state.browse.search(&params.q, media_type).await?))
}

pub async fn search_history(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.browse.history().list().await)
}

pub async fn clear_search_history(State(state): State<AppState>) -> StatusCode {
    state.browse.history().clear().await;
    StatusCode::NO_CONTENT
}

/// Watch providers in the requested region, or the caller's detected region
pub async fn watch_providers(
    State(state): State<AppState>,
    Path((media_type, id)): Path<(String, u64)>,
    Query(params): Query<RegionQuery>,
) -> AppResult<Json<WatchProviders>> {
    let media_type = parse_media_type(&media_type)?;
    let region = match params.region {
        Some(region) => region,
        None => state.region.region().await,
    };
    Ok(Json(state.browse.watch_providers(id, media_type, &region).await?))
}

pub async fn region(State(state): State<AppState>) -> Json<RegionResponse> {
    Json(RegionResponse {
        region: state.region.region().await,
    })
}

// Bingo

pub async fn get_bingo(State(state): State<AppState>) -> Json<BingoResponse> {
    Json(state.bingo.board().await.into())
}

pub async fn toggle_bingo_square(
    State(state): State<AppState>,
    Path(id): Path<u8>,
) -> AppResult<Json<BingoResponse>> {
    Ok(Json(state.bingo.toggle(id).await?.into()))
}

pub async fn reset_bingo(
    State(state): State<AppState>,
    request: Option<Json<ResetBingoRequest>>,
) -> Json<BingoResponse> {
    let media_type = request.and_then(|Json(r)| r.media_type);
    Json(state.bingo.reset(media_type).await.into())
}
