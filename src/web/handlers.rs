use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{ApiResponse, AppState, HttpError};
use crate::AppError;
use crate::models::{ChangeEvent, NewPriceRecord, PriceRecord, UpdatePriceRecord};
use crate::scheduler::{SchedulerStats, StartOutcome};

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ListParams {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub started: bool,
    pub outcome: StartOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub start_url: String,
    pub subscribers: usize,
    pub records: i64,
    pub scheduler: SchedulerStats,
}

fn price_not_found(id: i64) -> AppError {
    AppError::not_found(format!("Price {}", id))
}

pub async fn list_prices(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ApiResponse<Vec<PriceRecord>>>, HttpError> {
    let offset = params.offset.unwrap_or(0);
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);

    if offset < 0 {
        return Err(HttpError::bad_request("Offset must not be negative"));
    }
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(HttpError::bad_request(format!("Limit must be between 1 and {}", MAX_LIMIT)));
    }

    let records = state.store.list(offset, limit).await?;
    let total = state.store.count().await?;
    tracing::debug!(offset, limit, returned = records.len(), "Listed prices");

    let meta = serde_json::json!({ "offset": offset, "limit": limit, "total": total });
    Ok(Json(ApiResponse::success_with_meta(records, meta)))
}

pub async fn get_price(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<PriceRecord>>, HttpError> {
    let record = state.store.get(id).await?.ok_or_else(|| price_not_found(id))?;
    Ok(Json(ApiResponse::success(record)))
}

pub async fn create_price(
    State(state): State<AppState>,
    Json(request): Json<NewPriceRecord>,
) -> Result<(StatusCode, Json<ApiResponse<PriceRecord>>), HttpError> {
    request.validate().map_err(AppError::from)?;

    let record = state.store.create(&request).await?;
    tracing::info!(id = record.id, name = %record.name, cost = record.cost, "Created price");
    state.hub.broadcast(&ChangeEvent::created(&record)).await;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(record))))
}

pub async fn update_price(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<UpdatePriceRecord>,
) -> Result<Json<ApiResponse<PriceRecord>>, HttpError> {
    update.validate().map_err(AppError::from)?;
    if update.is_empty() {
        return Err(HttpError::bad_request("Nothing to update"));
    }

    let record = state.store.update(id, &update).await?.ok_or_else(|| price_not_found(id))?;
    tracing::info!(id = record.id, name = %record.name, cost = record.cost, "Updated price");
    state.hub.broadcast(&ChangeEvent::updated(&record)).await;
    Ok(Json(ApiResponse::success(record)))
}

pub async fn delete_price(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<PriceRecord>>, HttpError> {
    let record = state.store.delete(id).await?.ok_or_else(|| price_not_found(id))?;
    tracing::info!(id = record.id, "Deleted price");
    state.hub.broadcast(&ChangeEvent::deleted(&record)).await;
    Ok(Json(ApiResponse::success(record)))
}

/// Fire-and-forget start of the background pipeline.
pub async fn start_pipeline(State(state): State<AppState>) -> Json<ApiResponse<StartResponse>> {
    let outcome = state.scheduler.ensure_running().await;
    Json(ApiResponse::success(StartResponse {
        started: outcome == StartOutcome::Started,
        outcome,
    }))
}

pub async fn pipeline_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PipelineStatus>>, HttpError> {
    let status = PipelineStatus {
        start_url: state.config.scraper.start_url.clone(),
        subscribers: state.hub.subscriber_count().await,
        records: state.store.count().await?,
        scheduler: state.scheduler.stats().await,
    };
    Ok(Json(ApiResponse::success(status)))
}
