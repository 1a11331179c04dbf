use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use detections::{
    DashboardStats, Detection, DetectionCollection, DEFAULT_PROBABILITY_FILTER,
    DETECTION_LIST_LIMIT,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::error;

use crate::data::load_detections;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DetectionParams {
    pub min_probability: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    pub min_probability: Option<f64>,
    pub limit: Option<usize>,
}

/// Stats panel counts plus the ranked detection list, under one filter.
#[derive(Debug, Serialize)]
pub struct DashboardView<'a> {
    pub min_probability: f64,
    pub stats: DashboardStats,
    pub detections: Vec<&'a Detection>,
}

fn check_probability(min: Option<f64>) -> Result<(), (StatusCode, Json<Value>)> {
    match min {
        Some(min) if !(0.0..=1.0).contains(&min) => Err(api_error(
            StatusCode::BAD_REQUEST,
            "min_probability must be within [0, 1]",
        )),
        _ => Ok(()),
    }
}

async fn load(state: &AppState) -> Result<DetectionCollection, (StatusCode, Json<Value>)> {
    load_detections(&state.config.detection_sources())
        .await
        .map_err(|err| {
            error!("detections unavailable: {err}");
            api_error(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        })
}

fn api_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message.into() })))
}

pub async fn get_detections(
    State(state): State<AppState>,
    Query(params): Query<DetectionParams>,
) -> Result<Json<DetectionCollection>, (StatusCode, Json<Value>)> {
    check_probability(params.min_probability)?;
    let collection = load(&state).await?;

    Ok(Json(match params.min_probability {
        Some(min) => collection.filtered(min),
        None => collection,
    }))
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    check_probability(params.min_probability)?;
    let min_probability = params.min_probability.unwrap_or(DEFAULT_PROBABILITY_FILTER);
    let limit = params.limit.unwrap_or(DETECTION_LIST_LIMIT);
    let collection = load(&state).await?;

    let view = DashboardView {
        min_probability,
        stats: DashboardStats::compute(&collection, min_probability),
        detections: collection.ranked(min_probability, limit),
    };
    serde_json::to_value(&view).map(Json).map_err(|err| {
        error!("dashboard serialization failed: {err}");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    })
}
