use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use detections::{alerts_csv, csv_filename, AlertQuery, AlertReport, NaimosReport, ReportFormat};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::data::load_detections;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AlertParams {
    pub period: Option<String>,
    pub format: Option<String>,
    pub severity: Option<String>,
}

impl AlertParams {
    fn to_query(&self) -> AlertQuery {
        AlertQuery::parse(
            self.period.as_deref(),
            self.format.as_deref(),
            self.severity.as_deref(),
        )
    }
}

pub async fn get_alerts(
    State(state): State<AppState>,
    Query(params): Query<AlertParams>,
) -> Response {
    let query = params.to_query();
    let collection = match load_detections(&state.config.detection_sources()).await {
        Ok(c) => c,
        Err(err) => {
            error!("Error generating alerts: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to generate alerts", "message": err.to_string() })),
            )
                .into_response();
        }
    };

    let sites = query.select(&collection);
    let now = Utc::now();
    match query.format {
        ReportFormat::Naimos => Json(NaimosReport::build(&query.period, &sites, now)).into_response(),
        ReportFormat::Json => Json(AlertReport::build(&query.period, &sites, now)).into_response(),
        ReportFormat::Csv => {
            let mut headers = HeaderMap::new();
            headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_static("text/csv"));
            let disposition = format!("attachment; filename={}", csv_filename(&query.period, now));
            match HeaderValue::from_str(&disposition) {
                Ok(value) => {
                    headers.insert(http::header::CONTENT_DISPOSITION, value);
                }
                Err(_) => {
                    // Period comes from the query string and may not be header-safe.
                    headers.insert(
                        http::header::CONTENT_DISPOSITION,
                        HeaderValue::from_static("attachment; filename=minewatch_alerts.csv"),
                    );
                }
            }
            (StatusCode::OK, headers, alerts_csv(&sites, now)).into_response()
        }
    }
}
