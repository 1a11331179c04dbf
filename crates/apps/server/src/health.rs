//! `GET /api/health`: aggregated status for uptime monitors.

use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use detections::iso_timestamp;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::STALE_AFTER_HOURS;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub status: CheckStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<String>,
}

impl ServiceStatus {
    fn new(status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            last_checked: None,
        }
    }

    fn checked_at(mut self, when: impl Into<String>) -> Self {
        self.last_checked = Some(when.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Services {
    pub detection_data: ServiceStatus,
    pub tile_server: ServiceStatus,
    pub last_detection_run: ServiceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: OverallStatus,
    pub timestamp: String,
    pub services: Services,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSummary {
    pub status: OverallStatus,
    pub timestamp: String,
}

impl Services {
    pub fn overall(&self) -> OverallStatus {
        let all = [
            &self.detection_data,
            &self.tile_server,
            &self.last_detection_run,
        ];
        if all.iter().any(|s| s.status == CheckStatus::Error) {
            OverallStatus::Unhealthy
        } else if all.iter().any(|s| s.status == CheckStatus::Warning) {
            OverallStatus::Degraded
        } else {
            OverallStatus::Healthy
        }
    }
}

fn age_hours(since: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - since).num_milliseconds() as f64 / 3_600_000.0
}

fn age_days(hours: f64) -> i64 {
    (hours / 24.0).round() as i64
}

pub fn data_freshness(modified: DateTime<Utc>, now: DateTime<Utc>) -> ServiceStatus {
    let hours = age_hours(modified, now);
    let status = if hours > STALE_AFTER_HOURS as f64 {
        ServiceStatus::new(
            CheckStatus::Warning,
            format!("Detection data is {} days old", age_days(hours)),
        )
    } else {
        ServiceStatus::new(CheckStatus::Ok, "Detection data available")
    };
    status.checked_at(iso_timestamp(modified))
}

/// Freshness of the first detection file that exists.
pub async fn check_detection_data(sources: &[PathBuf], now: DateTime<Utc>) -> ServiceStatus {
    for path in sources {
        let modified = match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(t) => DateTime::<Utc>::from(t),
            Err(err) => {
                debug!("health: {path:?} unavailable: {err}");
                continue;
            }
        };
        return data_freshness(modified, now);
    }
    ServiceStatus::new(CheckStatus::Error, "No detection data found")
}

/// An unreachable tile server only degrades the service; the dashboard still
/// works without historical imagery.
pub async fn check_tile_server(
    http: &reqwest::Client,
    base_url: &str,
    timeout: Duration,
    production: bool,
) -> ServiceStatus {
    let url = format!("{}/health", base_url.trim_end_matches('/'));
    match http.get(&url).timeout(timeout).send().await {
        Ok(resp) if resp.status().is_success() => {
            ServiceStatus::new(CheckStatus::Ok, "Tile server is running")
        }
        Ok(resp) => ServiceStatus::new(
            CheckStatus::Warning,
            format!("Tile server returned {}", resp.status().as_u16()),
        ),
        Err(err) => {
            debug!("health: tile server {url} unreachable: {err}");
            if production {
                ServiceStatus::new(CheckStatus::Warning, "Tile server check skipped in production")
            } else {
                ServiceStatus::new(
                    CheckStatus::Warning,
                    "Tile server not reachable (may be expected in some environments)",
                )
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RunMetadata {
    last_run: String,
}

pub fn last_run_status(last_run: &str, now: DateTime<Utc>) -> ServiceStatus {
    let Ok(parsed) = DateTime::parse_from_rfc3339(last_run) else {
        return ServiceStatus::new(
            CheckStatus::Warning,
            format!("Detection run metadata has an unreadable last_run `{last_run}`"),
        );
    };
    let hours = age_hours(parsed.with_timezone(&Utc), now);
    let status = if hours > STALE_AFTER_HOURS as f64 {
        ServiceStatus::new(
            CheckStatus::Warning,
            format!("Last detection run was {} days ago", age_days(hours)),
        )
    } else {
        ServiceStatus::new(CheckStatus::Ok, format!("Last run: {last_run}"))
    };
    status.checked_at(last_run)
}

pub async fn check_last_detection_run(metadata: &Path, now: DateTime<Utc>) -> ServiceStatus {
    let meta = match tokio::fs::read_to_string(metadata).await {
        Ok(text) => serde_json::from_str::<RunMetadata>(&text).ok(),
        Err(_) => None,
    };
    match meta {
        Some(meta) => last_run_status(&meta.last_run, now),
        None => ServiceStatus::new(CheckStatus::Warning, "No detection run metadata found"),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HealthParams {
    pub verbose: Option<String>,
}

pub async fn collect(state: &AppState, now: DateTime<Utc>) -> HealthReport {
    let cfg = &state.config;
    let sources = cfg.detection_sources();
    let metadata = cfg.metadata_path();
    let (detection_data, tile_server, last_detection_run) = tokio::join!(
        check_detection_data(&sources, now),
        check_tile_server(
            &state.http,
            &cfg.tile_server_url,
            cfg.tile_server_timeout,
            cfg.production
        ),
        check_last_detection_run(&metadata, now),
    );
    let services = Services {
        detection_data,
        tile_server,
        last_detection_run,
    };
    HealthReport {
        status: services.overall(),
        timestamp: iso_timestamp(now),
        services,
        version: cfg.app_version.clone(),
    }
}

pub async fn get_health(
    State(state): State<AppState>,
    Query(params): Query<HealthParams>,
) -> Response {
    let report = collect(&state, Utc::now()).await;
    if params.verbose.as_deref() == Some("true") {
        return Json(report).into_response();
    }
    Json(HealthSummary {
        status: report.status,
        timestamp: report.timestamp,
    })
    .into_response()
}
