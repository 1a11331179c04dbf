use std::sync::Arc;

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod alerts;
mod config;
mod data;
mod detections_api;
mod health;

use config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub http: reqwest::Client,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::from_env();
    let addr = config.addr;
    info!(
        "data root {:?}, tile server {}",
        config.data_root, config.tile_server_url
    );

    let state = AppState {
        config: Arc::new(config),
        http: reqwest::Client::new(),
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(err) => {
            error!("failed to bind {addr}: {err}");
            std::process::exit(1);
        }
    };
    info!("minewatch server listening on http://{addr}");
    if let Err(err) = axum::serve(listener, router(state)).await {
        error!("server error: {err}");
        std::process::exit(1);
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::OPTIONS]);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/health", get(health::get_health))
        .route("/api/alerts", get(alerts::get_alerts))
        .route("/api/detections", get(detections_api::get_detections))
        .route("/api/dashboard", get(detections_api::get_dashboard))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> Response {
    (StatusCode::OK, "ok").into_response()
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::Value;

    use super::{router, AppState};
    use crate::config::ServerConfig;

    const LATEST: &str = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","properties":{"lat":5.3,"lon":-1.99,"probability":0.97,"region":"Western"}},
        {"type":"Feature","properties":{"lat":5.2,"lon":-2.05,"probability":0.86,"is_licensed":true}},
        {"type":"Feature","properties":{"lat":5.1,"lon":-2.10,"probability":0.52,"previous_detection":true}}
    ]}"#;

    async fn serve(data_root: &Path) -> SocketAddr {
        let closed = {
            let l = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap()
        };
        let config = ServerConfig {
            data_root: data_root.to_path_buf(),
            tile_server_url: format!("http://{closed}"),
            tile_server_timeout: Duration::from_millis(500),
            ..ServerConfig::default()
        };
        let state = AppState {
            config: Arc::new(config),
            http: reqwest::Client::new(),
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        addr
    }

    fn seed(root: &Path) {
        std::fs::create_dir_all(root.join("data")).unwrap();
        std::fs::write(root.join("data/latest_detections.geojson"), LATEST).unwrap();
    }

    #[tokio::test]
    async fn alerts_in_every_format() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let addr = serve(dir.path()).await;
        let http = reqwest::Client::new();

        let json: Value = http
            .get(format!("http://{addr}/api/alerts?severity=high"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(json["period"], "weekly");
        assert_eq!(json["alerts"].as_array().unwrap().len(), 2);
        assert_eq!(json["stats"]["regions_affected"], serde_json::json!(["Western"]));

        let resp = http
            .get(format!("http://{addr}/api/alerts?format=csv&period=daily"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.headers()["content-type"], "text/csv");
        let disposition = resp.headers()["content-disposition"].to_str().unwrap().to_string();
        assert!(disposition.starts_with("attachment; filename=minewatch_alerts_daily_"));
        let body = resp.text().await.unwrap();
        assert_eq!(body.lines().count(), 4);

        let naimos: Value = http
            .get(format!("http://{addr}/api/alerts?format=naimos"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(naimos["report_type"], "ILLEGAL_MINING_ALERT");
        assert_eq!(naimos["summary"]["critical_alerts"], 1);
        assert_eq!(naimos["sites"][1]["license_status"], "LICENSED");
    }

    #[tokio::test]
    async fn alerts_without_data_fail_with_500() {
        let dir = tempfile::tempdir().unwrap();
        let addr = serve(dir.path()).await;
        let resp = reqwest::get(format!("http://{addr}/api/alerts")).await.unwrap();
        assert_eq!(resp.status().as_u16(), 500);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Failed to generate alerts");
        assert!(body["message"].as_str().is_some());
    }

    #[tokio::test]
    async fn health_summary_and_breakdown() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let addr = serve(dir.path()).await;

        let summary: Value = reqwest::get(format!("http://{addr}/api/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        // tile server is down and no run metadata exists
        assert_eq!(summary["status"], "degraded");
        assert!(summary.get("services").is_none());

        let full: Value = reqwest::get(format!("http://{addr}/api/health?verbose=true"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(full["version"], "1.0.0");
        assert_eq!(full["services"]["detection_data"]["status"], "ok");
        assert_eq!(full["services"]["tile_server"]["status"], "warning");
        assert_eq!(
            full["services"]["last_detection_run"]["message"],
            "No detection run metadata found"
        );
    }

    #[tokio::test]
    async fn detections_filtered_by_probability() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let addr = serve(dir.path()).await;

        let all: Value = reqwest::get(format!("http://{addr}/api/detections"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(all["features"].as_array().unwrap().len(), 3);

        let strong: Value = reqwest::get(format!("http://{addr}/api/detections?min_probability=0.9"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(strong["features"].as_array().unwrap().len(), 1);

        let bad = reqwest::get(format!("http://{addr}/api/detections?min_probability=2"))
            .await
            .unwrap();
        assert_eq!(bad.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn dashboard_counts_and_ranks_under_one_filter() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let addr = serve(dir.path()).await;

        let view: Value = reqwest::get(format!("http://{addr}/api/dashboard"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(view["min_probability"], 0.5);
        assert_eq!(view["stats"]["total"], 3);
        assert_eq!(view["stats"]["high_confidence"], 1);
        assert_eq!(view["stats"]["medium_confidence"], 1);
        assert_eq!(view["stats"]["low_confidence"], 1);
        let probabilities: Vec<f64> = view["detections"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["properties"]["probability"].as_f64().unwrap())
            .collect();
        assert_eq!(probabilities, vec![0.97, 0.86, 0.52]);

        let top: Value = reqwest::get(format!("http://{addr}/api/dashboard?min_probability=0.8&limit=1"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(top["stats"]["total"], 2);
        assert_eq!(top["detections"].as_array().unwrap().len(), 1);
        assert_eq!(top["detections"][0]["properties"]["region"], "Western");

        let bad = reqwest::get(format!("http://{addr}/api/dashboard?min_probability=-0.1"))
            .await
            .unwrap();
        assert_eq!(bad.status().as_u16(), 400);
    }
}
