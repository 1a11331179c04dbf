//! End-to-end comparison flow over HTTP against a local imagery resolver.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use compare::headless::{BackendCall, HeadlessBackend};
use compare::resolver::TileUrlResponse;
use compare::{
    CameraState, CompareConfig, ComparisonSession, ContainerRect, ContainerRef, HttpTileUrlClient,
    Mode, ResolutionStatus, SessionState,
};
use foundation::geo::LngLat;
use pretty_assertions::assert_eq;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

async fn tile_url(Path(year): Path<String>) -> (StatusCode, Json<TileUrlResponse>) {
    match year.as_str() {
        "2019" => (StatusCode::NOT_FOUND, Json(TileUrlResponse::declined("No imagery for 2019"))),
        "2018" => (StatusCode::OK, Json(TileUrlResponse::found("not a template"))),
        _ => {
            // Older years take longer, so rapid selections can finish out of order.
            let delay = match year.as_str() {
                "2016" => 250,
                "2017" => 10,
                _ => 0,
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            (
                StatusCode::OK,
                Json(TileUrlResponse::found(format!(
                    "https://earthengine.example/v1/maps/{year}/tiles/{{z}}/{{x}}/{{y}}"
                ))),
            )
        }
    }
}

async fn spawn_resolver() -> SocketAddr {
    let app = Router::new().route("/api/tile-url/:year", get(tile_url));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn open_session(addr: SocketAddr) -> ComparisonSession<HeadlessBackend, HttpTileUrlClient> {
    let resolver_url = format!("http://{addr}");
    let config = CompareConfig::from_lookup(|key| match key {
        "TILE_SERVER_URL" => Some(resolver_url.clone()),
        "TILE_RESOLVE_TIMEOUT_MS" => Some("5000".to_string()),
        _ => None,
    });
    assert_eq!(config.resolve_timeout, Duration::from_secs(5));
    let resolver = config.http_resolver().unwrap();
    ComparisonSession::open(
        HeadlessBackend::new(),
        resolver,
        &config,
        ContainerRef::attached("map"),
    )
    .await
    .unwrap()
}

fn template(year: &str) -> String {
    format!("https://earthengine.example/v1/maps/{year}/tiles/{{z}}/{{x}}/{{y}}")
}

#[tokio::test]
async fn compare_pan_reveal_and_exit() {
    let addr = spawn_resolver().await;
    let mut session = open_session(addr).await;
    let tarkwa = CameraState::new(LngLat::new(-1.9956, 5.3018), 12.0);
    session.camera_changed(session.primary(), tarkwa).unwrap();

    session.request_compare();
    let status = session.select_year_and_wait("2024").await.unwrap();
    assert_eq!(status, Some(ResolutionStatus::Applied));
    assert_eq!(session.state(), SessionState::Comparing);
    let secondary = session.secondary().unwrap();
    assert_eq!(session.viewports().camera(secondary).unwrap(), tarkwa);
    assert_eq!(
        session.viewports().imagery(secondary).unwrap().map(|d| d.attribution.clone()),
        Some("© Google Earth Engine - Sentinel-2 2024".to_string())
    );

    let moved = tarkwa.with_bearing(45.0).with_pitch(30.0);
    session.camera_changed(secondary, moved).unwrap();
    assert_eq!(session.viewports().camera(session.primary()).unwrap(), moved);

    assert!(session.begin_reveal_drag());
    let rect = ContainerRect::new(100.0, 800.0);
    assert_eq!(session.move_reveal_drag(100.0 + 960.0, rect).unwrap(), Some(95.0));
    session.end_reveal_drag();
    assert_eq!(
        session.clip_mask().map(|m| m.css_clip_path()),
        Some("inset(0 5% 0 0)".to_string())
    );

    let surface = session.viewports().surface(secondary).unwrap().id;
    assert!(session.exit_compare().unwrap());
    assert!(!session.exit_compare().unwrap());
    assert_eq!(session.mode(), Mode::Single);
    assert_eq!(session.reveal_fraction(), 50.0);
    assert_eq!(session.viewports().backend().releases(surface), 1);
}

#[tokio::test]
async fn declined_year_mounts_nothing() {
    let addr = spawn_resolver().await;
    let mut session = open_session(addr).await;
    session.request_compare();

    let status = session.select_year_and_wait("2019").await.unwrap();
    assert!(matches!(status, Some(ResolutionStatus::Failed(_))));
    assert_eq!(session.state(), SessionState::PickingYear);
    assert_eq!(session.notice(), Some("imagery for 2019 unavailable: No imagery for 2019"));
    assert_eq!(
        session
            .viewports()
            .backend()
            .count(|c| matches!(c, BackendCall::Create { .. })),
        1
    );
}

#[tokio::test]
async fn unusable_template_is_reported() {
    let addr = spawn_resolver().await;
    let mut session = open_session(addr).await;
    session.request_compare();
    let status = session.select_year_and_wait("2018").await.unwrap();
    assert!(matches!(status, Some(ResolutionStatus::Failed(_))));
    assert_eq!(session.state(), SessionState::PickingYear);
    assert!(session.tile_source().is_none());
}

#[tokio::test]
async fn unreachable_resolver_returns_to_the_picker() {
    // Bind then drop to get a port nothing listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let mut session = open_session(addr).await;
    session.request_compare();
    let status = session.select_year_and_wait("2024").await.unwrap();
    assert!(matches!(status, Some(ResolutionStatus::Failed(_))));
    assert_eq!(session.state(), SessionState::PickingYear);
}

/// Drives both requests concurrently and applies outcomes in arrival order.
async fn race(first: &str, second: &str) -> ComparisonSession<HeadlessBackend, HttpTileUrlClient> {
    let addr = spawn_resolver().await;
    let mut session = open_session(addr).await;
    session.request_compare();

    let (tx, mut rx) = mpsc::channel(2);
    for year in [first, second] {
        let pending = session.select_year(year).unwrap();
        let tx = tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(pending.run().await).await;
        });
    }
    drop(tx);

    let mut statuses = Vec::new();
    while let Some(outcome) = rx.recv().await {
        statuses.push((outcome.ticket.year.clone(), session.apply_resolution(outcome).await.unwrap()));
    }
    let applied: Vec<_> = statuses
        .iter()
        .filter(|(_, s)| *s == ResolutionStatus::Applied)
        .map(|(y, _)| y.clone())
        .collect();
    assert_eq!(applied, vec![second.to_string()]);
    session
}

#[tokio::test]
async fn latest_selection_wins_when_it_finishes_last() {
    // 2016 is the slow one, so the superseded 2017 response lands first.
    let session = race("2017", "2016").await;
    assert_eq!(session.selected_year(), Some("2016"));
    assert_eq!(
        session.tile_source().map(|d| d.url_template.clone()),
        Some(template("2016"))
    );
}

#[tokio::test]
async fn latest_selection_wins_when_it_finishes_first() {
    let session = race("2016", "2017").await;
    assert_eq!(session.state(), SessionState::Comparing);
    assert_eq!(session.selected_year(), Some("2017"));
    let stale = session.viewports().backend().count(|c| {
        matches!(c, BackendCall::AddImagery { url_template, .. } if url_template.contains("/2016/"))
    });
    assert_eq!(stale, 0);
}
