use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Data older than this is reported as stale by the health check.
pub const STALE_AFTER_HOURS: i64 = 168;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Directory holding `data/latest_detections.geojson` and friends.
    pub data_root: PathBuf,
    pub tile_server_url: String,
    pub tile_server_timeout: Duration,
    pub app_version: String,
    pub production: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            data_root: PathBuf::from("public"),
            tile_server_url: "http://localhost:5001".to_string(),
            tile_server_timeout: Duration::from_secs(5),
            app_version: "1.0.0".to_string(),
            production: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let addr = match lookup("MINEWATCH_ADDR") {
            Some(raw) => raw.trim().parse::<SocketAddr>().unwrap_or_else(|err| {
                warn!("invalid MINEWATCH_ADDR {raw:?} ({err}); using {}", defaults.addr);
                defaults.addr
            }),
            None => defaults.addr,
        };

        Self {
            addr,
            data_root: lookup("MINEWATCH_DATA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_root),
            tile_server_url: lookup("TILE_SERVER_URL").unwrap_or(defaults.tile_server_url),
            tile_server_timeout: Duration::from_millis(var_u64(
                &lookup,
                "TILE_SERVER_HEALTH_TIMEOUT_MS",
                defaults.tile_server_timeout.as_millis() as u64,
            )),
            app_version: lookup("APP_VERSION").unwrap_or(defaults.app_version),
            production: var_bool(&lookup, "MINEWATCH_PRODUCTION", defaults.production),
        }
    }

    pub fn detections_path(&self) -> PathBuf {
        self.data_root.join("data").join("latest_detections.geojson")
    }

    /// Output of the original Tarkwa survey, served when no pipeline run
    /// has published data yet.
    pub fn legacy_detections_path(&self) -> PathBuf {
        self.data_root.join("ghana_tarkwa_mining_wgs84.geojson")
    }

    pub fn detection_sources(&self) -> [PathBuf; 2] {
        [self.detections_path(), self.legacy_detections_path()]
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.data_root.join("data").join("detection_metadata.json")
    }
}

fn var_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn var_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match lookup(key) {
        Some(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        None => default,
    }
}
