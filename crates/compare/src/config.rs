use std::env;
use std::time::Duration;

use foundation::geo::LngLat;

use crate::camera::{CameraState, ZoomRange};
use crate::error::TransportError;
use crate::resolver::{HistoricalSourceResolver, HttpTileUrlClient, SUPPORTED_YEARS};

/// Settings for a comparison session, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct CompareConfig {
    /// Base URL of the imagery resolver (`{base}/api/tile-url/{year}`).
    pub resolver_url: String,
    pub resolve_timeout: Duration,
    pub supported_years: Vec<String>,
    pub primary_zoom: ZoomRange,
    pub historical_zoom: ZoomRange,
    pub initial_camera: CameraState,
    /// Element the historical viewport mounts into.
    pub historical_container: String,
    /// Caption year for the present-day imagery.
    pub current_year: String,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            resolver_url: "http://localhost:5001".to_string(),
            resolve_timeout: Duration::from_secs(10),
            supported_years: SUPPORTED_YEARS.iter().map(|y| y.to_string()).collect(),
            primary_zoom: ZoomRange::new(1.5, 19.0),
            historical_zoom: ZoomRange::new(1.5, 18.0),
            initial_camera: CameraState::new(LngLat::new(0.0, 20.0), 2.0),
            historical_container: "compare-map".to_string(),
            current_year: "2026".to_string(),
        }
    }
}

impl CompareConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset or unparsable values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let supported_years = lookup("TILE_YEARS")
            .map(|v| parse_years(&v))
            .filter(|years| !years.is_empty())
            .unwrap_or(defaults.supported_years);

        Self {
            resolver_url: lookup("TILE_SERVER_URL").unwrap_or(defaults.resolver_url),
            resolve_timeout: Duration::from_millis(var_u64(
                &lookup,
                "TILE_RESOLVE_TIMEOUT_MS",
                defaults.resolve_timeout.as_millis() as u64,
            )),
            supported_years,
            primary_zoom: defaults.primary_zoom,
            historical_zoom: defaults.historical_zoom,
            initial_camera: CameraState::new(
                LngLat::new(
                    var_f64(&lookup, "MAP_CENTER_LON", defaults.initial_camera.center.lon),
                    var_f64(&lookup, "MAP_CENTER_LAT", defaults.initial_camera.center.lat),
                ),
                var_f64(&lookup, "MAP_ZOOM", defaults.initial_camera.zoom),
            ),
            historical_container: lookup("COMPARE_CONTAINER")
                .unwrap_or(defaults.historical_container),
            current_year: lookup("CURRENT_IMAGERY_YEAR").unwrap_or(defaults.current_year),
        }
    }

    pub fn http_resolver(&self) -> Result<HistoricalSourceResolver<HttpTileUrlClient>, TransportError> {
        let client = HttpTileUrlClient::new(self.resolver_url.clone(), self.resolve_timeout)?;
        Ok(HistoricalSourceResolver::new(client)
            .with_supported_years(self.supported_years.clone())
            .with_timeout(self.resolve_timeout))
    }
}

fn parse_years(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|y| y.trim().to_string())
        .filter(|y| !y.is_empty())
        .collect()
}

fn var_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

// Non-finite floats ("NaN", "inf") parse successfully but are never valid coordinates.
fn var_f64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: f64) -> f64 {
    lookup(key)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::CompareConfig;

    fn config_from(vars: &[(&str, &str)]) -> CompareConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CompareConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_the_dashboard() {
        let cfg = CompareConfig::default();
        assert_eq!(cfg.resolve_timeout.as_secs(), 10);
        assert_eq!(cfg.supported_years.first().map(String::as_str), Some("2025"));
        assert_eq!(cfg.supported_years.last().map(String::as_str), Some("2016"));
        assert_eq!(cfg.historical_zoom.max, 18.0);
        assert_eq!(cfg.primary_zoom.max, 19.0);
    }

    #[test]
    fn http_resolver_uses_configured_years() {
        let cfg = CompareConfig {
            supported_years: vec!["2020".to_string()],
            ..CompareConfig::default()
        };
        let resolver = cfg.http_resolver().unwrap();
        assert!(resolver.is_supported("2020"));
        assert!(!resolver.is_supported("2024"));
    }

    #[test]
    fn empty_lookup_yields_defaults() {
        assert_eq!(config_from(&[]), CompareConfig::default());
    }

    #[test]
    fn tile_years_are_split_and_trimmed() {
        let cfg = config_from(&[("TILE_YEARS", " , 2020,")]);
        assert_eq!(cfg.supported_years, vec!["2020".to_string()]);

        let cfg = config_from(&[("TILE_YEARS", " 2020 , ,2019")]);
        assert_eq!(cfg.supported_years, vec!["2020".to_string(), "2019".to_string()]);
    }

    #[test]
    fn blank_tile_years_fall_back_to_defaults() {
        let cfg = config_from(&[("TILE_YEARS", " , ,")]);
        assert_eq!(cfg.supported_years, CompareConfig::default().supported_years);
    }

    #[test]
    fn resolve_timeout_parses_millis_and_ignores_garbage() {
        let cfg = config_from(&[("TILE_RESOLVE_TIMEOUT_MS", "250")]);
        assert_eq!(cfg.resolve_timeout, Duration::from_millis(250));

        let cfg = config_from(&[("TILE_RESOLVE_TIMEOUT_MS", "soon")]);
        assert_eq!(cfg.resolve_timeout, Duration::from_secs(10));
    }

    #[test]
    fn non_finite_camera_values_keep_defaults() {
        let cfg = config_from(&[
            ("MAP_ZOOM", "NaN"),
            ("MAP_CENTER_LON", "inf"),
            ("MAP_CENTER_LAT", "-1.5"),
        ]);
        assert_eq!(cfg.initial_camera.zoom, 2.0);
        assert_eq!(cfg.initial_camera.center.lon, 0.0);
        assert_eq!(cfg.initial_camera.center.lat, -1.5);
    }

    #[test]
    fn string_overrides_are_taken_verbatim() {
        let cfg = config_from(&[
            ("TILE_SERVER_URL", "http://tiles.internal:8080"),
            ("COMPARE_CONTAINER", "side-by-side"),
            ("CURRENT_IMAGERY_YEAR", "2027"),
        ]);
        assert_eq!(cfg.resolver_url, "http://tiles.internal:8080");
        assert_eq!(cfg.historical_container, "side-by-side");
        assert_eq!(cfg.current_year, "2027");
    }
}
