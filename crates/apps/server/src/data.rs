use std::path::Path;

use detections::{DetectionCollection, DetectionError};
use tracing::{debug, warn};

/// Loads the first readable collection among `sources`.
///
/// A source that exists but fails to parse is skipped like a missing one;
/// the error of the last source is returned when none load.
pub async fn load_detections<P: AsRef<Path>>(
    sources: &[P],
) -> Result<DetectionCollection, DetectionError> {
    let mut last_err = DetectionError::Io("no detection sources configured".to_string());
    for path in sources {
        let path = path.as_ref();
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(err) => {
                debug!("detection source {path:?} unavailable: {err}");
                last_err = DetectionError::Io(format!("{}: {err}", path.display()));
                continue;
            }
        };
        match DetectionCollection::from_json(&text) {
            Ok(collection) => return Ok(collection),
            Err(err) => {
                warn!("detection source {path:?} rejected: {err}");
                last_err = err;
            }
        }
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::load_detections;
    use detections::DetectionError;

    const ONE: &str = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","properties":{"lat":5.3,"lon":-2.0,"probability":0.9}}]}"#;

    #[tokio::test]
    async fn falls_back_to_the_legacy_file() {
        let dir = tempfile::tempdir().unwrap();
        let latest = dir.path().join("latest.geojson");
        let legacy = dir.path().join("legacy.geojson");
        std::fs::write(&legacy, ONE).unwrap();

        let c = load_detections(&[&latest, &legacy]).await.unwrap();
        assert_eq!(c.len(), 1);

        std::fs::write(&latest, r#"{"type":"FeatureCollection","features":[]}"#).unwrap();
        let c = load_detections(&[&latest, &legacy]).await.unwrap();
        assert!(c.is_empty());
    }

    #[tokio::test]
    async fn corrupt_primary_does_not_hide_the_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let latest = dir.path().join("latest.geojson");
        let legacy = dir.path().join("legacy.geojson");
        std::fs::write(&latest, "{ truncated").unwrap();
        std::fs::write(&legacy, ONE).unwrap();
        assert_eq!(load_detections(&[&latest, &legacy]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn nothing_readable_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_detections(&[dir.path().join("missing.geojson")])
            .await
            .unwrap_err();
        assert!(matches!(err, DetectionError::Io(_)));
    }
}
