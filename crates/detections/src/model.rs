use serde::{Deserialize, Serialize};

/// Area assumed for a site when the pipeline did not estimate one.
pub const DEFAULT_SITE_AREA_HA: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub enum DetectionError {
    Io(String),
    Parse(String),
}

impl std::fmt::Display for DetectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionError::Io(msg) => write!(f, "detection data unavailable: {msg}"),
            DetectionError::Parse(msg) => write!(f, "detection data malformed: {msg}"),
        }
    }
}

impl std::error::Error for DetectionError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionProperties {
    pub lat: f64,
    pub lon: f64,
    pub probability: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_ha: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_licensed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_detection: Option<bool>,
    /// Pipeline fields this crate does not interpret, kept for re-serving.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    /// `[lon, lat]`
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: DetectionProperties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<PointGeometry>,
}

impl Detection {
    pub fn new(lat: f64, lon: f64, probability: f64) -> Self {
        Self {
            kind: "Feature".to_string(),
            properties: DetectionProperties {
                lat,
                lon,
                probability,
                tile: None,
                region: None,
                area_ha: None,
                is_licensed: None,
                detected_at: None,
                previous_detection: None,
                extra: serde_json::Map::new(),
            },
            geometry: Some(PointGeometry {
                kind: "Point".to_string(),
                coordinates: [lon, lat],
            }),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.properties.region = Some(region.into());
        self
    }

    pub fn with_area(mut self, area_ha: f64) -> Self {
        self.properties.area_ha = Some(area_ha);
        self
    }

    pub fn licensed(mut self, is_licensed: bool) -> Self {
        self.properties.is_licensed = Some(is_licensed);
        self
    }

    pub fn previously_detected(mut self, previous: bool) -> Self {
        self.properties.previous_detection = Some(previous);
        self
    }

    pub fn detected_at(mut self, when: impl Into<String>) -> Self {
        self.properties.detected_at = Some(when.into());
        self
    }

    pub fn probability(&self) -> f64 {
        self.properties.probability
    }

    pub fn is_new(&self) -> bool {
        !self.properties.previous_detection.unwrap_or(false)
    }

    pub fn is_licensed(&self) -> bool {
        self.properties.is_licensed.unwrap_or(false)
    }

    /// Region name, if one was recorded and is non-empty.
    pub fn region(&self) -> Option<&str> {
        self.properties.region.as_deref().filter(|r| !r.is_empty())
    }

    /// Estimated area, falling back to [`DEFAULT_SITE_AREA_HA`] when unknown
    /// or zero.
    pub fn area_ha(&self) -> f64 {
        self.properties
            .area_ha
            .filter(|a| *a > 0.0)
            .unwrap_or(DEFAULT_SITE_AREA_HA)
    }

    pub fn detection_date(&self) -> Option<&str> {
        self.properties.detected_at.as_deref().filter(|d| !d.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionCollection {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<serde_json::Value>,
    pub features: Vec<Detection>,
}

impl Default for DetectionCollection {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl DetectionCollection {
    pub fn new(features: Vec<Detection>) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            name: None,
            crs: None,
            features,
        }
    }

    pub fn from_json(text: &str) -> Result<Self, DetectionError> {
        let collection: Self =
            serde_json::from_str(text).map_err(|e| DetectionError::Parse(e.to_string()))?;
        if collection.kind != "FeatureCollection" {
            return Err(DetectionError::Parse(format!(
                "expected a FeatureCollection, found `{}`",
                collection.kind
            )));
        }
        Ok(collection)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Features with `probability >= min_probability`, in source order.
    pub fn at_least(&self, min_probability: f64) -> impl Iterator<Item = &Detection> + '_ {
        self.features
            .iter()
            .filter(move |d| d.probability() >= min_probability)
    }

    /// A copy keeping only features at or above `min_probability`.
    pub fn filtered(&self, min_probability: f64) -> Self {
        Self {
            features: self.at_least(min_probability).cloned().collect(),
            ..self.clone_header()
        }
    }

    /// The most confident detections first, at most `limit` of them.
    pub fn ranked(&self, min_probability: f64, limit: usize) -> Vec<&Detection> {
        let mut ranked: Vec<&Detection> = self.at_least(min_probability).collect();
        ranked.sort_by(|a, b| b.probability().total_cmp(&a.probability()));
        ranked.truncate(limit);
        ranked
    }

    fn clone_header(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            name: self.name.clone(),
            crs: self.crs.clone(),
            features: Vec::new(),
        }
    }
}
