use reqwest::Url;

use crate::error::TransportError;

pub const DEFAULT_TILE_SIZE: u32 = 256;

/// A resolved, addressable raster tile layer.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSourceDescriptor {
    /// XYZ template with `{z}`, `{x}` and `{y}` placeholders.
    pub url_template: String,
    pub attribution: String,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub tile_size: u32,
}

impl TileSourceDescriptor {
    /// Builds a descriptor after checking the template can address tiles.
    pub fn new(
        url_template: impl Into<String>,
        attribution: impl Into<String>,
        max_zoom: u8,
    ) -> Result<Self, TransportError> {
        let url_template = url_template.into();
        validate_template(&url_template)?;
        Ok(Self {
            url_template,
            attribution: attribution.into(),
            min_zoom: 0,
            max_zoom,
            tile_size: DEFAULT_TILE_SIZE,
        })
    }

    /// Sentinel-2 composite for `year`, as served by the imagery resolver.
    pub fn historical(year: &str, url_template: impl Into<String>) -> Result<Self, TransportError> {
        Self::new(
            url_template,
            format!("© Google Earth Engine - Sentinel-2 {year}"),
            18,
        )
    }

    pub fn tile_url(&self, z: u8, x: u32, y: u32) -> String {
        expand(&self.url_template, z, x, y)
    }
}

fn expand(template: &str, z: u8, x: u32, y: u32) -> String {
    template
        .replace("{z}", &z.to_string())
        .replace("{x}", &x.to_string())
        .replace("{y}", &y.to_string())
}

fn validate_template(template: &str) -> Result<(), TransportError> {
    let invalid = || TransportError::InvalidTemplate(template.to_string());
    if ["{z}", "{x}", "{y}"].iter().any(|p| !template.contains(p)) {
        return Err(invalid());
    }
    let sample = Url::parse(&expand(template, 0, 0, 0)).map_err(|_| invalid())?;
    match sample.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(invalid()),
    }
}

/// Present-day satellite basemaps selectable for the primary viewport.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Basemap {
    EsriSatellite,
    #[default]
    GoogleSatellite,
}

impl Basemap {
    pub const ALL: [Basemap; 2] = [Basemap::EsriSatellite, Basemap::GoogleSatellite];

    pub fn name(&self) -> &'static str {
        match self {
            Basemap::EsriSatellite => "ESRI Satellite",
            Basemap::GoogleSatellite => "Google Satellite",
        }
    }

    pub fn descriptor(&self) -> TileSourceDescriptor {
        let (url_template, attribution) = match self {
            Basemap::EsriSatellite => (
                "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}",
                "© Esri, Maxar, Earthstar Geographics",
            ),
            Basemap::GoogleSatellite => (
                "https://mt1.google.com/vt/lyrs=s&x={x}&y={y}&z={z}",
                "© Google",
            ),
        };
        TileSourceDescriptor {
            url_template: url_template.to_string(),
            attribution: attribution.to_string(),
            min_zoom: 0,
            max_zoom: 19,
            tile_size: DEFAULT_TILE_SIZE,
        }
    }
}

/// Dark place-name labels drawn above the imagery on every viewport.
pub fn labels_overlay() -> TileSourceDescriptor {
    TileSourceDescriptor {
        url_template: "https://a.basemaps.cartocdn.com/dark_only_labels/{z}/{x}/{y}@2x.png"
            .to_string(),
        attribution: "© OpenStreetMap contributors © CARTO".to_string(),
        min_zoom: 0,
        max_zoom: 19,
        tile_size: DEFAULT_TILE_SIZE,
    }
}

/// Raster layers a viewport is mounted with.
///
/// `imagery` may be empty at mount time; it is bound later with
/// `Viewports::set_source` once resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSet {
    pub imagery: Option<TileSourceDescriptor>,
    pub overlays: Vec<TileSourceDescriptor>,
}

impl SourceSet {
    pub fn basemap(basemap: Basemap) -> Self {
        Self {
            imagery: Some(basemap.descriptor()),
            overlays: vec![labels_overlay()],
        }
    }

    /// Overlays only; imagery arrives once its source is resolved.
    pub fn pending_imagery() -> Self {
        Self {
            imagery: None,
            overlays: vec![labels_overlay()],
        }
    }
}
