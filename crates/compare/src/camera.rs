use foundation::geo::LngLat;

/// What a viewport currently shows.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CameraState {
    pub center: LngLat,
    pub zoom: f64,
    /// Degrees clockwise from north.
    pub bearing: f64,
    /// Degrees away from nadir.
    pub pitch: f64,
}

impl CameraState {
    pub fn new(center: LngLat, zoom: f64) -> Self {
        Self {
            center,
            zoom,
            bearing: 0.0,
            pitch: 0.0,
        }
    }

    pub fn with_bearing(mut self, bearing: f64) -> Self {
        self.bearing = bearing;
        self
    }

    pub fn with_pitch(mut self, pitch: f64) -> Self {
        self.pitch = pitch;
        self
    }
}

impl Default for CameraState {
    fn default() -> Self {
        Self::new(LngLat::new(0.0, 20.0), 2.0)
    }
}

/// Inclusive zoom bounds enforced by a viewport.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ZoomRange {
    pub min: f64,
    pub max: f64,
}

impl ZoomRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: min.min(max),
            max: max.max(min),
        }
    }

    pub fn clamp(&self, zoom: f64) -> f64 {
        if zoom.is_nan() {
            return self.min;
        }
        zoom.clamp(self.min, self.max)
    }

    /// Returns `camera` with its zoom pulled into range.
    pub fn constrain(&self, camera: CameraState) -> CameraState {
        CameraState {
            zoom: self.clamp(camera.zoom),
            ..camera
        }
    }
}
