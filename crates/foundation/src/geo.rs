/// WGS84 longitude/latitude pair in degrees.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct LngLat {
    pub lon: f64,
    pub lat: f64,
}

impl LngLat {
    pub fn new(lon: f64, lat: f64) -> Self {
        LngLat { lon, lat }
    }
}
