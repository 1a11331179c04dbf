//! Mining detection data: the GeoJSON model produced by the detection
//! pipeline, dashboard statistics, and alert report formatting.

pub mod alerts;
pub mod model;
pub mod severity;
pub mod stats;

pub use alerts::*;
pub use model::*;
pub use severity::*;
pub use stats::*;
