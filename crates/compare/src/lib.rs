//! Synchronized dual-viewport comparison of present-day and historical
//! satellite imagery.

pub mod camera;
pub mod config;
pub mod error;
pub mod headless;
pub mod resolver;
pub mod reveal;
pub mod session;
pub mod source;
pub mod sync;
pub mod viewport;

pub use camera::{CameraState, ZoomRange};
pub use config::CompareConfig;
pub use error::{MountError, ResolveError, SessionError, TransportError, ViewportError};
pub use resolver::{HistoricalSourceResolver, HttpTileUrlClient, TileUrlClient};
pub use reveal::{ClipMask, ContainerRect, RevealController};
pub use session::{ComparisonSession, Mode, ResolutionStatus, SessionState, EVENT_LOG_CAPACITY};
pub use source::{Basemap, SourceSet, TileSourceDescriptor};
pub use sync::CameraSynchronizer;
pub use viewport::{ContainerRef, MapBackend, ViewportId, ViewportRole, Viewports};
