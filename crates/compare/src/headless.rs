//! In-memory rendering backend.
//!
//! Surfaces hold their camera and layers as plain data and every backend call
//! is recorded, which makes it the backend of choice for tests and for
//! embeddings that drive the comparison engine without a real map library.

use tokio::sync::oneshot;

use crate::camera::{CameraState, ZoomRange};
use crate::error::MountError;
use crate::reveal::ClipMask;
use crate::source::{SourceSet, TileSourceDescriptor};
use crate::viewport::{ContainerRef, MapBackend, ReadySignal};

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Create { surface: u64, container: String },
    ApplyCamera { surface: u64, camera: CameraState },
    RemoveImagery { surface: u64 },
    AddImagery { surface: u64, url_template: String },
    SetClip { surface: u64, mask: Option<ClipMask> },
    Release { surface: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessSurface {
    pub id: u64,
    pub container: String,
    pub camera: CameraState,
    pub zoom_range: ZoomRange,
    pub imagery: Option<TileSourceDescriptor>,
    pub overlays: Vec<TileSourceDescriptor>,
    pub clip: Option<ClipMask>,
}

#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_surface: u64,
    calls: Vec<BackendCall>,
    manual_readiness: bool,
    pending: Vec<(u64, oneshot::Sender<Result<(), MountError>>)>,
    fail_next_mount: Option<String>,
}

impl HeadlessBackend {
    /// Surfaces report ready as soon as they are created.
    pub fn new() -> Self {
        Self::default()
    }

    /// Surfaces stay pending until [`HeadlessBackend::complete_pending`] or
    /// [`HeadlessBackend::fail_pending`] is called.
    pub fn with_manual_readiness() -> Self {
        Self {
            manual_readiness: true,
            ..Self::default()
        }
    }

    pub fn fail_next_mount(&mut self, reason: impl Into<String>) {
        self.fail_next_mount = Some(reason.into());
    }

    /// Signals ready to every pending surface. Returns how many were signalled.
    pub fn complete_pending(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let n = pending.len();
        for (_, tx) in pending {
            let _ = tx.send(Ok(()));
        }
        n
    }

    pub fn fail_pending(&mut self, reason: &str) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let n = pending.len();
        for (_, tx) in pending {
            let _ = tx.send(Err(MountError::Backend(reason.to_string())));
        }
        n
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn count(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn camera_applications(&self, surface: u64) -> usize {
        self.count(|c| matches!(c, BackendCall::ApplyCamera { surface: s, .. } if *s == surface))
    }

    pub fn releases(&self, surface: u64) -> usize {
        self.count(|c| matches!(c, BackendCall::Release { surface: s } if *s == surface))
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl MapBackend for HeadlessBackend {
    type Surface = HeadlessSurface;

    fn create_surface(
        &mut self,
        container: &ContainerRef,
        camera: &CameraState,
        zoom_range: ZoomRange,
        sources: &SourceSet,
    ) -> Result<(Self::Surface, ReadySignal), MountError> {
        if let Some(reason) = self.fail_next_mount.take() {
            return Err(MountError::Backend(reason));
        }

        let id = self.next_surface;
        self.next_surface += 1;
        self.calls.push(BackendCall::Create {
            surface: id,
            container: container.element_id.clone(),
        });

        let (tx, rx) = oneshot::channel();
        if self.manual_readiness {
            self.pending.push((id, tx));
        } else {
            let _ = tx.send(Ok(()));
        }

        let surface = HeadlessSurface {
            id,
            container: container.element_id.clone(),
            camera: *camera,
            zoom_range,
            imagery: sources.imagery.clone(),
            overlays: sources.overlays.clone(),
            clip: None,
        };
        Ok((surface, rx))
    }

    fn apply_camera(&mut self, surface: &mut Self::Surface, camera: &CameraState) {
        self.calls.push(BackendCall::ApplyCamera {
            surface: surface.id,
            camera: *camera,
        });
        surface.camera = *camera;
    }

    fn remove_imagery(&mut self, surface: &mut Self::Surface) {
        self.calls.push(BackendCall::RemoveImagery {
            surface: surface.id,
        });
        surface.imagery = None;
    }

    fn add_imagery(&mut self, surface: &mut Self::Surface, descriptor: &TileSourceDescriptor) {
        self.calls.push(BackendCall::AddImagery {
            surface: surface.id,
            url_template: descriptor.url_template.clone(),
        });
        surface.imagery = Some(descriptor.clone());
    }

    fn set_clip(&mut self, surface: &mut Self::Surface, mask: Option<ClipMask>) {
        self.calls.push(BackendCall::SetClip {
            surface: surface.id,
            mask,
        });
        surface.clip = mask;
    }

    fn release(&mut self, surface: Self::Surface) {
        self.pending.retain(|(id, _)| *id != surface.id);
        self.calls.push(BackendCall::Release {
            surface: surface.id,
        });
    }
}
