//! Viewport registry over a pluggable rendering backend.
//!
//! A viewport is one rendering surface bound to a container, with its own
//! camera and raster layers. [`Viewports`] is the arena that owns every live
//! surface; callers only ever hold [`ViewportId`] handles into it.
//!
//! Readiness is explicit: a surface is created immediately, but camera and
//! source mutations fail with [`ViewportError::NotReady`] until the backend's
//! ready signal has been observed ([`Viewports::wait_ready`] or
//! [`Viewports::poll_ready`]).

use foundation::arena::Arena;
use foundation::handles::Handle;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::camera::{CameraState, ZoomRange};
use crate::error::{MountError, ViewportError};
use crate::reveal::ClipMask;
use crate::source::{SourceSet, TileSourceDescriptor};

pub type ViewportId = Handle;

/// Resolves once the backend surface can accept camera/source calls.
pub type ReadySignal = oneshot::Receiver<Result<(), MountError>>;

/// The DOM element (or native window region) a surface renders into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRef {
    pub element_id: String,
    pub attached: bool,
}

impl ContainerRef {
    pub fn attached(element_id: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            attached: true,
        }
    }

    pub fn detached(element_id: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            attached: false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ViewportRole {
    /// Present-day imagery; never masked.
    Primary,
    /// Historical overlay, clipped by the reveal boundary.
    Historical,
}

/// Capability interface of the map-rendering library.
///
/// Implementations own tile fetching, caching and projection; the registry
/// only drives camera, layers and the container clip.
pub trait MapBackend {
    type Surface;

    fn create_surface(
        &mut self,
        container: &ContainerRef,
        camera: &CameraState,
        zoom_range: ZoomRange,
        sources: &SourceSet,
    ) -> Result<(Self::Surface, ReadySignal), MountError>;

    fn apply_camera(&mut self, surface: &mut Self::Surface, camera: &CameraState);

    fn remove_imagery(&mut self, surface: &mut Self::Surface);

    fn add_imagery(&mut self, surface: &mut Self::Surface, descriptor: &TileSourceDescriptor);

    fn set_clip(&mut self, surface: &mut Self::Surface, mask: Option<ClipMask>);

    fn release(&mut self, surface: Self::Surface);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

/// A camera-change notification for one subscription.
///
/// Fired for user gestures and for programmatic `set_camera` alike.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraChange {
    pub viewport: ViewportId,
    pub subscription: SubscriptionId,
    pub camera: CameraState,
}

#[derive(Debug)]
enum Readiness {
    Pending(ReadySignal),
    Ready,
}

#[derive(Debug)]
struct Slot<S> {
    role: ViewportRole,
    container: ContainerRef,
    surface: S,
    camera: CameraState,
    zoom_range: ZoomRange,
    readiness: Readiness,
    imagery: Option<TileSourceDescriptor>,
    clip: Option<ClipMask>,
    subscriptions: Vec<SubscriptionId>,
}

impl<S> Slot<S> {
    fn notify(&self, viewport: ViewportId) -> Vec<CameraChange> {
        self.subscriptions
            .iter()
            .map(|&subscription| CameraChange {
                viewport,
                subscription,
                camera: self.camera,
            })
            .collect()
    }
}

pub struct Viewports<B: MapBackend> {
    backend: B,
    slots: Arena<Slot<B::Surface>>,
    next_subscription: u64,
}

impl<B: MapBackend> Viewports<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            slots: Arena::new(),
            next_subscription: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Number of live surfaces.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: ViewportId) -> bool {
        self.slots.contains(id)
    }

    /// Binds a new surface to `container`. The handle is live immediately but
    /// not ready.
    pub fn mount(
        &mut self,
        role: ViewportRole,
        container: ContainerRef,
        camera: CameraState,
        zoom_range: ZoomRange,
        sources: SourceSet,
    ) -> Result<ViewportId, MountError> {
        if !container.attached {
            return Err(MountError::ContainerDetached(container.element_id));
        }
        let camera = zoom_range.constrain(camera);
        let (surface, ready) =
            self.backend
                .create_surface(&container, &camera, zoom_range, &sources)?;
        let id = self.slots.insert(Slot {
            role,
            container,
            surface,
            camera,
            zoom_range,
            readiness: Readiness::Pending(ready),
            imagery: sources.imagery,
            clip: None,
            subscriptions: Vec::new(),
        });
        debug!("mounted {role:?} viewport {id}");
        Ok(id)
    }

    /// Mounts and waits for readiness; the handle is returned only once the
    /// surface can be driven. A surface that fails to become ready is
    /// released before the error is returned.
    pub async fn mount_ready(
        &mut self,
        role: ViewportRole,
        container: ContainerRef,
        camera: CameraState,
        zoom_range: ZoomRange,
        sources: SourceSet,
    ) -> Result<ViewportId, ViewportError> {
        let id = self.mount(role, container, camera, zoom_range, sources)?;
        self.wait_ready(id).await?;
        Ok(id)
    }

    pub async fn wait_ready(&mut self, id: ViewportId) -> Result<(), ViewportError> {
        let outcome = {
            let slot = self
                .slots
                .get_mut(id)
                .ok_or(ViewportError::InvalidHandle(id))?;
            match &mut slot.readiness {
                Readiness::Ready => return Ok(()),
                Readiness::Pending(signal) => signal.await.unwrap_or(Err(MountError::Abandoned)),
            }
        };
        self.settle_readiness(id, outcome)
    }

    /// Non-blocking readiness check.
    pub fn poll_ready(&mut self, id: ViewportId) -> Result<bool, ViewportError> {
        let outcome = {
            let slot = self
                .slots
                .get_mut(id)
                .ok_or(ViewportError::InvalidHandle(id))?;
            match &mut slot.readiness {
                Readiness::Ready => return Ok(true),
                Readiness::Pending(signal) => match signal.try_recv() {
                    Ok(result) => result,
                    Err(oneshot::error::TryRecvError::Empty) => return Ok(false),
                    Err(oneshot::error::TryRecvError::Closed) => Err(MountError::Abandoned),
                },
            }
        };
        self.settle_readiness(id, outcome).map(|()| true)
    }

    fn settle_readiness(
        &mut self,
        id: ViewportId,
        outcome: Result<(), MountError>,
    ) -> Result<(), ViewportError> {
        match outcome {
            Ok(()) => {
                let slot = self
                    .slots
                    .get_mut(id)
                    .ok_or(ViewportError::InvalidHandle(id))?;
                slot.readiness = Readiness::Ready;
                debug!("viewport {id} ready");
                Ok(())
            }
            Err(err) => {
                warn!("viewport {id} failed to become ready: {err}");
                self.destroy(id)?;
                Err(err.into())
            }
        }
    }

    pub fn is_ready(&self, id: ViewportId) -> Result<bool, ViewportError> {
        let slot = self.slots.get(id).ok_or(ViewportError::InvalidHandle(id))?;
        Ok(matches!(slot.readiness, Readiness::Ready))
    }

    pub fn role(&self, id: ViewportId) -> Result<ViewportRole, ViewportError> {
        self.slot(id).map(|s| s.role)
    }

    pub fn container(&self, id: ViewportId) -> Result<&ContainerRef, ViewportError> {
        self.slot(id).map(|s| &s.container)
    }

    pub fn camera(&self, id: ViewportId) -> Result<CameraState, ViewportError> {
        self.slot(id).map(|s| s.camera)
    }

    pub fn imagery(&self, id: ViewportId) -> Result<Option<&TileSourceDescriptor>, ViewportError> {
        self.slot(id).map(|s| s.imagery.as_ref())
    }

    pub fn clip(&self, id: ViewportId) -> Result<Option<ClipMask>, ViewportError> {
        self.slot(id).map(|s| s.clip)
    }

    pub fn surface(&self, id: ViewportId) -> Result<&B::Surface, ViewportError> {
        self.slot(id).map(|s| &s.surface)
    }

    pub fn subscription_count(&self, id: ViewportId) -> Result<usize, ViewportError> {
        self.slot(id).map(|s| s.subscriptions.len())
    }

    /// Applies `camera` (zoom clamped to the viewport's range) and returns the
    /// change notifications it fires. Idempotent.
    pub fn set_camera(
        &mut self,
        id: ViewportId,
        camera: CameraState,
    ) -> Result<Vec<CameraChange>, ViewportError> {
        let slot = ready_slot(&mut self.slots, id)?;
        let camera = slot.zoom_range.constrain(camera);
        self.backend.apply_camera(&mut slot.surface, &camera);
        slot.camera = camera;
        Ok(slot.notify(id))
    }

    /// Records a camera the user already moved the surface to (pan, zoom,
    /// rotate, tilt) and returns the change notifications it fires.
    pub fn record_user_camera(
        &mut self,
        id: ViewportId,
        camera: CameraState,
    ) -> Result<Vec<CameraChange>, ViewportError> {
        let slot = self
            .slots
            .get_mut(id)
            .ok_or(ViewportError::InvalidHandle(id))?;
        slot.camera = slot.zoom_range.constrain(camera);
        Ok(slot.notify(id))
    }

    /// Replaces the imagery layer, removing the old one before adding the new
    /// one so stale tiles never show under the new source.
    pub fn set_source(
        &mut self,
        id: ViewportId,
        descriptor: TileSourceDescriptor,
    ) -> Result<(), ViewportError> {
        let slot = ready_slot(&mut self.slots, id)?;
        self.backend.remove_imagery(&mut slot.surface);
        self.backend.add_imagery(&mut slot.surface, &descriptor);
        debug!("viewport {id} imagery -> {}", descriptor.url_template);
        slot.imagery = Some(descriptor);
        Ok(())
    }

    pub fn set_clip(&mut self, id: ViewportId, mask: Option<ClipMask>) -> Result<(), ViewportError> {
        let slot = self
            .slots
            .get_mut(id)
            .ok_or(ViewportError::InvalidHandle(id))?;
        if slot.clip == mask {
            return Ok(());
        }
        self.backend.set_clip(&mut slot.surface, mask);
        slot.clip = mask;
        Ok(())
    }

    pub fn on_camera_change(&mut self, id: ViewportId) -> Result<SubscriptionId, ViewportError> {
        let slot = self
            .slots
            .get_mut(id)
            .ok_or(ViewportError::InvalidHandle(id))?;
        let subscription = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        slot.subscriptions.push(subscription);
        Ok(subscription)
    }

    /// Returns `true` if the subscription was live.
    pub fn off_camera_change(
        &mut self,
        id: ViewportId,
        subscription: SubscriptionId,
    ) -> Result<bool, ViewportError> {
        let slot = self
            .slots
            .get_mut(id)
            .ok_or(ViewportError::InvalidHandle(id))?;
        let before = slot.subscriptions.len();
        slot.subscriptions.retain(|s| *s != subscription);
        Ok(slot.subscriptions.len() != before)
    }

    /// Releases the surface. Any later call with `id` fails with
    /// [`ViewportError::InvalidHandle`].
    pub fn destroy(&mut self, id: ViewportId) -> Result<(), ViewportError> {
        let slot = self
            .slots
            .remove(id)
            .ok_or(ViewportError::InvalidHandle(id))?;
        if !slot.subscriptions.is_empty() {
            warn!(
                "viewport {id} destroyed with {} live camera listener(s)",
                slot.subscriptions.len()
            );
        }
        self.backend.release(slot.surface);
        debug!("destroyed {:?} viewport {id}", slot.role);
        Ok(())
    }

    fn slot(&self, id: ViewportId) -> Result<&Slot<B::Surface>, ViewportError> {
        self.slots.get(id).ok_or(ViewportError::InvalidHandle(id))
    }
}

fn ready_slot<S>(slots: &mut Arena<Slot<S>>, id: ViewportId) -> Result<&mut Slot<S>, ViewportError> {
    let slot = slots.get_mut(id).ok_or(ViewportError::InvalidHandle(id))?;
    match slot.readiness {
        Readiness::Ready => Ok(slot),
        Readiness::Pending(_) => Err(ViewportError::NotReady(id)),
    }
}
