//! Bidirectional camera mirroring between two viewports.
//!
//! A single re-entrancy guard covers both directions. Change notifications
//! fired by a mirrored `set_camera` are delivered while the guard is still
//! held, so they are suppressed instead of bouncing back to the origin. The
//! guard is released once the synchronous part of the mirrored call returns.

use tracing::{trace, warn};

use crate::camera::CameraState;
use crate::error::ViewportError;
use crate::viewport::{CameraChange, MapBackend, SubscriptionId, ViewportId, Viewports};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The change was copied onto `target`.
    Mirrored { target: ViewportId },
    /// The change was an echo of a mirror in progress.
    Suppressed,
    /// The change did not come from one of our subscriptions.
    Unrelated,
}

#[derive(Debug)]
pub struct CameraSynchronizer {
    primary: ViewportId,
    secondary: ViewportId,
    primary_sub: SubscriptionId,
    secondary_sub: SubscriptionId,
    syncing: bool,
    mirrored: u64,
    suppressed: u64,
}

impl CameraSynchronizer {
    /// Subscribes to both viewports. Both must already be ready.
    pub fn attach<B: MapBackend>(
        viewports: &mut Viewports<B>,
        primary: ViewportId,
        secondary: ViewportId,
    ) -> Result<Self, ViewportError> {
        for id in [primary, secondary] {
            if !viewports.is_ready(id)? {
                return Err(ViewportError::NotReady(id));
            }
        }
        let primary_sub = viewports.on_camera_change(primary)?;
        let secondary_sub = match viewports.on_camera_change(secondary) {
            Ok(sub) => sub,
            Err(err) => {
                if let Err(rollback) = viewports.off_camera_change(primary, primary_sub) {
                    warn!("camera sync attach rollback: {rollback}");
                }
                return Err(err);
            }
        };
        Ok(Self {
            primary,
            secondary,
            primary_sub,
            secondary_sub,
            syncing: false,
            mirrored: 0,
            suppressed: 0,
        })
    }

    pub fn primary(&self) -> ViewportId {
        self.primary
    }

    pub fn secondary(&self) -> ViewportId {
        self.secondary
    }

    pub fn mirrored_count(&self) -> u64 {
        self.mirrored
    }

    pub fn suppressed_count(&self) -> u64 {
        self.suppressed
    }

    fn peer_for(&self, change: &CameraChange) -> Option<ViewportId> {
        if change.viewport == self.primary && change.subscription == self.primary_sub {
            Some(self.secondary)
        } else if change.viewport == self.secondary && change.subscription == self.secondary_sub {
            Some(self.primary)
        } else {
            None
        }
    }

    pub fn handle<B: MapBackend>(
        &mut self,
        viewports: &mut Viewports<B>,
        change: CameraChange,
    ) -> Result<SyncOutcome, ViewportError> {
        let Some(target) = self.peer_for(&change) else {
            return Ok(SyncOutcome::Unrelated);
        };
        if self.syncing {
            self.suppressed += 1;
            trace!("suppressed camera echo from {}", change.viewport);
            return Ok(SyncOutcome::Suppressed);
        }

        self.syncing = true;
        let result = self.mirror(viewports, target, change.camera);
        self.syncing = false;

        result?;
        self.mirrored += 1;
        Ok(SyncOutcome::Mirrored { target })
    }

    fn mirror<B: MapBackend>(
        &mut self,
        viewports: &mut Viewports<B>,
        target: ViewportId,
        camera: CameraState,
    ) -> Result<(), ViewportError> {
        let echoes = viewports.set_camera(target, camera)?;
        for echo in echoes {
            self.handle(viewports, echo)?;
        }
        Ok(())
    }

    /// Unsubscribes from both viewports. Must run before either is destroyed.
    pub fn detach<B: MapBackend>(self, viewports: &mut Viewports<B>) -> Result<(), ViewportError> {
        let first = viewports.off_camera_change(self.primary, self.primary_sub);
        let second = viewports.off_camera_change(self.secondary, self.secondary_sub);
        for result in [&first, &second] {
            if let Err(err) = result {
                warn!("camera sync detach: {err}");
            }
        }
        first.and(second).map(|_| ())
    }
}
