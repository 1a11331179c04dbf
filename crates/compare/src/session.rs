//! Comparison session: the state machine that owns both viewports.
//!
//! ```text
//! Single --request_compare--> PickingYear --select_year--> Resolving
//! Resolving --resolved(ok)--> Comparing      Resolving --resolved(err)--> PickingYear
//! Comparing --select_year--> Resolving       Comparing --exit_compare--> Single
//! PickingYear --cancel--> Single
//! ```
//!
//! Triggers that do not apply to the current state are ignored. The session
//! is the only owner of viewport handles; the synchronizer and the reveal
//! controller refer to them by id.

use foundation::geo::LngLat;
use runtime::event_bus::EventBus;
use runtime::metrics::Metrics;
use tracing::{debug, info, warn};

use crate::camera::{CameraState, ZoomRange};
use crate::config::CompareConfig;
use crate::error::{ResolveError, SessionError, ViewportError};
use crate::resolver::{HistoricalSourceResolver, PendingResolve, ResolveOutcome, TileUrlClient};
use crate::reveal::{ClipMask, ContainerRect, RevealController};
use crate::source::{Basemap, SourceSet, TileSourceDescriptor};
use crate::sync::{CameraSynchronizer, SyncOutcome};
use crate::viewport::{CameraChange, ContainerRef, MapBackend, ViewportId, ViewportRole, Viewports};

/// Trace entries retained per session; older ones are evicted.
pub const EVENT_LOG_CAPACITY: usize = 256;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    Single,
    PickingYear,
    Resolving,
    Comparing,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Single => "single",
            SessionState::PickingYear => "picking_year",
            SessionState::Resolving => "resolving",
            SessionState::Comparing => "comparing",
        }
    }
}

/// Whether a historical viewport is currently mounted.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mode {
    Single,
    Comparing,
}

/// What happened to a completed resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionStatus {
    /// Superseded, or the session moved on while it was in flight.
    Discarded,
    /// The descriptor is bound to the historical viewport.
    Applied,
    /// The resolver failed; the error is also the session notice.
    Failed(ResolveError),
}

#[derive(Debug)]
struct ActiveComparison {
    secondary: ViewportId,
    sync: CameraSynchronizer,
    year: String,
    source: TileSourceDescriptor,
}

pub struct ComparisonSession<B: MapBackend, C> {
    viewports: Viewports<B>,
    primary: ViewportId,
    historical_container: ContainerRef,
    historical_zoom: ZoomRange,
    resolver: HistoricalSourceResolver<C>,
    state: SessionState,
    pending_year: Option<String>,
    comparison: Option<ActiveComparison>,
    reveal: RevealController,
    basemap: Basemap,
    current_year: String,
    notice: Option<String>,
    events: EventBus,
    metrics: Metrics,
}

impl<B: MapBackend, C: TileUrlClient> ComparisonSession<B, C> {
    /// Mounts the primary viewport and waits until it is ready.
    pub async fn open(
        backend: B,
        resolver: HistoricalSourceResolver<C>,
        config: &CompareConfig,
        primary_container: ContainerRef,
    ) -> Result<Self, ViewportError> {
        let basemap = Basemap::default();
        let mut viewports = Viewports::new(backend);
        let primary = viewports
            .mount_ready(
                ViewportRole::Primary,
                primary_container,
                config.initial_camera,
                config.primary_zoom,
                SourceSet::basemap(basemap),
            )
            .await?;
        let mut metrics = Metrics::new();
        metrics.inc_counter("viewport.mounted", 1);
        info!("comparison session opened (primary viewport {primary})");

        Ok(Self {
            viewports,
            primary,
            historical_container: ContainerRef::attached(config.historical_container.clone()),
            historical_zoom: config.historical_zoom,
            resolver,
            state: SessionState::Single,
            pending_year: None,
            comparison: None,
            reveal: RevealController::new(),
            basemap,
            current_year: config.current_year.clone(),
            notice: None,
            events: EventBus::bounded(EVENT_LOG_CAPACITY),
            metrics,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mode(&self) -> Mode {
        if self.comparison.is_some() {
            Mode::Comparing
        } else {
            Mode::Single
        }
    }

    /// The year being resolved, else the year on display.
    pub fn selected_year(&self) -> Option<&str> {
        self.pending_year
            .as_deref()
            .or(self.comparison.as_ref().map(|c| c.year.as_str()))
    }

    pub fn tile_source(&self) -> Option<&TileSourceDescriptor> {
        self.comparison.as_ref().map(|c| &c.source)
    }

    pub fn reveal_fraction(&self) -> f64 {
        self.reveal.fraction()
    }

    pub fn is_reveal_dragging(&self) -> bool {
        self.reveal.is_dragging()
    }

    /// Mask applied to the historical viewport; the primary is never masked.
    pub fn clip_mask(&self) -> Option<ClipMask> {
        self.comparison.as_ref().map(|_| self.reveal.clip_mask())
    }

    /// Last user-facing error, cleared by the next successful step.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Captions for the historical and present-day sides.
    pub fn labels(&self) -> Option<(String, String)> {
        self.comparison.as_ref().map(|c| {
            (
                format!("{} (Sentinel-2)", c.year),
                format!("{} (Current)", self.current_year),
            )
        })
    }

    pub fn supported_years(&self) -> &[String] {
        self.resolver.supported_years()
    }

    pub fn basemap(&self) -> Basemap {
        self.basemap
    }

    pub fn primary(&self) -> ViewportId {
        self.primary
    }

    pub fn secondary(&self) -> Option<ViewportId> {
        self.comparison.as_ref().map(|c| c.secondary)
    }

    pub fn viewports(&self) -> &Viewports<B> {
        &self.viewports
    }

    pub fn backend_mut(&mut self) -> &mut B {
        self.viewports.backend_mut()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Updates the element the historical viewport will mount into.
    pub fn set_historical_container(&mut self, container: ContainerRef) {
        self.historical_container = container;
    }

    fn transition(&mut self, to: SessionState, cause: &str) {
        let from = self.state;
        self.state = to;
        info!("compare session {} -> {} ({cause})", from.as_str(), to.as_str());
        self.events.emit(
            "transition",
            format!("{} -> {} ({cause})", from.as_str(), to.as_str()),
        );
    }

    fn ignored(&mut self, trigger: &str) {
        debug!("ignoring {trigger} in {}", self.state.as_str());
        self.events
            .emit("ignored", format!("{trigger} in {}", self.state.as_str()));
    }

    pub fn request_compare(&mut self) -> bool {
        if self.state != SessionState::Single {
            self.ignored("request_compare");
            return false;
        }
        self.notice = None;
        self.transition(SessionState::PickingYear, "request_compare");
        true
    }

    pub fn cancel(&mut self) -> bool {
        if self.state != SessionState::PickingYear {
            self.ignored("cancel");
            return false;
        }
        self.resolver.invalidate();
        self.notice = None;
        self.transition(SessionState::Single, "cancel");
        true
    }

    /// Starts resolving `year`. The caller drives the returned request and
    /// hands its outcome to [`ComparisonSession::apply_resolution`].
    ///
    /// Selecting again while a request is in flight supersedes it.
    pub fn select_year(&mut self, year: &str) -> Option<PendingResolve> {
        if self.state == SessionState::Single {
            self.ignored("select_year");
            return None;
        }
        match self.resolver.begin(year) {
            Ok(pending) => {
                if self.pending_year.is_some() {
                    self.metrics.inc_counter("resolve.superseded", 1);
                }
                self.metrics.inc_counter("resolve.started", 1);
                self.pending_year = Some(year.to_string());
                self.notice = None;
                self.events.emit("resolve", format!("begin {year}"));
                if self.state != SessionState::Resolving {
                    self.transition(SessionState::Resolving, "select_year");
                }
                Some(pending)
            }
            Err(err) => {
                warn!("year selection rejected: {err}");
                self.events.emit("resolve", format!("rejected {year}"));
                self.notice = Some(err.to_string());
                None
            }
        }
    }

    pub async fn apply_resolution(
        &mut self,
        outcome: ResolveOutcome,
    ) -> Result<ResolutionStatus, SessionError> {
        let ResolveOutcome { ticket, result } = outcome;
        if self.state != SessionState::Resolving || !self.resolver.is_current(&ticket) {
            debug!(
                "discarding resolution for {} (generation {})",
                ticket.year, ticket.generation
            );
            self.metrics.inc_counter("resolve.discarded", 1);
            self.events
                .emit("resolve", format!("discarded {}", ticket.year));
            return Ok(ResolutionStatus::Discarded);
        }
        self.pending_year = None;

        let descriptor = match result {
            Ok(descriptor) => descriptor,
            Err(err) => {
                warn!("resolving {} failed: {err}", ticket.year);
                self.metrics.inc_counter("resolve.failed", 1);
                self.notice = Some(err.to_string());
                let back_to = if self.comparison.is_some() {
                    SessionState::Comparing
                } else {
                    SessionState::PickingYear
                };
                self.transition(back_to, "resolve_failed");
                return Ok(ResolutionStatus::Failed(err));
            }
        };

        match self.comparison.as_ref().map(|c| c.secondary) {
            Some(secondary) => self.swap_source(secondary, ticket.year, descriptor)?,
            None => self.enter_comparison(ticket.year, descriptor).await?,
        }
        Ok(ResolutionStatus::Applied)
    }

    /// Selects `year` and applies its resolution once it completes.
    pub async fn select_year_and_wait(
        &mut self,
        year: &str,
    ) -> Result<Option<ResolutionStatus>, SessionError> {
        let Some(pending) = self.select_year(year) else {
            return Ok(None);
        };
        let outcome = pending.run().await;
        self.apply_resolution(outcome).await.map(Some)
    }

    fn swap_source(
        &mut self,
        secondary: ViewportId,
        year: String,
        descriptor: TileSourceDescriptor,
    ) -> Result<(), SessionError> {
        if let Err(err) = self.viewports.set_source(secondary, descriptor.clone()) {
            return Err(self.abort(err));
        }
        if let Some(active) = self.comparison.as_mut() {
            active.year = year.clone();
            active.source = descriptor;
        }
        self.notice = None;
        self.events.emit("resolve", format!("applied {year}"));
        self.transition(SessionState::Comparing, "resolve_succeeded");
        Ok(())
    }

    async fn enter_comparison(
        &mut self,
        year: String,
        descriptor: TileSourceDescriptor,
    ) -> Result<(), SessionError> {
        let seed = match self.viewports.camera(self.primary) {
            Ok(camera) => camera,
            Err(err) => return Err(self.abort(err)),
        };
        let secondary = match self
            .viewports
            .mount_ready(
                ViewportRole::Historical,
                self.historical_container.clone(),
                seed,
                self.historical_zoom,
                SourceSet::pending_imagery(),
            )
            .await
        {
            Ok(id) => id,
            Err(err) => return Err(self.abort(err)),
        };
        self.metrics.inc_counter("viewport.mounted", 1);

        let wired = Self::wire_secondary(
            &mut self.viewports,
            self.primary,
            secondary,
            &descriptor,
            self.reveal.clip_mask(),
        );
        let sync = match wired {
            Ok(sync) => sync,
            Err(err) => {
                if self.viewports.destroy(secondary).is_ok() {
                    self.metrics.inc_counter("viewport.destroyed", 1);
                }
                return Err(self.abort(err));
            }
        };

        self.comparison = Some(ActiveComparison {
            secondary,
            sync,
            year: year.clone(),
            source: descriptor,
        });
        self.notice = None;
        self.events.emit("resolve", format!("applied {year}"));
        self.transition(SessionState::Comparing, "resolve_succeeded");
        Ok(())
    }

    fn wire_secondary(
        viewports: &mut Viewports<B>,
        primary: ViewportId,
        secondary: ViewportId,
        descriptor: &TileSourceDescriptor,
        mask: ClipMask,
    ) -> Result<CameraSynchronizer, ViewportError> {
        // The primary may have moved while the surface was initialising.
        let camera = viewports.camera(primary)?;
        viewports.set_camera(secondary, camera)?;
        viewports.set_source(secondary, descriptor.clone())?;
        viewports.set_clip(secondary, Some(mask))?;
        CameraSynchronizer::attach(viewports, primary, secondary)
    }

    /// Abandons the transition in progress and falls back to `Single`.
    fn abort(&mut self, err: ViewportError) -> SessionError {
        warn!("comparison aborted: {err}");
        self.resolver.invalidate();
        self.pending_year = None;
        if let Some(active) = self.comparison.take() {
            self.teardown(active);
        }
        self.reveal.reset();
        self.notice = Some(err.to_string());
        self.transition(SessionState::Single, "viewport_error");
        SessionError::Viewport(err)
    }

    fn teardown(&mut self, active: ActiveComparison) -> Option<ViewportError> {
        let mut first_err = None;
        if let Err(err) = active.sync.detach(&mut self.viewports) {
            first_err.get_or_insert(err);
        }
        match self.viewports.destroy(active.secondary) {
            Ok(()) => self.metrics.inc_counter("viewport.destroyed", 1),
            Err(err) => {
                first_err.get_or_insert(err);
            }
        }
        first_err
    }

    /// Leaves comparison: detaches sync, destroys the historical viewport and
    /// resets the reveal boundary. Returns `Ok(false)` when not comparing.
    pub fn exit_compare(&mut self) -> Result<bool, SessionError> {
        if self.state != SessionState::Comparing {
            self.ignored("exit_compare");
            return Ok(false);
        }
        self.resolver.invalidate();
        self.pending_year = None;
        let err = self.comparison.take().and_then(|active| self.teardown(active));
        self.reveal.reset();
        self.notice = None;
        self.transition(SessionState::Single, "exit_compare");
        match err {
            Some(err) => Err(err.into()),
            None => Ok(true),
        }
    }

    /// Feeds a user gesture (pan, zoom, rotate, tilt) on `viewport`.
    pub fn camera_changed(
        &mut self,
        viewport: ViewportId,
        camera: CameraState,
    ) -> Result<(), SessionError> {
        let changes = self.viewports.record_user_camera(viewport, camera)?;
        self.propagate(changes)
    }

    /// Moves the primary camera, e.g. to a selected detection.
    pub fn focus(&mut self, center: LngLat, zoom: f64) -> Result<(), SessionError> {
        let camera = CameraState {
            center,
            zoom,
            ..self.viewports.camera(self.primary)?
        };
        let changes = self.viewports.set_camera(self.primary, camera)?;
        self.propagate(changes)
    }

    fn propagate(&mut self, changes: Vec<CameraChange>) -> Result<(), SessionError> {
        let Some(active) = self.comparison.as_mut() else {
            return Ok(());
        };
        let suppressed_before = active.sync.suppressed_count();
        let mut result = Ok(());
        for change in changes {
            match active.sync.handle(&mut self.viewports, change) {
                Ok(SyncOutcome::Mirrored { .. }) => self.metrics.inc_counter("sync.mirrored", 1),
                Ok(_) => {}
                Err(err) => {
                    // Dropped rather than retried; the next gesture re-syncs.
                    warn!("camera mirror dropped: {err}");
                    result = Err(err.into());
                }
            }
        }
        let suppressed = active.sync.suppressed_count() - suppressed_before;
        if suppressed > 0 {
            self.metrics.inc_counter("sync.suppressed", suppressed);
        }
        result
    }

    pub fn set_basemap(&mut self, basemap: Basemap) -> Result<(), SessionError> {
        self.viewports.set_source(self.primary, basemap.descriptor())?;
        self.basemap = basemap;
        self.events.emit("basemap", basemap.name());
        Ok(())
    }

    /// Starts a reveal drag. Only meaningful while a historical viewport is
    /// mounted.
    pub fn begin_reveal_drag(&mut self) -> bool {
        if self.comparison.is_none() {
            return false;
        }
        self.reveal.begin();
        true
    }

    pub fn move_reveal_drag(
        &mut self,
        pointer_x: f64,
        rect: ContainerRect,
    ) -> Result<Option<f64>, SessionError> {
        let Some(active) = self.comparison.as_ref() else {
            return Ok(None);
        };
        let Some(fraction) = self.reveal.move_to(pointer_x, rect) else {
            return Ok(None);
        };
        self.viewports
            .set_clip(active.secondary, Some(self.reveal.clip_mask()))?;
        self.metrics.set_gauge("reveal.fraction", fraction);
        Ok(Some(fraction))
    }

    /// Ends a reveal drag (pointer up, or pointer left the window).
    pub fn end_reveal_drag(&mut self) {
        self.reveal.end();
    }

    /// Tears everything down and hands back the registry.
    pub fn shutdown(mut self) -> Result<Viewports<B>, SessionError> {
        self.resolver.invalidate();
        if let Some(err) = self.comparison.take().and_then(|active| self.teardown(active)) {
            warn!("shutdown: {err}");
        }
        self.viewports.destroy(self.primary)?;
        Ok(self.viewports)
    }
}
