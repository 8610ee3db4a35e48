//! The explicit, process-wide owner of registry, scheduler, shared renderer and
//! degrade state.
//!
//! Cloning a [`WatercolorContext`] clones a handle; all clones share state.
//! Nothing here is `Send`: the host calls in from its UI thread only.

use std::cell::RefCell;
use std::rc::Rc;

use crate::degrade::{DegradeController, MemoryPreferenceStore, PreferenceStore};
use crate::pool::DEFAULT_MAX_PER_LEN;
use crate::registry::{OverlayId, OverlayRegistration, OverlayRegistry, ViewportVisibility, VisibilityPolicy};
use crate::render::{default_probes, BackendKind, BackendProbe};
use crate::scheduler::{FrameHost, FrameScheduler, SchedulerConfig, SchedulerState, SchedulerStats, TickInputs};
use crate::shared::{SharedRenderer, SharedRendererSlot};

/// Tunables for a context.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextConfig {
    pub scheduler: SchedulerConfig,
    /// Scratch buffers kept per distinct length by the shared renderer.
    pub pool_max_per_len: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            pool_max_per_len: DEFAULT_MAX_PER_LEN,
        }
    }
}

struct ContextInner {
    host: Rc<dyn FrameHost>,
    visibility: Box<dyn VisibilityPolicy>,
    registry: RefCell<OverlayRegistry>,
    scheduler: RefCell<FrameScheduler>,
    slot: RefCell<SharedRendererSlot>,
    degrade: RefCell<DegradeController>,
}

/// Builder for [`WatercolorContext`].
///
/// ```rust,ignore
/// let ctx = WatercolorContext::builder(host)
///     .preferences(Box::new(JsonFilePreferenceStore::open("prefs.json")?))
///     .build();
/// ```
pub struct ContextBuilder {
    host: Rc<dyn FrameHost>,
    probes: Option<Vec<Box<dyn BackendProbe>>>,
    visibility: Box<dyn VisibilityPolicy>,
    preferences: Option<Box<dyn PreferenceStore>>,
    config: ContextConfig,
}

impl ContextBuilder {
    /// Replaces the default backend probe chain.
    pub fn probes(mut self, probes: Vec<Box<dyn BackendProbe>>) -> Self {
        self.probes = Some(probes);
        self
    }

    pub fn visibility(mut self, policy: impl VisibilityPolicy + 'static) -> Self {
        self.visibility = Box::new(policy);
        self
    }

    /// Store backing the persisted drag-degrade opt-out. Defaults to in-memory.
    pub fn preferences(mut self, store: Box<dyn PreferenceStore>) -> Self {
        self.preferences = Some(store);
        self
    }

    pub fn config(mut self, config: ContextConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> WatercolorContext {
        let probes = self.probes.unwrap_or_else(default_probes);
        let store = self
            .preferences
            .unwrap_or_else(|| Box::new(MemoryPreferenceStore::new()));

        WatercolorContext {
            inner: Rc::new(ContextInner {
                host: self.host,
                visibility: self.visibility,
                registry: RefCell::new(OverlayRegistry::new()),
                scheduler: RefCell::new(FrameScheduler::new(self.config.scheduler)),
                slot: RefCell::new(
                    SharedRendererSlot::new(probes).with_pool_max_per_len(self.config.pool_max_per_len),
                ),
                degrade: RefCell::new(DegradeController::new(store)),
            }),
        }
    }
}

#[derive(Clone)]
pub struct WatercolorContext {
    inner: Rc<ContextInner>,
}

impl WatercolorContext {
    /// Context with default probes, visibility, preferences and tuning.
    pub fn new(host: Rc<dyn FrameHost>) -> Self {
        Self::builder(host).build()
    }

    pub fn builder(host: Rc<dyn FrameHost>) -> ContextBuilder {
        ContextBuilder {
            host,
            probes: None,
            visibility: Box::new(ViewportVisibility),
            preferences: None,
            config: ContextConfig::default(),
        }
    }

    // ── registry ───────────────────────────────────────────────────────────

    /// Adds an overlay and starts the frame loop if it was idle.
    pub fn register(&self, registration: OverlayRegistration) -> OverlayId {
        let id = self.inner.registry.borrow_mut().register(registration);
        // Mounting from a surface callback lands while `tick` holds the
        // scheduler. That tick is running and requests the next frame itself.
        match self.inner.scheduler.try_borrow_mut() {
            Ok(mut scheduler) => scheduler.ensure_running(self.inner.host.as_ref()),
            Err(_) => log::trace!("{id} registered during a tick"),
        }
        log::trace!("registered {id}");
        id
    }

    /// Removes an overlay. The loop notices an empty registry on its next tick.
    pub fn unregister(&self, id: OverlayId) -> bool {
        let removed = self.inner.registry.borrow_mut().unregister(id);
        if removed {
            log::trace!("unregistered {id}");
        }
        removed
    }

    pub fn overlay_count(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    // ── frame loop ─────────────────────────────────────────────────────────

    /// Host frame callback.
    pub fn tick(&self, now_ms: f64) {
        // Snapshot first: surfaces may mount or unmount overlays while we
        // paint. The shared renderer stays borrowed for the whole tick.
        let entries = self.inner.registry.borrow().snapshot();
        let degraded = self.inner.degrade.borrow().is_degrade_active();

        let inputs = TickInputs {
            now_ms,
            entries: &entries,
            host: self.inner.host.as_ref(),
            visibility: self.inner.visibility.as_ref(),
            degraded,
        };
        let mut scheduler = self.inner.scheduler.borrow_mut();
        let mut slot = self.inner.slot.borrow_mut();
        scheduler.tick(inputs, &mut slot);
    }

    pub fn state(&self) -> SchedulerState {
        self.inner.scheduler.borrow().state()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.inner.scheduler.borrow().stats()
    }

    // ── shared renderer ────────────────────────────────────────────────────

    /// Generation of the live shared renderer, if one exists.
    pub fn shared_generation(&self) -> Option<u64> {
        self.inner.slot.borrow().current_generation()
    }

    /// Backend of the live shared renderer, if one exists.
    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.inner.slot.borrow().current().map(SharedRenderer::kind)
    }

    /// Runs `f` against the shared renderer, constructing it if needed.
    pub fn with_shared_renderer<R>(&self, f: impl FnOnce(&mut SharedRenderer) -> R) -> R {
        f(self.inner.slot.borrow_mut().get())
    }

    pub fn release_shared_renderer(&self) {
        self.inner.slot.borrow_mut().release();
    }

    // ── degrade hooks ──────────────────────────────────────────────────────

    pub fn set_interaction_degraded(&self, degraded: bool) {
        self.inner.degrade.borrow_mut().set_interaction_degraded(degraded);
    }

    pub fn set_drag_degrade_disabled(&self, disabled: bool) {
        self.inner.degrade.borrow_mut().set_drag_degrade_disabled(disabled);
    }

    pub fn is_drag_degrade_disabled(&self) -> bool {
        self.inner.degrade.borrow().is_drag_degrade_disabled()
    }

    pub fn set_diagnostic_override(&self, value: Option<bool>) {
        self.inner.degrade.borrow_mut().set_diagnostic_override(value);
    }

    pub fn is_degrade_active(&self) -> bool {
        self.inner.degrade.borrow().is_degrade_active()
    }

    // ── teardown ───────────────────────────────────────────────────────────

    /// Clears and drops every registration, cancels the pending frame and
    /// releases the shared renderer. The context stays usable.
    pub fn shutdown(&self) {
        let entries = self.inner.registry.borrow().snapshot();
        for (_, reg) in &entries {
            reg.clear();
        }
        self.inner.registry.borrow_mut().clear();

        let mut slot = self.inner.slot.borrow_mut();
        self.inner
            .scheduler
            .borrow_mut()
            .stop(self.inner.host.as_ref(), &mut slot);
        slot.release();
        log::debug!("watercolor context shut down");
    }
}

impl std::fmt::Debug for WatercolorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatercolorContext")
            .field("overlays", &self.overlay_count())
            .field("state", &self.state())
            .field("shared_generation", &self.shared_generation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SplotchConfig, WatercolorConfig};
    use crate::overlay::Overlay;
    use crate::surface::{OverlaySurface, PixelSurface, SurfaceGeometry};
    use crate::test_support::{FakeHost, FakeSurface, Journal, RecordingProbe};

    fn setup() -> (Rc<FakeHost>, WatercolorContext, Rc<Journal>) {
        let host = FakeHost::new();
        let (probe, journal) = RecordingProbe::new();
        let ctx = WatercolorContext::builder(host.clone()).probes(vec![probe]).build();
        (host, ctx, journal)
    }

    fn config() -> WatercolorConfig {
        WatercolorConfig {
            splotches: vec![SplotchConfig::default(), SplotchConfig::default()],
            luminous: true,
            ..Default::default()
        }
    }

    fn mount_many(ctx: &WatercolorContext, n: usize) -> (Vec<Overlay>, Vec<Rc<FakeSurface>>) {
        let surfaces: Vec<_> = (0..n).map(|_| FakeSurface::sized(100.0, 80.0)).collect();
        let overlays = surfaces
            .iter()
            .map(|s| Overlay::mount(ctx, config(), s.clone()))
            .collect();
        (overlays, surfaces)
    }

    #[test]
    fn first_register_starts_the_loop_once() {
        let (host, ctx, _) = setup();
        assert_eq!(ctx.state(), SchedulerState::Idle);

        let (_overlays, _) = mount_many(&ctx, 2);
        assert_eq!(ctx.state(), SchedulerState::Running);
        assert_eq!(host.requests.get(), 1);
    }

    #[test]
    fn tick_paints_each_visible_overlay_once() {
        let (host, ctx, journal) = setup();
        let (_overlays, surfaces) = mount_many(&ctx, 3);

        ctx.tick(0.0);

        assert_eq!(journal.renders.borrow().len(), 3);
        assert!(surfaces.iter().all(|s| s.presents.get() == 1));
        assert_eq!(surfaces[0].last_size.get(), (100, 80));
        // Same pixel size for all three: one resize.
        assert_eq!(journal.resizes.get(), 1);
        assert_eq!(journal.renders.borrow()[0].bloom_count, 2);
        assert_eq!(host.requests.get(), 2);
    }

    #[test]
    fn zero_client_width_is_cleared_not_rendered() {
        let (_, ctx, journal) = setup();
        let surface = FakeSurface::sized(0.0, 80.0);
        let _overlay = Overlay::mount(&ctx, config(), surface.clone());

        ctx.tick(0.0);

        assert!(journal.renders.borrow().is_empty());
        assert_eq!(surface.presents.get(), 0);
        assert!(surface.clears.get() >= 1);
        assert_eq!(ctx.stats().culled, 1);
    }

    #[test]
    fn inactive_overlay_is_skipped() {
        let (_, ctx, journal) = setup();
        let (overlays, surfaces) = mount_many(&ctx, 2);
        overlays[1].set_active(false);

        ctx.tick(0.0);

        assert_eq!(journal.renders.borrow().len(), 1);
        assert_eq!(surfaces[1].presents.get(), 0);
        assert_eq!(surfaces[1].clears.get(), 1);
    }

    #[test]
    fn resize_follows_pixel_size_changes() {
        let (_, ctx, journal) = setup();
        let a = FakeSurface::sized(100.0, 80.0);
        let b = FakeSurface::sized(50.0, 50.0);
        let _oa = Overlay::mount(&ctx, config(), a.clone());
        let _ob = Overlay::mount(&ctx, config(), b.clone());

        ctx.tick(0.0);
        assert_eq!(journal.resizes.get(), 2);
        assert_eq!(b.last_size.get(), (50, 50));

        let mut g = b.geometry.get();
        g.device_pixel_ratio = 2.0;
        b.geometry.set(g);
        ctx.tick(100.0);
        assert_eq!(b.last_size.get(), (100, 100));
    }

    #[test]
    fn last_unmount_idles_and_releases_renderer() {
        let (host, ctx, journal) = setup();
        let overlay = Overlay::mount(&ctx, config(), FakeSurface::sized(10.0, 10.0));
        ctx.tick(0.0);
        let first = ctx.shared_generation();
        assert!(first.is_some());

        overlay.unmount();
        assert_eq!(ctx.state(), SchedulerState::Running);
        ctx.tick(16.0);

        assert_eq!(ctx.state(), SchedulerState::Idle);
        assert_eq!(ctx.shared_generation(), None);
        assert_eq!(host.cancels.get(), 1);
        assert_eq!(journal.disposes.get(), 1);

        let _again = Overlay::mount(&ctx, config(), FakeSurface::sized(10.0, 10.0));
        ctx.tick(32.0);
        let second = ctx.shared_generation();
        assert!(second.is_some());
        assert_ne!(first, second);
        assert_eq!(journal.probes.get(), 2);
    }

    #[test]
    fn stale_tick_after_idle_is_ignored() {
        let (host, ctx, journal) = setup();
        ctx.tick(0.0);
        assert_eq!(ctx.stats().ticks, 0);
        assert_eq!(host.requests.get(), 0);
        assert_eq!(journal.probes.get(), 0);
    }

    #[test]
    fn interval_adapts_to_overlay_count() {
        let (_, ctx, _) = setup();
        let (_overlays, _) = mount_many(&ctx, 25);

        ctx.tick(0.0);
        ctx.tick(20.0);
        assert_eq!(ctx.stats().rendered_frames, 1);
        ctx.tick(34.0);
        assert_eq!(ctx.stats().rendered_frames, 2);
        assert_eq!(ctx.stats().last_interval_ms, 33);
    }

    #[test]
    fn drag_degrade_caps_overlays_and_scales_quality() {
        let (_, ctx, journal) = setup();
        let (_overlays, surfaces) = mount_many(&ctx, 30);
        ctx.set_interaction_degraded(true);
        assert!(ctx.is_degrade_active());

        ctx.tick(0.0);

        let renders = journal.renders.borrow();
        assert_eq!(renders.len(), 18);
        let configured = config().grain.intensity;
        for r in renders.iter() {
            assert!(r.grain_intensity <= configured * 0.55 + f32::EPSILON);
            assert!((r.grain_frequency - 0.85).abs() < 1e-6);
            assert!((r.glow_strength - 0.45).abs() < 1e-6);
        }
        assert_eq!(ctx.stats().capped, 12);
        assert!(surfaces[18..].iter().all(|s| s.clears.get() == 1 && s.presents.get() == 0));
        assert_eq!(ctx.stats().last_interval_ms, (1000.0f64 / 22.0).round() as u64);
    }

    #[test]
    fn disabled_drag_degrade_renders_everything() {
        let (_, ctx, journal) = setup();
        let (_overlays, _) = mount_many(&ctx, 30);
        ctx.set_interaction_degraded(true);
        ctx.set_drag_degrade_disabled(true);

        ctx.tick(0.0);

        assert_eq!(journal.renders.borrow().len(), 30);
        assert!(journal.renders.borrow().iter().all(|r| r.glow_strength == 1.0));
    }

    #[test]
    fn shutdown_clears_and_idles() {
        let (host, ctx, journal) = setup();
        let (overlays, surfaces) = mount_many(&ctx, 2);
        ctx.tick(0.0);

        ctx.shutdown();

        assert_eq!(ctx.state(), SchedulerState::Idle);
        assert_eq!(ctx.overlay_count(), 0);
        assert_eq!(host.cancels.get(), 1);
        assert_eq!(journal.disposes.get(), 1);
        assert!(surfaces.iter().all(|s| s.clears.get() >= 1));
        drop(overlays);
    }

    #[test]
    fn with_shared_renderer_builds_lazily() {
        let (_, ctx, journal) = setup();
        assert_eq!(ctx.backend_kind(), None);
        let generation = ctx.with_shared_renderer(|r| r.generation());
        assert_eq!(ctx.shared_generation(), Some(generation));
        assert_eq!(ctx.backend_kind(), Some(BackendKind::Software));
        ctx.release_shared_renderer();
        assert_eq!(journal.disposes.get(), 1);
    }

    /// Mounts one extra overlay the first time it is presented.
    struct SpawningSurface {
        inner: Rc<FakeSurface>,
        ctx: WatercolorContext,
        spawned: RefCell<Vec<Overlay>>,
    }

    impl OverlaySurface for SpawningSurface {
        fn geometry(&self) -> SurfaceGeometry {
            self.inner.geometry()
        }

        fn clear(&self) {
            self.inner.clear();
        }

        fn present(&self, source: &PixelSurface) {
            self.inner.present(source);
            if self.spawned.borrow().is_empty() {
                let child = Overlay::mount(&self.ctx, config(), FakeSurface::sized(50.0, 50.0));
                self.spawned.borrow_mut().push(child);
            }
        }
    }

    #[test]
    fn mounting_from_present_during_tick() {
        let (host, ctx, journal) = setup();
        let surface = Rc::new(SpawningSurface {
            inner: FakeSurface::sized(100.0, 80.0),
            ctx: ctx.clone(),
            spawned: RefCell::new(Vec::new()),
        });
        let _overlay = Overlay::mount(&ctx, config(), surface.clone());

        ctx.tick(0.0);

        assert_eq!(ctx.overlay_count(), 2);
        assert_eq!(ctx.state(), SchedulerState::Running);
        assert_eq!(host.requests.get(), 2);

        ctx.tick(100.0);
        assert_eq!(journal.renders.borrow().len(), 3);

        surface.spawned.borrow_mut().clear();
        assert_eq!(ctx.overlay_count(), 1);
        ctx.shutdown();
    }
}
