//! Per-surface handle created by UI code.

use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

use crate::bloom::{build_blooms, Bloom};
use crate::config::{GrainConfig, WatercolorConfig};
use crate::context::WatercolorContext;
use crate::registry::{OverlayId, OverlayRegistration};
use crate::surface::OverlaySurface;

/// Values the scheduler reads every tick, prepared once per config change.
struct OverlayState {
    config: RefCell<WatercolorConfig>,
    blooms: RefCell<Rc<[Bloom]>>,
    grain: RefCell<GrainConfig>,
    glow_strength: Cell<f32>,
    active: Cell<bool>,
}

impl OverlayState {
    fn new(config: WatercolorConfig) -> Self {
        let state = Self {
            config: RefCell::new(WatercolorConfig::default()),
            blooms: RefCell::new(Rc::from(Vec::new())),
            grain: RefCell::new(GrainConfig::default()),
            glow_strength: Cell::new(0.0),
            active: Cell::new(true),
        };
        state.apply(config);
        state
    }

    fn apply(&self, config: WatercolorConfig) {
        if let Err(e) = config.validate() {
            log::warn!("watercolor config: {e}");
        }
        *self.blooms.borrow_mut() = Rc::from(build_blooms(&config));
        *self.grain.borrow_mut() = config.grain.clone();
        self.glow_strength.set(config.glow_strength());
        *self.config.borrow_mut() = config;
    }
}

/// A mounted watercolor overlay.
///
/// Registers with the context on [`mount`](Self::mount) and unregisters when
/// dropped. Configuration changes rebuild blooms immediately, so a tick never
/// sees a half-applied update.
pub struct Overlay {
    ctx: WatercolorContext,
    surface: Rc<dyn OverlaySurface>,
    state: Rc<OverlayState>,
    id: Option<OverlayId>,
}

impl Overlay {
    pub fn mount(
        ctx: &WatercolorContext,
        config: WatercolorConfig,
        surface: Rc<dyn OverlaySurface>,
    ) -> Self {
        let state = Rc::new(OverlayState::new(config));

        let blooms = state.clone();
        let grain = state.clone();
        let glow = state.clone();
        let active = state.clone();
        let id = ctx.register(OverlayRegistration {
            surface: surface.clone(),
            blooms: Box::new(move || blooms.blooms.borrow().clone()),
            grain: Box::new(move || grain.grain.borrow().clone()),
            glow_strength: Box::new(move || glow.glow_strength.get()),
            active: Box::new(move || active.active.get()),
        });

        Self {
            ctx: ctx.clone(),
            surface,
            state,
            id: Some(id),
        }
    }

    #[inline]
    pub fn id(&self) -> Option<OverlayId> {
        self.id
    }

    /// Replaces the configuration and rebuilds blooms.
    pub fn set_config(&self, config: WatercolorConfig) {
        self.state.apply(config);
    }

    pub fn config(&self) -> Ref<'_, WatercolorConfig> {
        self.state.config.borrow()
    }

    /// Blooms as the scheduler will see them on the next tick.
    pub fn blooms(&self) -> Rc<[Bloom]> {
        self.state.blooms.borrow().clone()
    }

    /// Inactive overlays stay registered but are cleared and skipped.
    pub fn set_active(&self, active: bool) {
        self.state.active.set(active);
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state.active.get()
    }

    /// Explicit form of dropping the overlay.
    pub fn unmount(self) {}
}

impl Drop for Overlay {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.ctx.unregister(id);
            self.surface.clear();
        }
    }
}

impl std::fmt::Debug for Overlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Overlay")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .field("blooms", &self.state.blooms.borrow().len())
            .finish()
    }
}
