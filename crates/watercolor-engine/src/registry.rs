//! Registered overlays and the visibility predicate that culls them.

use std::fmt;
use std::rc::Rc;

use crate::bloom::Bloom;
use crate::config::GrainConfig;
use crate::coords::Rect;
use crate::surface::{OverlaySurface, SurfaceGeometry};

/// Registry-assigned handle. Never reused within one registry.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct OverlayId(u64);

impl OverlayId {
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "overlay#{}", self.0)
    }
}

/// One live overlay as seen by the scheduler.
///
/// Accessors are read on every tick, so they must be cheap: they read values the
/// overlay prepared when its configuration last changed.
pub struct OverlayRegistration {
    pub surface: Rc<dyn OverlaySurface>,
    pub blooms: Box<dyn Fn() -> Rc<[Bloom]>>,
    pub grain: Box<dyn Fn() -> GrainConfig>,
    pub glow_strength: Box<dyn Fn() -> f32>,
    pub active: Box<dyn Fn() -> bool>,
}

impl OverlayRegistration {
    /// Wipes the overlay's visible surface.
    #[inline]
    pub fn clear(&self) {
        self.surface.clear();
    }

    #[inline]
    pub fn geometry(&self) -> SurfaceGeometry {
        self.surface.geometry()
    }
}

impl fmt::Debug for OverlayRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayRegistration")
            .field("geometry", &self.surface.geometry())
            .finish_non_exhaustive()
    }
}

/// Decides whether a surface is worth drawing this tick.
pub trait VisibilityPolicy {
    fn is_renderable(&self, geometry: &SurfaceGeometry, viewport: Rect) -> bool;
}

/// Nonzero client size, attached (or fixed), and overlapping the viewport.
#[derive(Debug, Default, Copy, Clone)]
pub struct ViewportVisibility;

impl VisibilityPolicy for ViewportVisibility {
    fn is_renderable(&self, geometry: &SurfaceGeometry, viewport: Rect) -> bool {
        geometry.has_area()
            && (geometry.attached || geometry.fixed)
            && geometry.bounds.intersects(viewport)
    }
}

/// Ordered set of registrations. Iteration order is registration order.
#[derive(Debug, Default)]
pub struct OverlayRegistry {
    entries: Vec<(OverlayId, Rc<OverlayRegistration>)>,
    next_id: u64,
}

impl OverlayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, registration: OverlayRegistration) -> OverlayId {
        self.next_id += 1;
        let id = OverlayId(self.next_id);
        self.entries.push((id, Rc::new(registration)));
        id
    }

    /// Removes `id`. Returns `false` when it was not registered.
    pub fn unregister(&mut self, id: OverlayId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    /// Drops every registration. Ids are not reused afterwards.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Cheap copy of the current entries, safe to iterate while callbacks run.
    pub fn snapshot(&self) -> Vec<(OverlayId, Rc<OverlayRegistration>)> {
        self.entries.clone()
    }

    pub fn contains(&self, id: OverlayId) -> bool {
        self.entries.iter().any(|(entry, _)| *entry == id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
