//! The one backend + offscreen surface every overlay renders through.

use crate::pool::{BufferPool, DEFAULT_MAX_PER_LEN};
use crate::render::{
    default_probes, select_backend, BackendKind, BackendProbe, RenderInput, RenderTarget,
    WatercolorBackend,
};
use crate::surface::PixelSurface;

/// A live backend bound to the shared offscreen surface.
///
/// Overlays take turns: resize (only when the pixel size differs from the
/// previous overlay's), render, then copy [`surface`](Self::surface) out.
pub struct SharedRenderer {
    backend: Box<dyn WatercolorBackend>,
    surface: PixelSurface,
    pool: BufferPool,
    generation: u64,
    resize_count: u64,
}

impl SharedRenderer {
    fn new(backend: Box<dyn WatercolorBackend>, generation: u64, pool: BufferPool) -> Self {
        Self {
            backend,
            surface: PixelSurface::default(),
            pool,
            generation,
            resize_count: 0,
        }
    }

    /// Resizes surface and backend when `width × height` differs from the
    /// current size. Returns whether a resize happened.
    pub fn resize_if_needed(&mut self, width: u32, height: u32, device_pixel_ratio: f32) -> bool {
        if !self.surface.resize(width, height) {
            return false;
        }
        self.backend.resize(width, height, device_pixel_ratio);
        self.resize_count += 1;
        log::trace!("shared surface resized to {width}x{height}");
        true
    }

    /// Renders one overlay's blooms into the shared surface and returns it.
    pub fn render(&mut self, input: &RenderInput<'_>) -> &PixelSurface {
        let mut target = RenderTarget::new(&mut self.surface, &mut self.pool);
        self.backend.render(input, &mut target);
        &self.surface
    }

    #[inline]
    pub fn surface(&self) -> &PixelSurface {
        &self.surface
    }

    #[inline]
    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Identity of this instance; changes every time the slot rebuilds.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Number of resizes since construction.
    #[inline]
    pub fn resize_count(&self) -> u64 {
        self.resize_count
    }

    fn dispose(&mut self) {
        self.backend.dispose();
        self.pool.clear();
        self.surface.resize(0, 0);
    }
}

/// Lazily constructed, explicitly released [`SharedRenderer`].
///
/// Backend selection runs once per construction; a released slot runs it
/// again on the next [`get`](Self::get).
pub struct SharedRendererSlot {
    current: Option<SharedRenderer>,
    next_generation: u64,
    probes: Vec<Box<dyn BackendProbe>>,
    pool_max_per_len: usize,
}

impl SharedRendererSlot {
    pub fn new(probes: Vec<Box<dyn BackendProbe>>) -> Self {
        Self {
            current: None,
            next_generation: 1,
            probes,
            pool_max_per_len: DEFAULT_MAX_PER_LEN,
        }
    }

    /// Bounds the scratch pool of every renderer this slot builds.
    pub fn with_pool_max_per_len(mut self, max_per_len: usize) -> Self {
        self.pool_max_per_len = max_per_len;
        self
    }

    /// Returns the live renderer, constructing it on first use.
    pub fn get(&mut self) -> &mut SharedRenderer {
        let probes = &self.probes;
        let next_generation = &mut self.next_generation;
        let pool_max_per_len = self.pool_max_per_len;
        self.current.get_or_insert_with(|| {
            let generation = *next_generation;
            *next_generation += 1;
            let backend = select_backend(probes);
            log::debug!("shared renderer #{generation} created ({})", backend.kind());
            SharedRenderer::new(backend, generation, BufferPool::with_max_per_len(pool_max_per_len))
        })
    }

    /// Disposes the live renderer, if any.
    pub fn release(&mut self) {
        if let Some(mut renderer) = self.current.take() {
            renderer.dispose();
            log::debug!("shared renderer #{} released", renderer.generation);
        }
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&SharedRenderer> {
        self.current.as_ref()
    }

    pub fn current_generation(&self) -> Option<u64> {
        self.current.as_ref().map(SharedRenderer::generation)
    }
}

impl Default for SharedRendererSlot {
    fn default() -> Self {
        Self::new(default_probes())
    }
}

impl Drop for SharedRendererSlot {
    fn drop(&mut self) {
        self.release();
    }
}
