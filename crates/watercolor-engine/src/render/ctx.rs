use crate::bloom::Bloom;
use crate::config::GrainConfig;
use crate::pool::BufferPool;
use crate::surface::PixelSurface;

/// Per-overlay draw parameters for one render call.
///
/// Small and borrowed; built fresh by the scheduler for every overlay it paints.
#[derive(Debug, Copy, Clone)]
pub struct RenderInput<'a> {
    /// Seconds since the scheduler started; drives bleed drift and grain.
    pub time_s: f32,
    pub blooms: &'a [Bloom],
    pub grain: &'a GrainConfig,
    /// Additive glow strength; `0.0` disables the glow pass.
    pub glow_strength: f32,
}

impl<'a> RenderInput<'a> {
    #[inline]
    pub fn new(
        time_s: f32,
        blooms: &'a [Bloom],
        grain: &'a GrainConfig,
        glow_strength: f32,
    ) -> Self {
        Self {
            time_s,
            blooms,
            grain,
            glow_strength,
        }
    }
}

/// Target for drawing (shared offscreen surface + scratch buffer pool).
pub struct RenderTarget<'a> {
    pub surface: &'a mut PixelSurface,
    pub pool: &'a mut BufferPool,
}

impl<'a> RenderTarget<'a> {
    #[inline]
    pub fn new(surface: &'a mut PixelSurface, pool: &'a mut BufferPool) -> Self {
        Self { surface, pool }
    }
}
