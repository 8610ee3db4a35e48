//! Rendering backends.
//!
//! Every backend paints one overlay's blooms into the shared offscreen
//! [`PixelSurface`](crate::surface::PixelSurface). Backends are tried in a
//! fixed order and the first one that initializes wins:
//!
//! 1. GPU, primary adapter
//! 2. GPU, compatibility (downlevel limits, any backend)
//! 3. software radial gradients
//! 4. null (draws nothing)
//!
//! Convention:
//! - Bloom geometry is normalized to the unit square (top-left origin, +Y down).
//! - Output is premultiplied RGBA8.

mod ctx;
pub mod gpu;
mod null;
mod select;
pub mod software;

pub use ctx::{RenderInput, RenderTarget};
pub use gpu::{GpuBackend, GpuProbe, GpuTier};
pub use null::NullBackend;
pub use select::{default_probes, select_backend, BackendProbe};
pub use software::{SoftwareBackend, SoftwareProbe};

/// Which rendering path a backend implements.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BackendKind {
    Gpu,
    GpuCompat,
    Software,
    Null,
}

impl BackendKind {
    pub const fn name(self) -> &'static str {
        match self {
            BackendKind::Gpu => "gpu",
            BackendKind::GpuCompat => "gpu-compat",
            BackendKind::Software => "software",
            BackendKind::Null => "null",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A rendering path that can draw blooms into the shared surface.
///
/// Backends are owned by the shared renderer and driven serially from a single
/// thread; none of these calls may block on another overlay.
pub trait WatercolorBackend {
    fn kind(&self) -> BackendKind;

    /// Called whenever the shared surface changes size.
    fn resize(&mut self, width: u32, height: u32, device_pixel_ratio: f32);

    /// Replaces the contents of `target.surface` with one overlay's blooms.
    fn render(&mut self, input: &RenderInput<'_>, target: &mut RenderTarget<'_>);

    /// Releases backend resources. Further `render` calls draw nothing.
    fn dispose(&mut self);
}
