//! Watercolor engine crate.
//!
//! Renders soft, grainy "watercolor" blooms behind many independent UI
//! surfaces at once through a single shared renderer and one frame loop.
//!
//! Layering:
//! - `config` / `bloom`: declarative input and its renderer-ready form.
//! - `render` / `shared`: backends (GPU, compat GPU, software, null) and the one
//!   live instance every overlay draws through.
//! - `registry` / `scheduler` / `degrade`: which overlays paint, when, and at
//!   what quality.
//! - `context` / `overlay`: the host-facing surface of the crate.

pub mod logging;
pub mod time;
pub mod coords;
pub mod paint;

pub mod config;
pub mod bloom;
pub mod pool;
pub mod surface;
pub mod render;
pub mod shared;
pub mod registry;
pub mod degrade;
pub mod scheduler;
pub mod context;
pub mod overlay;

#[cfg(test)]
mod test_support;

pub use bloom::{build_blooms, Bloom, BloomShape, MAX_BLOOMS};
pub use config::{ConfigError, GrainConfig, SplotchConfig, SplotchShape, WatercolorConfig};
pub use context::{ContextBuilder, ContextConfig, WatercolorContext};
pub use degrade::{JsonFilePreferenceStore, MemoryPreferenceStore, PreferenceError, PreferenceStore};
pub use overlay::Overlay;
pub use render::BackendKind;
pub use scheduler::{FrameHost, SchedulerConfig, SchedulerState, SchedulerStats};
pub use surface::{OverlaySurface, PixelSurface, SurfaceGeometry};
