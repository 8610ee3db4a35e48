//! Host-page geometry used for visibility culling.
//!
//! Canonical space is the host's logical (CSS-like) pixels:
//! - origin top-left of the viewport
//! - +X right, +Y down

mod rect;
mod vec2;

pub use rect::Rect;
pub use vec2::Vec2;
