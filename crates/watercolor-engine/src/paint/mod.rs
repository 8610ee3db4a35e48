//! Color handling shared by the bloom builder and the renderers.

pub mod color;

pub use color::Rgb;
