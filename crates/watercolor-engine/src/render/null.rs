use super::{BackendKind, RenderInput, RenderTarget, WatercolorBackend};

/// Backend of last resort. Leaves the shared surface transparent.
#[derive(Debug, Default)]
pub struct NullBackend;

impl NullBackend {
    pub fn new() -> Self {
        Self
    }
}

impl WatercolorBackend for NullBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Null
    }

    fn resize(&mut self, _width: u32, _height: u32, _device_pixel_ratio: f32) {}

    fn render(&mut self, _input: &RenderInput<'_>, target: &mut RenderTarget<'_>) {
        target.surface.clear();
    }

    fn dispose(&mut self) {}
}
