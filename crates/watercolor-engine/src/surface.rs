//! Drawing surfaces: the shared offscreen pixel buffer and the host-owned
//! visible surfaces it is copied onto.

use crate::coords::Rect;

/// Offscreen RGBA8 buffer, premultiplied alpha, row-major, no padding.
///
/// This is the one drawing surface every backend renders into.
#[derive(Debug, Clone, Default)]
pub struct PixelSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width as usize) * (height as usize) * 4],
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Reallocates to `width × height`. Returns `false` when already that size.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.width == width && self.height == height {
            return false;
        }
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels.resize((width as usize) * (height as usize) * 4, 0);
        true
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Premultiplied RGBA at `(x, y)`, or `None` outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + x as usize) * 4;
        self.pixels.get(i..i + 4).map(|p| [p[0], p[1], p[2], p[3]])
    }
}

/// Layout facts about a visible surface, as reported by the host.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SurfaceGeometry {
    /// Rendered (client) width in logical pixels.
    pub client_width: f32,
    /// Rendered (client) height in logical pixels.
    pub client_height: f32,
    /// Whether the surface is part of the live document/scene.
    pub attached: bool,
    /// Fixed-positioned surfaces count as attached.
    pub fixed: bool,
    /// Bounding box in viewport coordinates.
    pub bounds: Rect,
    pub device_pixel_ratio: f32,
}

impl SurfaceGeometry {
    /// Attached surface of the given client size placed at `(x, y)`, DPR 1.
    pub fn at(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            client_width: width,
            client_height: height,
            attached: true,
            fixed: false,
            bounds: Rect::new(x, y, width, height),
            device_pixel_ratio: 1.0,
        }
    }

    pub fn with_device_pixel_ratio(mut self, dpr: f32) -> Self {
        self.device_pixel_ratio = dpr;
        self
    }

    #[inline]
    pub fn has_area(&self) -> bool {
        self.client_width > 0.0 && self.client_height > 0.0
    }

    /// Backing-store size in physical pixels, at least 1×1.
    pub fn pixel_size(&self) -> (u32, u32) {
        let dpr = if self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0 {
            self.device_pixel_ratio
        } else {
            1.0
        };
        let w = (self.client_width * dpr).round().max(1.0) as u32;
        let h = (self.client_height * dpr).round().max(1.0) as u32;
        (w, h)
    }
}

/// A visible, host-owned surface one overlay paints into.
///
/// Methods take `&self`: surfaces are shared between the embedding UI and the
/// registry on a single thread, so implementations use interior mutability.
pub trait OverlaySurface {
    fn geometry(&self) -> SurfaceGeometry;

    /// Wipes the visible surface.
    fn clear(&self);

    /// Copies the shared offscreen result onto this surface, replacing its contents.
    fn present(&self, source: &PixelSurface);
}
