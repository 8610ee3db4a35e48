//! CPU fallback: one radial gradient per bloom, an additive glow re-draw, and
//! per-block random grain.
//!
//! Output is deliberately not pixel-compatible with the GPU tiers. Shapes and
//! cutouts are ignored; every bloom is a soft disc.

use anyhow::Result;

use crate::bloom::Bloom;
use crate::config::GrainConfig;

use super::select::BackendProbe;
use super::{BackendKind, RenderInput, RenderTarget, WatercolorBackend};

/// Radial stops `(t, alpha)`; alpha is further multiplied by bloom intensity.
const GRADIENT_STOPS: [(f32, f32); 3] = [(0.0, 1.0), (0.55, 0.7), (1.0, 0.0)];

/// Glow disc radius relative to the bloom radius.
const GLOW_SPREAD: f32 = 1.35;
/// Glow alpha relative to `intensity × glow_strength`.
const GLOW_ALPHA: f32 = 0.35;

/// Grain block edge in physical pixels at frequency 1.
const GRAIN_BLOCK_PX: f32 = 3.0;
/// Grain pattern reseeds this many times per second.
const GRAIN_RATE_HZ: f32 = 24.0;

/// Deterministic 64-bit generator for grain (SplitMix64).
#[derive(Debug, Clone)]
struct Rng64 {
    state: u64,
}

impl Rng64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        // SplitMix64
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn next_f32_01(&mut self) -> f32 {
        // 24 bits of precision.
        ((self.next_u64() >> 40) as f32) * (1.0 / (1u32 << 24) as f32)
    }
}

fn gradient_alpha(t: f32) -> f32 {
    let mut prev = GRADIENT_STOPS[0];
    for &stop in &GRADIENT_STOPS[1..] {
        if t <= stop.0 {
            let span = stop.0 - prev.0;
            let k = if span > 0.0 { (t - prev.0) / span } else { 0.0 };
            return prev.1 + (stop.1 - prev.1) * k;
        }
        prev = stop;
    }
    0.0
}

/// Canvas-style software renderer.
#[derive(Debug)]
pub struct SoftwareBackend {
    device_pixel_ratio: f32,
    /// Premultiplied `f32` RGBA for the current surface size.
    accum: Vec<f32>,
    disposed: bool,
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self {
            device_pixel_ratio: 1.0,
            accum: Vec::new(),
            disposed: false,
        }
    }

    // ── private helpers ────────────────────────────────────────────────────

    /// Sizes the accumulator to `len` and zeroes it. Capacity follows the
    /// current surface, not the largest one ever seen.
    fn reset_accum(&mut self, len: usize) {
        self.accum.clear();
        self.accum.shrink_to(len);
        self.accum.resize(len, 0.0);
    }

    /// Paints one disc into the premultiplied `f32` accumulator.
    ///
    /// `additive` selects "lighter" compositing instead of source-over.
    #[allow(clippy::too_many_arguments)]
    fn fill_disc(
        accum: &mut [f32],
        width: u32,
        height: u32,
        center: (f32, f32),
        radius: f32,
        rgb: [f32; 3],
        alpha: f32,
        additive: bool,
    ) {
        if !(radius > 0.0) || !(alpha > 0.0) {
            return;
        }
        let (cx, cy) = center;
        let x0 = ((cx - radius).floor().max(0.0) as u32).min(width);
        let x1 = ((cx + radius).ceil().max(0.0) as u32).min(width);
        let y0 = ((cy - radius).floor().max(0.0) as u32).min(height);
        let y1 = ((cy + radius).ceil().max(0.0) as u32).min(height);

        for y in y0..y1 {
            let dy = y as f32 + 0.5 - cy;
            let row = (y as usize) * (width as usize);
            for x in x0..x1 {
                let dx = x as f32 + 0.5 - cx;
                let t = (dx * dx + dy * dy).sqrt() / radius;
                if t >= 1.0 {
                    continue;
                }
                let a = gradient_alpha(t) * alpha;
                let i = (row + x as usize) * 4;
                let px = &mut accum[i..i + 4];
                if additive {
                    px[0] += rgb[0] * a;
                    px[1] += rgb[1] * a;
                    px[2] += rgb[2] * a;
                    px[3] += a;
                } else {
                    let inv = 1.0 - a;
                    px[0] = rgb[0] * a + px[0] * inv;
                    px[1] = rgb[1] * a + px[1] * inv;
                    px[2] = rgb[2] * a + px[2] * inv;
                    px[3] = a + px[3] * inv;
                }
            }
        }
    }

    fn paint_blooms(
        accum: &mut [f32],
        width: u32,
        height: u32,
        blooms: &[Bloom],
        glow_strength: f32,
    ) {
        let (w, h) = (width as f32, height as f32);
        let paintable = blooms
            .iter()
            .filter(|b| b.rgb.iter().all(|c| c.is_finite()) && b.size.is_finite());

        for b in paintable.clone() {
            let rgb = b.rgb.map(|c| c.clamp(0.0, 1.0));
            let radius = b.size * 0.5 * h;
            Self::fill_disc(accum, width, height, (b.x * w, b.y * h), radius, rgb, b.intensity, false);
        }

        if glow_strength > 0.0 {
            for b in paintable {
                let rgb = b.rgb.map(|c| c.clamp(0.0, 1.0));
                let radius = b.size * 0.5 * h * GLOW_SPREAD;
                let alpha = b.intensity * glow_strength * GLOW_ALPHA;
                Self::fill_disc(accum, width, height, (b.x * w, b.y * h), radius, rgb, alpha, true);
            }
        }
    }

    /// Knocks alpha (and premultiplied color) down by a random amount per block.
    fn apply_grain(
        accum: &mut [f32],
        width: u32,
        height: u32,
        grain: &GrainConfig,
        time_s: f32,
        device_pixel_ratio: f32,
    ) {
        let intensity = grain.effective_intensity();
        if !(intensity > 0.0) {
            return;
        }
        let frequency = if grain.frequency > 0.0 { grain.frequency } else { 1.0 };
        let block = (GRAIN_BLOCK_PX * device_pixel_ratio.max(1.0) / frequency)
            .round()
            .max(1.0) as u32;

        let frame = (time_s.max(0.0) * GRAIN_RATE_HZ).floor() as u64;
        let mut rng = Rng64::new(frame);

        for by in (0..height).step_by(block as usize) {
            for bx in (0..width).step_by(block as usize) {
                let keep = 1.0 - intensity * rng.next_f32_01();
                for y in by..(by + block).min(height) {
                    let row = (y as usize) * (width as usize);
                    for x in bx..(bx + block).min(width) {
                        let i = (row + x as usize) * 4;
                        accum[i..i + 4].iter_mut().for_each(|c| *c *= keep);
                    }
                }
            }
        }
    }
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl WatercolorBackend for SoftwareBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn resize(&mut self, width: u32, height: u32, device_pixel_ratio: f32) {
        self.reset_accum((width as usize) * (height as usize) * 4);
        self.device_pixel_ratio = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            1.0
        };
    }

    fn render(&mut self, input: &RenderInput<'_>, target: &mut RenderTarget<'_>) {
        if self.disposed || target.surface.is_empty() {
            return;
        }
        let (width, height) = (target.surface.width(), target.surface.height());
        let len = (width as usize) * (height as usize) * 4;
        if self.accum.len() == len {
            self.accum.fill(0.0);
        } else {
            self.reset_accum(len);
        }
        let accum = &mut self.accum;

        Self::paint_blooms(accum, width, height, input.blooms, input.glow_strength);
        if input.grain.enabled {
            Self::apply_grain(
                accum,
                width,
                height,
                input.grain,
                input.time_s,
                self.device_pixel_ratio,
            );
        }

        for (dst, src) in target.surface.pixels_mut().chunks_exact_mut(4).zip(accum.chunks_exact(4)) {
            let a = if src[3].is_finite() { src[3].clamp(0.0, 1.0) } else { 0.0 };
            for c in 0..3 {
                dst[c] = (src[c].clamp(0.0, a) * 255.0).round() as u8;
            }
            dst[3] = (a * 255.0).round() as u8;
        }
    }

    fn dispose(&mut self) {
        self.accum = Vec::new();
        self.disposed = true;
    }
}

/// Always succeeds; the software path has no external requirements.
#[derive(Debug, Default, Copy, Clone)]
pub struct SoftwareProbe;

impl BackendProbe for SoftwareProbe {
    fn name(&self) -> &'static str {
        "software"
    }

    fn probe(&self) -> Result<Box<dyn WatercolorBackend>> {
        Ok(Box::new(SoftwareBackend::new()))
    }
}
