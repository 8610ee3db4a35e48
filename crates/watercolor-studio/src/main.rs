//! Headless watercolor driver.
//!
//! Mounts a grid of overlays on in-memory surfaces, drives the shared frame
//! loop from a `FrameClock`, simulates a drag halfway through, and reports what
//! the scheduler did.
//!
//! Environment:
//! - `WATERCOLOR_OVERLAYS`: overlay count (default 24)
//! - `WATERCOLOR_SECONDS`: run time (default 3)
//! - `WATERCOLOR_BACKEND`: `software` skips the GPU probes
//! - `WATERCOLOR_PREFS`: JSON preference file for the drag-degrade opt-out
//! - `RUST_LOG`: log filter (default `info`)

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::{Context, Result};

use watercolor_engine::coords::Rect;
use watercolor_engine::logging::{init_logging, LoggingConfig};
use watercolor_engine::render::{default_probes, BackendProbe, SoftwareProbe};
use watercolor_engine::time::FrameClock;
use watercolor_engine::{
    FrameHost, JsonFilePreferenceStore, MemoryPreferenceStore, Overlay, OverlaySurface,
    PixelSurface, PreferenceStore, SurfaceGeometry, WatercolorConfig, WatercolorContext,
};

const PRESETS: &str = include_str!("../presets/watercolor.json");

const VIEWPORT: Rect = Rect::from_size(1280.0, 720.0);
const CARD_W: f32 = 120.0;
const CARD_H: f32 = 168.0;
const GAP: f32 = 12.0;

// ── host ──────────────────────────────────────────────────────────────────

/// Frame host backed by a flag the main loop polls.
struct HeadlessHost {
    pending: Cell<bool>,
}

impl HeadlessHost {
    fn take_pending(&self) -> bool {
        self.pending.replace(false)
    }
}

impl FrameHost for HeadlessHost {
    fn request_frame(&self) {
        self.pending.set(true);
    }

    fn cancel_frame(&self) {
        self.pending.set(false);
    }

    fn viewport(&self) -> Rect {
        VIEWPORT
    }
}

// ── surface ───────────────────────────────────────────────────────────────

/// Visible surface that keeps a copy of the last presented frame.
struct MemorySurface {
    geometry: SurfaceGeometry,
    pixels: RefCell<PixelSurface>,
    presents: Cell<u64>,
}

impl MemorySurface {
    fn new(geometry: SurfaceGeometry) -> Self {
        let (w, h) = geometry.pixel_size();
        Self {
            geometry,
            pixels: RefCell::new(PixelSurface::new(w, h)),
            presents: Cell::new(0),
        }
    }

    /// Fraction of pixels with any coverage.
    fn coverage(&self) -> f32 {
        let pixels = self.pixels.borrow();
        let total = pixels.pixels().len() / 4;
        if total == 0 {
            return 0.0;
        }
        let covered = pixels.pixels().chunks_exact(4).filter(|p| p[3] > 0).count();
        covered as f32 / total as f32
    }
}

impl OverlaySurface for MemorySurface {
    fn geometry(&self) -> SurfaceGeometry {
        self.geometry
    }

    fn clear(&self) {
        self.pixels.borrow_mut().clear();
    }

    fn present(&self, source: &PixelSurface) {
        let mut dst = self.pixels.borrow_mut();
        dst.resize(source.width(), source.height());
        dst.pixels_mut().copy_from_slice(source.pixels());
        self.presents.set(self.presents.get() + 1);
    }
}

// ── setup ─────────────────────────────────────────────────────────────────

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn load_presets() -> Result<Vec<WatercolorConfig>> {
    let presets: Vec<WatercolorConfig> =
        serde_json::from_str(PRESETS).context("failed to parse watercolor presets")?;
    anyhow::ensure!(!presets.is_empty(), "no watercolor presets");
    Ok(presets)
}

fn preference_store() -> Result<Box<dyn PreferenceStore>> {
    match std::env::var("WATERCOLOR_PREFS") {
        Ok(path) => Ok(Box::new(
            JsonFilePreferenceStore::open(&path)
                .with_context(|| format!("failed to open preferences {path}"))?,
        )),
        Err(_) => Ok(Box::new(MemoryPreferenceStore::new())),
    }
}

fn probes() -> Vec<Box<dyn BackendProbe>> {
    match std::env::var("WATERCOLOR_BACKEND").as_deref() {
        Ok("software") => vec![Box::new(SoftwareProbe)],
        _ => default_probes(),
    }
}

/// Lays cards out left to right; the grid deliberately overflows the viewport
/// once the count is large, so some overlays are culled.
fn card_geometry(index: usize) -> SurfaceGeometry {
    let per_row = ((VIEWPORT.size.x + GAP) / (CARD_W + GAP)).floor().max(1.0) as usize;
    let col = (index % per_row) as f32;
    let row = (index / per_row) as f32;
    SurfaceGeometry::at(
        GAP + col * (CARD_W + GAP),
        GAP + row * (CARD_H + GAP),
        CARD_W,
        CARD_H,
    )
}

// ── main ──────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let overlay_count: usize = env_or("WATERCOLOR_OVERLAYS", 24);
    let seconds: f64 = env_or("WATERCOLOR_SECONDS", 3.0);
    let presets = load_presets()?;

    let host = Rc::new(HeadlessHost {
        pending: Cell::new(false),
    });
    let ctx = WatercolorContext::builder(host.clone())
        .probes(probes())
        .preferences(preference_store()?)
        .build();

    let surfaces: Vec<Rc<MemorySurface>> = (0..overlay_count)
        .map(|i| Rc::new(MemorySurface::new(card_geometry(i))))
        .collect();
    let overlays: Vec<Overlay> = surfaces
        .iter()
        .enumerate()
        .map(|(i, s)| Overlay::mount(&ctx, presets[i % presets.len()].clone(), s.clone()))
        .collect();

    log::info!(
        "mounted {} overlays ({} presets), running {seconds:.1}s",
        overlays.len(),
        presets.len()
    );

    let run_ms = seconds * 1000.0;
    let drag = (run_ms * 0.4)..(run_ms * 0.7);
    let mut clock = FrameClock::new();
    let interval_ms = host.native_frame_interval_ms();

    loop {
        let ft = clock.tick();
        if ft.now_ms >= run_ms {
            break;
        }
        ctx.set_interaction_degraded(drag.contains(&ft.now_ms));
        if host.take_pending() {
            ctx.tick(ft.now_ms);
        }
        std::thread::sleep(clock.until_next(interval_ms));
    }
    ctx.set_interaction_degraded(false);

    let stats = ctx.stats();
    let backend = ctx
        .backend_kind()
        .map_or_else(|| "none".to_string(), |k| k.to_string());
    let drawn = surfaces.iter().filter(|s| s.presents.get() > 0).count();
    let coverage = surfaces.first().map_or(0.0, |s| s.coverage());

    println!();
    println!("  watercolor studio");
    println!("  ─────────────────────────────────────");
    println!("  backend          {backend}");
    println!("  overlays         {overlay_count} ({drawn} ever drawn)");
    println!("  ticks            {}", stats.ticks);
    println!("  rendered frames  {}", stats.rendered_frames);
    println!("  overlay draws    {}", stats.overlay_draws);
    println!("  culled / capped  {} / {}", stats.culled, stats.capped);
    println!("  last interval    {} ms", stats.last_interval_ms);
    println!("  first coverage   {:.1}%", coverage * 100.0);
    println!();

    drop(overlays);
    ctx.tick(clock.tick().now_ms);
    log::info!("loop {:?}, shared renderer {:?}", ctx.state(), ctx.shared_generation());

    Ok(())
}
