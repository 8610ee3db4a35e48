//! The single frame loop shared by every overlay.
//!
//! The host drives it: `request_frame` asks for one callback, which the host
//! answers by calling the context's `tick(now_ms)`. One tick culls, picks a
//! target interval, and (when due) paints each renderable overlay in turn
//! through the shared renderer.

use std::rc::Rc;

use crate::config::GrainConfig;
use crate::coords::Rect;
use crate::registry::{OverlayId, OverlayRegistration, VisibilityPolicy};
use crate::render::RenderInput;
use crate::shared::SharedRendererSlot;

/// Default native refresh interval (60 Hz).
pub const DEFAULT_FRAME_INTERVAL_MS: f64 = 1000.0 / 60.0;

/// Host-side frame plumbing.
pub trait FrameHost {
    /// Schedules one future `tick`. Repeated requests before it fires coalesce.
    fn request_frame(&self);

    /// Withdraws any pending request.
    fn cancel_frame(&self);

    /// Current viewport in the same coordinates as surface bounds.
    fn viewport(&self) -> Rect;

    /// Interval between host frames when nothing throttles.
    fn native_frame_interval_ms(&self) -> f64 {
        DEFAULT_FRAME_INTERVAL_MS
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SchedulerState {
    /// No registrations, no frame requested.
    Idle,
    /// At least one registration and a frame is requested.
    Running,
}

/// Load thresholds and degrade factors.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Renderable count at which the loop drops to `busy_fps`.
    pub busy_threshold: usize,
    pub busy_fps: f64,

    /// Renderable count at which the loop drops to `crowded_fps`.
    pub crowded_threshold: usize,
    pub crowded_fps: f64,

    /// Frame-rate ceiling while drag-degrade is active.
    pub degraded_fps: f64,
    /// Overlays painted per tick while drag-degrade is active.
    pub degraded_max_overlays: usize,

    pub degraded_grain_intensity: f32,
    pub degraded_grain_frequency: f32,
    pub degraded_glow: f32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            busy_threshold: 20,
            busy_fps: 30.0,
            crowded_threshold: 40,
            crowded_fps: 24.0,
            degraded_fps: 22.0,
            degraded_max_overlays: 18,
            degraded_grain_intensity: 0.55,
            degraded_grain_frequency: 0.85,
            degraded_glow: 0.45,
        }
    }
}

impl SchedulerConfig {
    /// Target interval for `renderable` visible overlays, before degrade.
    pub fn target_interval_ms(&self, renderable: usize, native_interval_ms: f64) -> f64 {
        if renderable >= self.crowded_threshold {
            1000.0 / self.crowded_fps
        } else if renderable >= self.busy_threshold {
            1000.0 / self.busy_fps
        } else {
            native_interval_ms
        }
    }

    #[inline]
    pub fn degraded_interval_ms(&self) -> f64 {
        1000.0 / self.degraded_fps
    }
}

/// Running counters, for diagnostics.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct SchedulerStats {
    /// Ticks handled while Running.
    pub ticks: u64,
    /// Ticks that painted (interval elapsed).
    pub rendered_frames: u64,
    /// Individual overlay paints.
    pub overlay_draws: u64,
    /// Overlays cleared because they were inactive or not visible.
    pub culled: u64,
    /// Overlays cleared by the drag-degrade cap.
    pub capped: u64,
    /// Renderable count on the most recent tick, after the cap.
    pub last_renderable: usize,
    /// Interval chosen on the most recent tick.
    pub last_interval_ms: u64,
}

/// Everything one tick reads besides the scheduler itself.
pub struct TickInputs<'a> {
    pub now_ms: f64,
    pub entries: &'a [(OverlayId, Rc<OverlayRegistration>)],
    pub host: &'a dyn FrameHost,
    pub visibility: &'a dyn VisibilityPolicy,
    pub degraded: bool,
}

#[derive(Debug)]
pub struct FrameScheduler {
    config: SchedulerConfig,
    state: SchedulerState,
    started_ms: Option<f64>,
    last_render_ms: Option<f64>,
    stats: SchedulerStats,
}

impl FrameScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            state: SchedulerState::Idle,
            started_ms: None,
            last_render_ms: None,
            stats: SchedulerStats::default(),
        }
    }

    #[inline]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    #[inline]
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    #[inline]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Idle → Running, requesting the first frame. No-op when already running.
    pub fn ensure_running(&mut self, host: &dyn FrameHost) {
        if self.state == SchedulerState::Running {
            return;
        }
        self.state = SchedulerState::Running;
        log::debug!("frame loop started");
        host.request_frame();
    }

    /// Running → Idle immediately, without waiting for an empty tick.
    pub fn stop(&mut self, host: &dyn FrameHost, slot: &mut SharedRendererSlot) {
        if self.state == SchedulerState::Running {
            self.go_idle(host, slot);
        }
    }

    /// Handles one host frame.
    pub fn tick(&mut self, inputs: TickInputs<'_>, slot: &mut SharedRendererSlot) {
        // A stale callback can land after the loop went idle.
        if self.state == SchedulerState::Idle {
            return;
        }
        self.stats.ticks += 1;

        if inputs.entries.is_empty() {
            self.go_idle(inputs.host, slot);
            return;
        }

        let viewport = inputs.host.viewport();
        let mut renderable: Vec<&OverlayRegistration> = Vec::with_capacity(inputs.entries.len());
        for (_, reg) in inputs.entries {
            if (reg.active)() && inputs.visibility.is_renderable(&reg.geometry(), viewport) {
                renderable.push(reg);
            } else {
                reg.clear();
                self.stats.culled += 1;
            }
        }

        let mut interval =
            self.config.target_interval_ms(renderable.len(), inputs.host.native_frame_interval_ms());

        if inputs.degraded {
            interval = interval.max(self.config.degraded_interval_ms());
            let cap = self.config.degraded_max_overlays;
            if renderable.len() > cap {
                for reg in renderable.drain(cap..) {
                    reg.clear();
                    self.stats.capped += 1;
                }
            }
        }

        self.stats.last_renderable = renderable.len();
        self.stats.last_interval_ms = interval.round() as u64;

        let started = *self.started_ms.get_or_insert(inputs.now_ms);
        let due = self
            .last_render_ms
            .is_none_or(|last| inputs.now_ms - last >= interval);

        if due {
            self.last_render_ms = Some(inputs.now_ms);
            let time_s = ((inputs.now_ms - started) / 1000.0) as f32;
            self.paint(&renderable, time_s, inputs.degraded, slot);
        }

        inputs.host.request_frame();
    }

    // ── private helpers ────────────────────────────────────────────────────

    fn paint(
        &mut self,
        renderable: &[&OverlayRegistration],
        time_s: f32,
        degraded: bool,
        slot: &mut SharedRendererSlot,
    ) {
        self.stats.rendered_frames += 1;
        if renderable.is_empty() {
            return;
        }

        let renderer = slot.get();
        for reg in renderable {
            let geometry = reg.geometry();
            let (width, height) = geometry.pixel_size();
            renderer.resize_if_needed(width, height, geometry.device_pixel_ratio);

            let blooms = (reg.blooms)();
            let mut grain: GrainConfig = (reg.grain)();
            let mut glow = (reg.glow_strength)();
            if degraded {
                grain = grain.scaled(
                    self.config.degraded_grain_intensity,
                    self.config.degraded_grain_frequency,
                );
                glow *= self.config.degraded_glow;
            }

            let input = RenderInput::new(time_s, &blooms, &grain, glow);
            let pixels = renderer.render(&input);
            reg.surface.present(pixels);
            self.stats.overlay_draws += 1;
        }

        if self.stats.rendered_frames % 300 == 0 {
            log::debug!("watercolor stats: {:?}", self.stats);
        }
    }

    fn go_idle(&mut self, host: &dyn FrameHost, slot: &mut SharedRendererSlot) {
        self.state = SchedulerState::Idle;
        self.started_ms = None;
        self.last_render_ms = None;
        host.cancel_frame();
        slot.release();
        log::debug!("frame loop idle; shared renderer released");
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}
