use std::time::{Duration, Instant};

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Milliseconds since the clock was created, the unit `FrameScheduler::tick` expects.
    pub now_ms: f64,

    /// Time elapsed since the previous tick, in seconds (clamped).
    pub dt: f32,

    /// Monotonic frame counter.
    pub frame_index: u64,
}

/// Produces `FrameTime` snapshots against a fixed origin.
///
/// `now_ms` is never clamped, so interval decisions in the scheduler see real
/// elapsed time. Only `dt` is clamped, keeping animation-style consumers stable
/// after a debugger pause or a stalled host.
#[derive(Debug, Clone)]
pub struct FrameClock {
    origin: Instant,
    last: Instant,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::with_clamps(Duration::from_micros(100), Duration::from_millis(250))
    }

    /// Creates a clock with custom delta-time clamps.
    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        let now = Instant::now();
        Self {
            origin: now,
            last: now,
            frame_index: 0,
            dt_min,
            dt_max,
        }
    }

    /// Advances the clock and returns a new `FrameTime`.
    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max);
        self.last = now;

        let ft = FrameTime {
            now_ms: now.saturating_duration_since(self.origin).as_secs_f64() * 1000.0,
            dt: dt.as_secs_f32(),
            frame_index: self.frame_index,
        };

        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }

    /// Milliseconds until the next tick is due for a host running at `interval_ms`.
    pub fn until_next(&self, interval_ms: f64) -> Duration {
        let spent = Instant::now().saturating_duration_since(self.last).as_secs_f64() * 1000.0;
        Duration::from_secs_f64(((interval_ms - spent).max(0.0)) / 1000.0)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
