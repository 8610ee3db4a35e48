//! Fakes for host, surfaces and backends shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::Result;

use crate::coords::Rect;
use crate::render::{BackendKind, BackendProbe, RenderInput, RenderTarget, WatercolorBackend};
use crate::scheduler::FrameHost;
use crate::surface::{OverlaySurface, PixelSurface, SurfaceGeometry};

pub(crate) struct FakeHost {
    pub viewport: Cell<Rect>,
    pub native_interval_ms: f64,
    pub requests: Cell<u32>,
    pub cancels: Cell<u32>,
}

impl FakeHost {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            viewport: Cell::new(Rect::from_size(1000.0, 1000.0)),
            native_interval_ms: 1000.0 / 60.0,
            requests: Cell::new(0),
            cancels: Cell::new(0),
        })
    }
}

impl FrameHost for FakeHost {
    fn request_frame(&self) {
        self.requests.set(self.requests.get() + 1);
    }

    fn cancel_frame(&self) {
        self.cancels.set(self.cancels.get() + 1);
    }

    fn viewport(&self) -> Rect {
        self.viewport.get()
    }

    fn native_frame_interval_ms(&self) -> f64 {
        self.native_interval_ms
    }
}

pub(crate) struct FakeSurface {
    pub geometry: Cell<SurfaceGeometry>,
    pub clears: Cell<u32>,
    pub presents: Cell<u32>,
    pub last_size: Cell<(u32, u32)>,
}

impl FakeSurface {
    pub fn sized(width: f32, height: f32) -> Rc<Self> {
        Rc::new(Self {
            geometry: Cell::new(SurfaceGeometry::at(10.0, 10.0, width, height)),
            clears: Cell::new(0),
            presents: Cell::new(0),
            last_size: Cell::new((0, 0)),
        })
    }
}

impl OverlaySurface for FakeSurface {
    fn geometry(&self) -> SurfaceGeometry {
        self.geometry.get()
    }

    fn clear(&self) {
        self.clears.set(self.clears.get() + 1);
    }

    fn present(&self, source: &PixelSurface) {
        self.presents.set(self.presents.get() + 1);
        self.last_size.set((source.width(), source.height()));
    }
}

/// What a backend was asked to draw.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Recorded {
    pub bloom_count: usize,
    pub grain_intensity: f32,
    pub grain_frequency: f32,
    pub glow_strength: f32,
    pub size: (u32, u32),
}

#[derive(Default)]
pub(crate) struct Journal {
    pub renders: RefCell<Vec<Recorded>>,
    pub resizes: Cell<u32>,
    pub disposes: Cell<u32>,
    pub probes: Cell<u32>,
}

struct RecordingBackend {
    journal: Rc<Journal>,
}

impl WatercolorBackend for RecordingBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn resize(&mut self, _width: u32, _height: u32, _device_pixel_ratio: f32) {
        self.journal.resizes.set(self.journal.resizes.get() + 1);
    }

    fn render(&mut self, input: &RenderInput<'_>, target: &mut RenderTarget<'_>) {
        self.journal.renders.borrow_mut().push(Recorded {
            bloom_count: input.blooms.len(),
            grain_intensity: input.grain.effective_intensity(),
            grain_frequency: input.grain.frequency,
            glow_strength: input.glow_strength,
            size: (target.surface.width(), target.surface.height()),
        });
    }

    fn dispose(&mut self) {
        self.journal.disposes.set(self.journal.disposes.get() + 1);
    }
}

pub(crate) struct RecordingProbe {
    pub journal: Rc<Journal>,
}

impl RecordingProbe {
    pub fn new() -> (Box<dyn BackendProbe>, Rc<Journal>) {
        let journal = Rc::new(Journal::default());
        (Box::new(Self { journal: journal.clone() }), journal)
    }
}

impl BackendProbe for RecordingProbe {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn probe(&self) -> Result<Box<dyn WatercolorBackend>> {
        self.journal.probes.set(self.journal.probes.get() + 1);
        Ok(Box::new(RecordingBackend {
            journal: self.journal.clone(),
        }))
    }
}
