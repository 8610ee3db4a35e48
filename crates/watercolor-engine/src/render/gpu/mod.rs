//! GPU backend: one full-surface fragment program per overlay, read back into
//! the shared pixel surface.

mod common;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use wgpu::util::DeviceExt;

use crate::render::{BackendKind, RenderInput, RenderTarget, WatercolorBackend};
use crate::surface::PixelSurface;

use self::common::{
    premul_alpha_blend, PackedBlooms, ParamsHeader, QuadVertex, BLOOMS_OFFSET, COLORS_OFFSET,
    CUTOUTS_OFFSET, PARAMS_SIZE, QUAD_INDICES, QUAD_VERTICES,
};

use super::select::BackendProbe;

pub(crate) const WATERCOLOR_WGSL: &str = include_str!("shaders/watercolor.wgsl");

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Adapter/device profile for a GPU backend.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum GpuTier {
    /// Native backends, high-performance adapter, default limits.
    Primary,
    /// Any backend, low-power adapter, downlevel (WebGL2-class) limits.
    Compat,
}

impl GpuTier {
    pub const fn kind(self) -> BackendKind {
        match self {
            GpuTier::Primary => BackendKind::Gpu,
            GpuTier::Compat => BackendKind::GpuCompat,
        }
    }

    fn backends(self) -> wgpu::Backends {
        match self {
            GpuTier::Primary => wgpu::Backends::PRIMARY,
            GpuTier::Compat => wgpu::Backends::all(),
        }
    }

    fn power_preference(self) -> wgpu::PowerPreference {
        match self {
            GpuTier::Primary => wgpu::PowerPreference::HighPerformance,
            GpuTier::Compat => wgpu::PowerPreference::LowPower,
        }
    }

    fn limits(self) -> wgpu::Limits {
        match self {
            GpuTier::Primary => wgpu::Limits::default(),
            GpuTier::Compat => wgpu::Limits::downlevel_webgl2_defaults(),
        }
    }
}

/// Parses and validates the watercolor program before any device sees it.
///
/// Invalid WGSL otherwise surfaces as an uncaptured device error long after
/// backend selection has committed to this tier.
pub(crate) fn validate_wgsl(source: &str) -> Result<()> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| anyhow!("wgsl parse error: {}", e.emit_to_string(source)))?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .map_err(|e| anyhow!("wgsl validation error: {e:?}"))?;
    Ok(())
}

/// Runs `f` inside validation and out-of-memory error scopes.
///
/// A captured error becomes `Err` instead of reaching the uncaptured handler.
fn scoped<T>(device: &wgpu::Device, what: &str, f: impl FnOnce() -> T) -> Result<T> {
    let oom = device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let validation = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    let validation_err = pollster::block_on(validation.pop());
    let oom_err = pollster::block_on(oom.pop());
    match validation_err.or(oom_err) {
        Some(err) => Err(anyhow!("{what} rejected by device: {err}")),
        None => Ok(value),
    }
}

/// Largest extent within `max` on both axes, keeping the aspect ratio.
fn clamp_extent(width: u32, height: u32, max: u32) -> (u32, u32) {
    let longest = width.max(height);
    if max == 0 || longest <= max {
        return (width, height);
    }
    let scale = f64::from(max) / f64::from(longest);
    let w = ((f64::from(width) * scale).round() as u32).clamp(1, max);
    let h = ((f64::from(height) * scale).round() as u32).clamp(1, max);
    (w, h)
}

/// Size-dependent render texture plus its readback buffer.
///
/// May be smaller than the pixel surface when the device caps texture size;
/// readback then scales up to the surface.
struct OffscreenTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    readback: wgpu::Buffer,
    width: u32,
    height: u32,
    padded_bytes_per_row: u32,
}

struct PipelineParts {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    params_ubo: wgpu::Buffer,
}

/// Shader-based watercolor renderer.
pub struct GpuBackend {
    tier: GpuTier,
    device: wgpu::Device,
    queue: wgpu::Queue,

    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    params_ubo: wgpu::Buffer,

    quad_vbo: wgpu::Buffer,
    quad_ibo: wgpu::Buffer,

    target: Option<OffscreenTarget>,
    max_dimension: u32,
    device_pixel_ratio: f32,

    warned_clamp: bool,
    warned_failure: bool,
    disposed: bool,
}

impl GpuBackend {
    /// Requests an adapter and device for `tier` and builds the pipeline.
    ///
    /// Fails when no adapter matches, the device cannot be created, or the
    /// program or pipeline is rejected.
    pub fn new(tier: GpuTier) -> Result<Self> {
        validate_wgsl(WATERCOLOR_WGSL).context("watercolor shader rejected")?;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: tier.backends(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: tier.power_preference(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("watercolor device"),
            required_features: wgpu::Features::empty(),
            required_limits: tier.limits(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .context("failed to create wgpu device/queue")?;

        device.on_uncaptured_error(Arc::new(move |err: wgpu::Error| {
            log::warn!("watercolor {tier:?} device error: {err}");
        }));

        let info = adapter.get_info();
        log::debug!("watercolor {:?} adapter: {} ({:?})", tier, info.name, info.backend);

        let PipelineParts {
            pipeline,
            bind_group,
            params_ubo,
        } = scoped(&device, "watercolor pipeline", || Self::build_pipeline(&device))?;

        let quad_vbo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("watercolor quad vbo"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let quad_ibo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("watercolor quad ibo"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let max_dimension = device.limits().max_texture_dimension_2d;

        Ok(Self {
            tier,
            device,
            queue,
            pipeline,
            bind_group,
            params_ubo,
            quad_vbo,
            quad_ibo,
            target: None,
            max_dimension,
            device_pixel_ratio: 1.0,
            warned_clamp: false,
            warned_failure: false,
            disposed: false,
        })
    }

    #[inline]
    pub fn tier(&self) -> GpuTier {
        self.tier
    }

    /// Largest render texture edge the device accepts.
    #[inline]
    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    // ── private helpers ────────────────────────────────────────────────────

    fn build_pipeline(device: &wgpu::Device) -> PipelineParts {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("watercolor shader"),
            source: wgpu::ShaderSource::Wgsl(WATERCOLOR_WGSL.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("watercolor bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(PARAMS_SIZE),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("watercolor pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("watercolor pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[QuadVertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: Some(premul_alpha_blend()),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let params_ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("watercolor params ubo"),
            size: PARAMS_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("watercolor bind group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: params_ubo.as_entire_binding(),
            }],
        });

        PipelineParts {
            pipeline,
            bind_group,
            params_ubo,
        }
    }

    /// Makes sure a target for a `width × height` surface exists.
    ///
    /// The texture is clamped to the device limit.
    fn ensure_target(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            self.target = None;
            return Ok(());
        }
        let (tw, th) = clamp_extent(width, height, self.max_dimension);
        if (tw, th) != (width, height) && !self.warned_clamp {
            log::warn!(
                "watercolor {:?}: {width}x{height} exceeds max texture dimension {}, rendering at {tw}x{th}",
                self.tier,
                self.max_dimension
            );
            self.warned_clamp = true;
        }
        if self
            .target
            .as_ref()
            .is_some_and(|t| t.width == tw && t.height == th)
        {
            return Ok(());
        }

        self.target = None;
        let device = &self.device;
        let target = scoped(device, "watercolor target", || {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("watercolor target"),
                size: wgpu::Extent3d {
                    width: tw,
                    height: th,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: TARGET_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

            let padded_bytes_per_row = (tw * 4).next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
            let readback = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("watercolor readback"),
                size: u64::from(padded_bytes_per_row) * u64::from(th),
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            });

            OffscreenTarget {
                texture,
                view,
                readback,
                width: tw,
                height: th,
                padded_bytes_per_row,
            }
        })?;
        self.target = Some(target);
        Ok(())
    }

    fn write_params(&self, offscreen: &OffscreenTarget, input: &RenderInput<'_>, target: &mut RenderTarget<'_>) {
        let packed = PackedBlooms::pack(input.blooms, target.pool);
        let grain = input.grain;
        // Grain works in logical pixels; a clamped target has fewer of them per device pixel.
        let scale = offscreen.width as f32 / target.surface.width().max(1) as f32;

        let header = ParamsHeader {
            resolution: [offscreen.width as f32, offscreen.height as f32],
            time: input.time_s,
            bloom_count: packed.count,
            grain: [
                if grain.enabled { 1.0 } else { 0.0 },
                grain.effective_intensity(),
                grain.frequency,
                0.0,
            ],
            glow: [
                input.glow_strength.max(0.0),
                self.device_pixel_ratio * scale,
                0.0,
                0.0,
            ],
        };

        self.queue.write_buffer(&self.params_ubo, 0, bytemuck::bytes_of(&header));
        self.queue
            .write_buffer(&self.params_ubo, BLOOMS_OFFSET, bytemuck::cast_slice(&packed.blooms));
        self.queue
            .write_buffer(&self.params_ubo, COLORS_OFFSET, bytemuck::cast_slice(&packed.colors));
        self.queue
            .write_buffer(&self.params_ubo, CUTOUTS_OFFSET, bytemuck::cast_slice(&packed.cutouts));

        packed.release(target.pool);
    }

    fn submit_pass(&self, offscreen: &OffscreenTarget) {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("watercolor encoder"),
        });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("watercolor pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &offscreen.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &self.bind_group, &[]);
            rpass.set_vertex_buffer(0, self.quad_vbo.slice(..));
            rpass.set_index_buffer(self.quad_ibo.slice(..), wgpu::IndexFormat::Uint16);
            rpass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
        }

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &offscreen.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &offscreen.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(offscreen.padded_bytes_per_row),
                    rows_per_image: Some(offscreen.height),
                },
            },
            wgpu::Extent3d {
                width: offscreen.width,
                height: offscreen.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));
    }

    /// Maps the readback buffer and copies it into `surface`, nearest-sampling
    /// when the target was clamped.
    fn read_back(&self, offscreen: &OffscreenTarget, surface: &mut PixelSurface) -> Result<()> {
        let slice = offscreen.readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| anyhow!("wgpu poll failed: {e:?}"))?;
        rx.recv()
            .context("readback channel closed")?
            .map_err(|e| anyhow!("readback map failed: {e:?}"))?;

        {
            let mapped = slice.get_mapped_range();
            let (sw, sh) = (surface.width() as usize, surface.height() as usize);
            let (tw, th) = (offscreen.width as usize, offscreen.height as usize);
            let padded = offscreen.padded_bytes_per_row as usize;
            let out = surface.pixels_mut();

            for (y, dst_row) in out.chunks_exact_mut(sw * 4).enumerate() {
                let start = (y * th / sh) * padded;
                let src_row = &mapped[start..start + tw * 4];
                if tw == sw {
                    dst_row.copy_from_slice(src_row);
                    continue;
                }
                for (x, dst) in dst_row.chunks_exact_mut(4).enumerate() {
                    let sx = (x * tw / sw) * 4;
                    dst.copy_from_slice(&src_row[sx..sx + 4]);
                }
            }
        }
        offscreen.readback.unmap();
        Ok(())
    }

    fn render_frame(&mut self, input: &RenderInput<'_>, target: &mut RenderTarget<'_>) -> Result<()> {
        self.ensure_target(target.surface.width(), target.surface.height())?;
        let offscreen = self.target.as_ref().context("render target not allocated")?;

        scoped(&self.device, "watercolor pass", || {
            self.write_params(offscreen, input, target);
            self.submit_pass(offscreen);
        })?;
        self.read_back(offscreen, target.surface)
    }
}

impl WatercolorBackend for GpuBackend {
    fn kind(&self) -> BackendKind {
        self.tier.kind()
    }

    fn resize(&mut self, width: u32, height: u32, device_pixel_ratio: f32) {
        if self.disposed {
            return;
        }
        self.device_pixel_ratio = device_pixel_ratio;
        if let Err(e) = self.ensure_target(width, height) {
            log::warn!("watercolor {:?} resize to {width}x{height} failed: {e:#}", self.tier);
        }
    }

    fn render(&mut self, input: &RenderInput<'_>, target: &mut RenderTarget<'_>) {
        if self.disposed || target.surface.is_empty() {
            return;
        }
        if let Err(e) = self.render_frame(input, target) {
            if !self.warned_failure {
                log::warn!("watercolor {:?} frame failed: {e:#}", self.tier);
                self.warned_failure = true;
            }
            target.surface.clear();
        }
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        if let Some(target) = self.target.take() {
            target.readback.destroy();
            target.texture.destroy();
        }
        self.params_ubo.destroy();
        self.quad_vbo.destroy();
        self.quad_ibo.destroy();
        self.disposed = true;
        log::debug!("watercolor {:?} backend disposed", self.tier);
    }
}

impl Drop for GpuBackend {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Probe that brings up a [`GpuBackend`] for one tier.
#[derive(Debug, Copy, Clone)]
pub struct GpuProbe {
    tier: GpuTier,
}

impl GpuProbe {
    pub fn new(tier: GpuTier) -> Self {
        Self { tier }
    }
}

impl BackendProbe for GpuProbe {
    fn name(&self) -> &'static str {
        match self.tier {
            GpuTier::Primary => "gpu-primary",
            GpuTier::Compat => "gpu-compat",
        }
    }

    fn probe(&self) -> Result<Box<dyn WatercolorBackend>> {
        Ok(Box::new(GpuBackend::new(self.tier)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bloom::Bloom;
    use crate::config::GrainConfig;
    use crate::pool::BufferPool;

    /// Compat-tier backend, or `None` on machines without any adapter.
    fn compat_backend() -> Option<GpuBackend> {
        match GpuBackend::new(GpuTier::Compat) {
            Ok(b) => Some(b),
            Err(e) => {
                eprintln!("skipping: no compat GPU ({e:#})");
                None
            }
        }
    }

    fn centered_red() -> Bloom {
        Bloom {
            x: 0.5,
            y: 0.5,
            size: 0.5,
            rgb: [1.0, 0.0, 0.0],
            intensity: 1.0,
            ..Default::default()
        }
    }

    fn render_once(backend: &mut GpuBackend, width: u32, height: u32) -> PixelSurface {
        let mut surface = PixelSurface::new(width, height);
        let mut pool = BufferPool::new();
        let grain = GrainConfig::disabled();
        let blooms = [centered_red()];
        backend.resize(width, height, 1.0);
        let input = RenderInput::new(0.0, &blooms, &grain, 0.0);
        backend.render(&input, &mut RenderTarget::new(&mut surface, &mut pool));
        surface
    }

    #[test]
    fn watercolor_program_validates() {
        validate_wgsl(WATERCOLOR_WGSL).unwrap();
    }

    #[test]
    fn broken_program_is_rejected() {
        let err = validate_wgsl("fn fs_main( -> f32 {}").unwrap_err();
        assert!(format!("{err:#}").contains("parse"));
    }

    #[test]
    fn tiers_map_to_kinds() {
        assert_eq!(GpuTier::Primary.kind(), BackendKind::Gpu);
        assert_eq!(GpuTier::Compat.kind(), BackendKind::GpuCompat);
        assert_eq!(GpuProbe::new(GpuTier::Compat).name(), "gpu-compat");
    }

    #[test]
    fn extent_is_clamped_keeping_aspect() {
        assert_eq!(clamp_extent(100, 50, 2048), (100, 50));
        assert_eq!(clamp_extent(3000, 3000, 2048), (2048, 2048));
        assert_eq!(clamp_extent(2600, 64, 2048), (2048, 50));
        assert_eq!(clamp_extent(10, 9000, 2048), (2, 2048));
    }

    #[test]
    fn renders_centered_bloom() {
        let Some(mut backend) = compat_backend() else { return };
        let s = render_once(&mut backend, 32, 32);

        let center = s.pixel(16, 16).unwrap();
        assert!(center[3] > 200 && center[0] > 200, "center = {center:?}");
        assert_eq!(s.pixel(0, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn oversized_surface_renders_at_device_limit() {
        let Some(mut backend) = compat_backend() else { return };
        let max = backend.max_dimension();
        let (width, height) = (max + 552, 64);

        let s = render_once(&mut backend, width, height);

        let t = backend.target.as_ref().unwrap();
        assert!(t.width <= max && t.height <= max);
        assert!(s.pixel(width / 2, height / 2).unwrap()[3] > 200);
        assert_eq!(s.pixel(0, 0), Some([0, 0, 0, 0]));
        assert!(!backend.warned_failure);
    }

    #[test]
    fn device_rejection_becomes_an_error() {
        let Some(backend) = compat_backend() else { return };
        let err = scoped(&backend.device, "bad buffer", || {
            backend.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("bad buffer"),
                size: 16,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::UNIFORM,
                mapped_at_creation: false,
            })
        })
        .unwrap_err();
        assert!(format!("{err:#}").contains("bad buffer"));
    }
}
