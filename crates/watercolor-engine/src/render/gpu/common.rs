//! Shared GPU types: quad geometry, blend state, and the uniform layout.

use bytemuck::{Pod, Zeroable};

use crate::bloom::{Bloom, MAX_BLOOMS};
use crate::pool::BufferPool;

// ── blend ─────────────────────────────────────────────────────────────────

pub(super) fn premul_alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

// ── quad vertex ───────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct QuadVertex {
    pub pos: [f32; 2], // 0..1
}

impl QuadVertex {
    const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    pub(super) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

pub(super) const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex { pos: [0.0, 0.0] },
    QuadVertex { pos: [1.0, 0.0] },
    QuadVertex { pos: [1.0, 1.0] },
    QuadVertex { pos: [0.0, 1.0] },
];

pub(super) const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

// ── params uniform ────────────────────────────────────────────────────────

/// Scalar head of the `Params` uniform; the three bloom arrays follow it.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct ParamsHeader {
    pub resolution: [f32; 2],
    pub time: f32,
    pub bloom_count: u32,
    pub grain: [f32; 4], // enabled, intensity, frequency, _
    pub glow: [f32; 4],  // strength, device pixel ratio, _, _
}

/// Floats per packed bloom array (one `vec4` per bloom).
pub(super) const ARRAY_LEN: usize = MAX_BLOOMS * 4;

const ARRAY_BYTES: u64 = (ARRAY_LEN * std::mem::size_of::<f32>()) as u64;

pub(super) const BLOOMS_OFFSET: u64 = std::mem::size_of::<ParamsHeader>() as u64;
pub(super) const COLORS_OFFSET: u64 = BLOOMS_OFFSET + ARRAY_BYTES;
pub(super) const CUTOUTS_OFFSET: u64 = COLORS_OFFSET + ARRAY_BYTES;

/// Total uniform size; matches `Params` in `watercolor.wgsl`.
pub(super) const PARAMS_SIZE: u64 = CUTOUTS_OFFSET + ARRAY_BYTES;

/// Bloom data laid out for upload, in pooled buffers.
pub(super) struct PackedBlooms {
    pub count: u32,
    pub blooms: Vec<f32>,
    pub colors: Vec<f32>,
    pub cutouts: Vec<f32>,
}

impl PackedBlooms {
    /// Packs up to [`MAX_BLOOMS`] blooms; unused slots stay zero.
    pub(super) fn pack(blooms: &[Bloom], pool: &mut BufferPool) -> Self {
        let mut packed = Self {
            count: blooms.len().min(MAX_BLOOMS) as u32,
            blooms: pool.acquire(ARRAY_LEN),
            colors: pool.acquire(ARRAY_LEN),
            cutouts: pool.acquire(ARRAY_LEN),
        };

        for (i, b) in blooms.iter().take(MAX_BLOOMS).enumerate() {
            let o = i * 4;
            packed.blooms[o..o + 4].copy_from_slice(&[b.x, b.y, b.size, b.intensity]);
            packed.colors[o..o + 4]
                .copy_from_slice(&[b.rgb[0], b.rgb[1], b.rgb[2], b.shape.code() as f32]);
            packed.cutouts[o] = b.inner_size;
            packed.cutouts[o + 1] = b.inner_feather;
        }
        packed
    }

    pub(super) fn release(self, pool: &mut BufferPool) {
        pool.release(self.blooms);
        pool.release(self.colors);
        pool.release(self.cutouts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bloom::BloomShape;

    #[test]
    fn uniform_layout_matches_shader() {
        assert_eq!(std::mem::size_of::<ParamsHeader>(), 48);
        assert_eq!(BLOOMS_OFFSET, 48);
        assert_eq!(COLORS_OFFSET, 1072);
        assert_eq!(CUTOUTS_OFFSET, 2096);
        assert_eq!(PARAMS_SIZE, 3120);
        assert_eq!(PARAMS_SIZE % 16, 0);
    }

    #[test]
    fn packs_and_recycles() {
        let mut pool = BufferPool::new();
        let blooms = [Bloom {
            x: 0.25,
            y: 0.75,
            size: 0.5,
            rgb: [1.0, 0.5, 0.0],
            intensity: 0.8,
            shape: BloomShape::HollowRect,
            inner_size: 0.4,
            inner_feather: 0.1,
        }];

        let packed = PackedBlooms::pack(&blooms, &mut pool);
        assert_eq!(packed.count, 1);
        assert_eq!(&packed.blooms[..4], &[0.25, 0.75, 0.5, 0.8]);
        assert_eq!(&packed.colors[..4], &[1.0, 0.5, 0.0, 2.0]);
        assert_eq!(&packed.cutouts[..2], &[0.4, 0.1]);
        assert!(packed.blooms[4..].iter().all(|&v| v == 0.0));

        packed.release(&mut pool);
        assert_eq!(pool.pooled_count(), 3);
        let again = PackedBlooms::pack(&[], &mut pool);
        assert_eq!(again.count, 0);
        assert!(again.blooms.iter().all(|&v| v == 0.0));
        assert_eq!(pool.pooled_count(), 0);
    }
}
