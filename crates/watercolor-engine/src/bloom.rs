//! Bloom builder: configuration → renderer-ready primitives.

use crate::config::{SplotchConfig, SplotchShape, WatercolorConfig};
use crate::paint::Rgb;

/// Hard cap on blooms per overlay. The shader loop is unrolled against this bound.
pub const MAX_BLOOMS: usize = 64;

/// Cutout size used for `hollow-rect` splotches that do not author one.
pub const DEFAULT_INNER_SIZE: f32 = 0.55;

/// Cutout feather used for `hollow-rect` splotches that do not author one.
pub const DEFAULT_INNER_FEATHER: f32 = 0.12;

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum BloomShape {
    #[default]
    Circle,
    Rectangle,
    HollowRect,
}

impl BloomShape {
    /// Numeric code consumed by the shader (`0`, `1`, `2`).
    #[inline]
    pub const fn code(self) -> u32 {
        match self {
            BloomShape::Circle => 0,
            BloomShape::Rectangle => 1,
            BloomShape::HollowRect => 2,
        }
    }
}

impl From<SplotchShape> for BloomShape {
    fn from(shape: SplotchShape) -> Self {
        match shape {
            SplotchShape::Circle => BloomShape::Circle,
            SplotchShape::Rectangle => BloomShape::Rectangle,
            SplotchShape::HollowRect => BloomShape::HollowRect,
        }
    }
}

/// One renderable colored mass in normalized overlay space.
///
/// `x`/`y` are the center on the unit square (0.5, 0.5 is the middle),
/// `size` is the extent relative to the overlay height.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Bloom {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub rgb: [f32; 3],
    pub intensity: f32,
    pub shape: BloomShape,
    pub inner_size: f32,
    pub inner_feather: f32,
}

#[inline]
fn clamp01(v: f32) -> f32 {
    // NaN passes through on purpose; see `WatercolorConfig::validate`.
    v.clamp(0.0, 1.0)
}

fn bloom_from_splotch(splotch: &SplotchConfig, overall_scale: f32) -> Bloom {
    let shape = BloomShape::from(splotch.shape);
    let (inner_size, inner_feather) = match shape {
        BloomShape::HollowRect => (
            splotch.inner_size.unwrap_or(DEFAULT_INNER_SIZE),
            splotch.inner_feather.unwrap_or(DEFAULT_INNER_FEATHER),
        ),
        _ => (0.0, 0.0),
    };

    Bloom {
        x: 0.5 + splotch.offset[0] * overall_scale,
        y: 0.5 + splotch.offset[1] * overall_scale,
        size: splotch.scale * overall_scale,
        rgb: Rgb::from_hex(&splotch.gradient.mid).to_array(),
        intensity: clamp01(splotch.opacity * splotch.gradient.mid_opacity),
        shape,
        inner_size,
        inner_feather,
    }
}

/// Converts a configuration into at most [`MAX_BLOOMS`] blooms.
///
/// Pure and deterministic. The result is in paint order: the last authored
/// splotch comes first, so the first authored one is drawn last and ends up on
/// top. Extra splotches beyond the cap are dropped after the reversal.
pub fn build_blooms(config: &WatercolorConfig) -> Vec<Bloom> {
    config
        .splotches
        .iter()
        .rev()
        .take(MAX_BLOOMS)
        .map(|s| bloom_from_splotch(s, config.overall_scale))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GradientConfig;
    use proptest::prelude::*;

    fn splotch(scale: f32) -> SplotchConfig {
        SplotchConfig { scale, ..Default::default() }
    }

    #[test]
    fn single_centered_circle() {
        let cfg = WatercolorConfig {
            splotches: vec![SplotchConfig {
                gradient: GradientConfig { mid_opacity: 1.0, ..Default::default() },
                opacity: 1.0,
                scale: 0.5,
                offset: [0.0, 0.0],
                ..Default::default()
            }],
            overall_scale: 1.0,
            ..Default::default()
        };

        let blooms = build_blooms(&cfg);
        assert_eq!(blooms.len(), 1);
        let b = blooms[0];
        assert_eq!((b.x, b.y, b.size, b.intensity), (0.5, 0.5, 0.5, 1.0));
        assert_eq!(b.shape.code(), 0);
    }

    #[test]
    fn reverses_authored_order() {
        let cfg = WatercolorConfig {
            splotches: vec![splotch(0.1), splotch(0.2), splotch(0.3)],
            ..Default::default()
        };
        let sizes: Vec<f32> = build_blooms(&cfg).iter().map(|b| b.size).collect();
        assert_eq!(sizes, vec![0.3, 0.2, 0.1]);
    }

    #[test]
    fn truncates_after_reversal() {
        let splotches: Vec<_> = (0..70).map(|i| splotch(i as f32)).collect();
        let cfg = WatercolorConfig { splotches, ..Default::default() };

        let blooms = build_blooms(&cfg);
        assert_eq!(blooms.len(), MAX_BLOOMS);
        assert_eq!(blooms[0].size, 69.0);
        assert_eq!(blooms[MAX_BLOOMS - 1].size, 6.0);
    }

    #[test]
    fn offsets_scale_with_overall_scale() {
        let cfg = WatercolorConfig {
            splotches: vec![SplotchConfig { offset: [0.2, -0.4], scale: 0.5, ..Default::default() }],
            overall_scale: 0.5,
            ..Default::default()
        };
        let b = build_blooms(&cfg)[0];
        assert!((b.x - 0.6).abs() < 1e-6);
        assert!((b.y - 0.3).abs() < 1e-6);
        assert!((b.size - 0.25).abs() < 1e-6);
    }

    #[test]
    fn hollow_rect_gets_cutout_defaults() {
        let cfg = WatercolorConfig {
            splotches: vec![
                SplotchConfig { shape: SplotchShape::HollowRect, ..Default::default() },
                SplotchConfig { shape: SplotchShape::Rectangle, inner_size: Some(0.3), ..Default::default() },
            ],
            ..Default::default()
        };
        let blooms = build_blooms(&cfg);
        assert_eq!(blooms[0].shape, BloomShape::Rectangle);
        assert_eq!(blooms[0].inner_size, 0.0);
        assert_eq!(blooms[1].shape.code(), 2);
        assert_eq!(blooms[1].inner_size, DEFAULT_INNER_SIZE);
        assert_eq!(blooms[1].inner_feather, DEFAULT_INNER_FEATHER);
    }

    #[test]
    fn malformed_mid_color_propagates_nan() {
        let mut s = SplotchConfig::default();
        s.gradient.mid = "#nothex".to_string();
        let cfg = WatercolorConfig { splotches: vec![s], ..Default::default() };
        let b = build_blooms(&cfg)[0];
        assert!(b.rgb.iter().all(|c| c.is_nan()));
        assert_eq!(b.intensity, 1.0);
    }

    proptest! {
        #[test]
        fn intensity_stays_in_unit_range(opacity in 0.0f32..=1.0, mid in 0.0f32..=1.0) {
            let mut s = SplotchConfig { opacity, ..Default::default() };
            s.gradient.mid_opacity = mid;
            let cfg = WatercolorConfig { splotches: vec![s], ..Default::default() };
            let b = build_blooms(&cfg)[0];
            prop_assert!((0.0..=1.0).contains(&b.intensity));
        }

        #[test]
        fn count_is_min_of_len_and_cap(n in 0usize..100) {
            let cfg = WatercolorConfig {
                splotches: vec![SplotchConfig::default(); n],
                ..Default::default()
            };
            prop_assert_eq!(build_blooms(&cfg).len(), n.min(MAX_BLOOMS));
        }
    }
}
