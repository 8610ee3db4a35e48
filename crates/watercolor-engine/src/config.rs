//! Declarative watercolor configuration, as authored by the editor and data layers.
//!
//! Field names serialize in camelCase to match the authoring JSON. Only the
//! gradient mid-stop, scale, offset, opacity, shape and inner cutout reach the
//! renderer; tendrils, satellites and animation timings are carried for
//! round-tripping authored data.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bloom::MAX_BLOOMS;
use crate::paint::Rgb;

/// Glow strength used when `luminous` is set without an explicit strength.
pub const DEFAULT_LUMINOUS_STRENGTH: f32 = 1.0;

/// Upper bound for `luminous_strength`.
pub const MAX_LUMINOUS_STRENGTH: f32 = 1.5;

fn one() -> f32 {
    1.0
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid watercolor config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("splotch {splotch}: {field} color {value:?} is not a #rgb or #rrggbb hex string")]
    MalformedColor {
        splotch: usize,
        field: &'static str,
        value: String,
    },

    #[error("splotch {splotch}: {field} is not a finite number")]
    NonFinite { splotch: usize, field: &'static str },

    #[error("{field} is not a finite number")]
    NonFiniteGlobal { field: &'static str },

    #[error("{count} splotches configured; only the first {max} after z-ordering are rendered")]
    TooManySplotches { count: usize, max: usize },
}

/// Three-stop pigment gradient. The renderer samples the mid stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradientConfig {
    pub light: String,
    pub mid: String,
    pub dark: String,
    #[serde(default = "one")]
    pub light_opacity: f32,
    #[serde(default = "one")]
    pub mid_opacity: f32,
    #[serde(default = "one")]
    pub dark_opacity: f32,
}

impl Default for GradientConfig {
    fn default() -> Self {
        Self {
            light: "#ffffff".to_string(),
            mid: "#808080".to_string(),
            dark: "#000000".to_string(),
            light_opacity: 1.0,
            mid_opacity: 1.0,
            dark_opacity: 1.0,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SplotchShape {
    #[default]
    Circle,
    Rectangle,
    HollowRect,
}

/// Tendril strokes from the archived vector renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TendrilConfig {
    pub count: u32,
    pub length: f32,
    pub stroke_width: f32,
    pub sway_duration: f32,
    pub sway_angle: f32,
}

/// Orbiting satellite dots from the archived vector renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SatelliteConfig {
    pub count: u32,
    pub radius: f32,
    pub orbit_radius: f32,
    pub drift_duration: f32,
}

/// Breathe/highlight timings from the archived vector renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SplotchAnimation {
    pub breathe_duration: f32,
    pub breathe_scale: f32,
    pub highlight_shift_duration: f32,
}

/// One authored colored mass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplotchConfig {
    #[serde(default)]
    pub gradient: GradientConfig,
    #[serde(default = "one")]
    pub scale: f32,
    #[serde(default)]
    pub offset: [f32; 2],
    #[serde(default)]
    pub blend_mode: String,
    #[serde(default = "one")]
    pub opacity: f32,
    #[serde(default)]
    pub shape: SplotchShape,
    /// Inner cutout size as a fraction of the outer box; `hollow-rect` only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_size: Option<f32>,
    /// Inner cutout edge softness; `hollow-rect` only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_feather: Option<f32>,
    #[serde(default)]
    pub tendrils: TendrilConfig,
    #[serde(default)]
    pub satellites: SatelliteConfig,
    #[serde(default)]
    pub animation: SplotchAnimation,
}

impl Default for SplotchConfig {
    fn default() -> Self {
        Self {
            gradient: GradientConfig::default(),
            scale: 1.0,
            offset: [0.0, 0.0],
            blend_mode: "normal".to_string(),
            opacity: 1.0,
            shape: SplotchShape::Circle,
            inner_size: None,
            inner_feather: None,
            tendrils: TendrilConfig::default(),
            satellites: SatelliteConfig::default(),
            animation: SplotchAnimation::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GrainConfig {
    pub enabled: bool,
    pub intensity: f32,
    pub frequency: f32,
    pub blend_mode: String,
}

impl Default for GrainConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            intensity: 0.08,
            frequency: 1.0,
            blend_mode: "multiply".to_string(),
        }
    }
}

impl GrainConfig {
    /// Disabled grain, for overlays that only want pigment.
    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::default() }
    }

    /// Copy with intensity and frequency multiplied by the given factors.
    pub fn scaled(&self, intensity: f32, frequency: f32) -> Self {
        Self {
            intensity: self.intensity * intensity,
            frequency: self.frequency * frequency,
            ..self.clone()
        }
    }

    /// Intensity the renderer should apply; zero when disabled.
    #[inline]
    pub fn effective_intensity(&self) -> f32 {
        if self.enabled { self.intensity.max(0.0) } else { 0.0 }
    }
}

/// Full per-overlay configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatercolorConfig {
    /// Authoring order; the first entry paints on top.
    #[serde(default)]
    pub splotches: Vec<SplotchConfig>,
    #[serde(default)]
    pub grain: GrainConfig,
    #[serde(default = "one")]
    pub overall_scale: f32,
    #[serde(default)]
    pub luminous: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub luminous_strength: Option<f32>,
}

impl Default for WatercolorConfig {
    fn default() -> Self {
        Self {
            splotches: Vec::new(),
            grain: GrainConfig::default(),
            overall_scale: 1.0,
            luminous: false,
            luminous_strength: None,
        }
    }
}

impl WatercolorConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Glow strength handed to the renderer: zero unless `luminous` is set,
    /// otherwise clamped to `[0, MAX_LUMINOUS_STRENGTH]`.
    pub fn glow_strength(&self) -> f32 {
        if !self.luminous {
            return 0.0;
        }
        self.luminous_strength
            .unwrap_or(DEFAULT_LUMINOUS_STRENGTH)
            .clamp(0.0, MAX_LUMINOUS_STRENGTH)
    }

    /// Reports the first problem the bloom builder would silently absorb.
    ///
    /// `build_blooms` never fails; this is the checked path for callers that
    /// want to warn or reject at authoring time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.overall_scale.is_finite() {
            return Err(ConfigError::NonFiniteGlobal { field: "overallScale" });
        }

        for (i, s) in self.splotches.iter().enumerate() {
            for (field, value) in [
                ("gradient.light", &s.gradient.light),
                ("gradient.mid", &s.gradient.mid),
                ("gradient.dark", &s.gradient.dark),
            ] {
                if Rgb::try_from_hex(value).is_none() {
                    return Err(ConfigError::MalformedColor {
                        splotch: i,
                        field,
                        value: value.clone(),
                    });
                }
            }

            let numbers = [
                ("scale", s.scale),
                ("offset[0]", s.offset[0]),
                ("offset[1]", s.offset[1]),
                ("opacity", s.opacity),
                ("gradient.midOpacity", s.gradient.mid_opacity),
                ("innerSize", s.inner_size.unwrap_or(0.0)),
                ("innerFeather", s.inner_feather.unwrap_or(0.0)),
            ];
            if let Some((field, _)) = numbers.iter().find(|(_, v)| !v.is_finite()) {
                return Err(ConfigError::NonFinite { splotch: i, field: *field });
            }
        }

        if self.splotches.len() > MAX_BLOOMS {
            return Err(ConfigError::TooManySplotches {
                count: self.splotches.len(),
                max: MAX_BLOOMS,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let json = r##"{
            "splotches": [{
                "gradient": { "light": "#fff", "mid": "#336699", "dark": "#000", "midOpacity": 0.5 },
                "scale": 0.6,
                "offset": [0.1, -0.2],
                "shape": "hollow-rect",
                "innerSize": 0.4
            }],
            "overallScale": 1.2,
            "luminous": true
        }"##;
        let cfg = WatercolorConfig::from_json(json).unwrap();
        let s = &cfg.splotches[0];
        assert_eq!(s.shape, SplotchShape::HollowRect);
        assert_eq!(s.gradient.mid_opacity, 0.5);
        assert_eq!(s.gradient.light_opacity, 1.0);
        assert_eq!(s.opacity, 1.0);
        assert_eq!(s.inner_size, Some(0.4));
        assert_eq!(cfg.overall_scale, 1.2);
        assert!(cfg.grain.enabled);
        assert_eq!(cfg.glow_strength(), DEFAULT_LUMINOUS_STRENGTH);
    }

    #[test]
    fn decorative_fields_round_trip() {
        let mut cfg = WatercolorConfig::default();
        let mut s = SplotchConfig::default();
        s.tendrils.count = 5;
        s.satellites.orbit_radius = 0.3;
        s.animation.breathe_duration = 4.0;
        cfg.splotches.push(s);

        let json = serde_json::to_string(&cfg).unwrap();
        assert_eq!(WatercolorConfig::from_json(&json).unwrap(), cfg);
    }

    #[test]
    fn glow_is_zero_unless_luminous_and_clamped() {
        let mut cfg = WatercolorConfig { luminous_strength: Some(3.0), ..Default::default() };
        assert_eq!(cfg.glow_strength(), 0.0);
        cfg.luminous = true;
        assert_eq!(cfg.glow_strength(), MAX_LUMINOUS_STRENGTH);
    }

    #[test]
    fn validate_reports_malformed_mid_color() {
        let mut s = SplotchConfig::default();
        s.gradient.mid = "teal".to_string();
        let cfg = WatercolorConfig { splotches: vec![s], ..Default::default() };
        match cfg.validate() {
            Err(ConfigError::MalformedColor { splotch: 0, field: "gradient.mid", .. }) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn validate_reports_truncation() {
        let cfg = WatercolorConfig {
            splotches: vec![SplotchConfig::default(); MAX_BLOOMS + 1],
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::TooManySplotches { count: 65, max: 64 })));
    }

    #[test]
    fn grain_scaling_keeps_blend_mode() {
        let g = GrainConfig { intensity: 0.2, frequency: 2.0, ..Default::default() };
        let d = g.scaled(0.55, 0.85);
        assert!((d.intensity - 0.11).abs() < 1e-6);
        assert!((d.frequency - 1.7).abs() < 1e-6);
        assert_eq!(d.blend_mode, g.blend_mode);
        assert_eq!(GrainConfig::disabled().effective_intensity(), 0.0);
    }
}
