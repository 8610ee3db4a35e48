/// Straight (non-premultiplied) RGB color with channels in `[0, 1]`.
///
/// Parsed from authoring hex strings. A channel that fails to parse is `NaN`
/// rather than an error; callers that care use [`Rgb::try_from_hex`] or
/// `WatercolorConfig::validate`.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Parses `#rrggbb` or `#rgb` (leading `#` optional).
    ///
    /// Never fails: unparsable channels come back as `NaN`.
    pub fn from_hex(hex: &str) -> Self {
        let digits = hex.trim().trim_start_matches('#');
        let channel = |s: Option<&str>| -> f32 {
            s.and_then(|s| u8::from_str_radix(s, 16).ok())
                .map_or(f32::NAN, |v| v as f32 / 255.0)
        };

        match digits.len() {
            3 => {
                let short = |i: usize| -> f32 {
                    digits
                        .get(i..i + 1)
                        .and_then(|d| u8::from_str_radix(d, 16).ok())
                        .map_or(f32::NAN, |v| (v * 17) as f32 / 255.0)
                };
                Self::new(short(0), short(1), short(2))
            }
            6 => Self::new(
                channel(digits.get(0..2)),
                channel(digits.get(2..4)),
                channel(digits.get(4..6)),
            ),
            _ => Self::new(f32::NAN, f32::NAN, f32::NAN),
        }
    }

    /// Strict variant of [`from_hex`](Self::from_hex).
    pub fn try_from_hex(hex: &str) -> Option<Self> {
        Some(Self::from_hex(hex)).filter(|c| c.is_finite())
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite()
    }

    #[inline]
    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_form() {
        let c = Rgb::from_hex("#ff8000");
        assert_eq!(c.r, 1.0);
        assert!((c.g - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(c.b, 0.0);
    }

    #[test]
    fn parses_short_form_without_hash() {
        assert_eq!(Rgb::from_hex("fff"), Rgb::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn malformed_channel_is_nan() {
        let c = Rgb::from_hex("#zz0000");
        assert!(c.r.is_nan());
        assert_eq!(c.g, 0.0);
        assert!(Rgb::try_from_hex("#zz0000").is_none());
    }

    #[test]
    fn wrong_length_is_all_nan() {
        let c = Rgb::from_hex("#12345");
        assert!(c.r.is_nan() && c.g.is_nan() && c.b.is_nan());
    }
}
