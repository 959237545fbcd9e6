//! Color mapping for the choropleth.

use std::fmt;

/// Simple RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    const fn hex(hex: u32) -> Self {
        Self { r: (hex >> 16) as u8, g: (hex >> 8) as u8, b: hex as u8 }
    }
}

impl fmt::Display for Rgb {
    /// Format as CSS hex: #rrggbb
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Fill for units without a usable score.
pub const MISSING: Rgb = Rgb { r: 150, g: 150, b: 150 };

/// 9-class yellow-green sequential ramp, light to dark.
pub const YL_GN_9: [Rgb; 9] = [
    Rgb::hex(0xffffe5),
    Rgb::hex(0xf7fcb9),
    Rgb::hex(0xd9f0a3),
    Rgb::hex(0xaddd8e),
    Rgb::hex(0x78c679),
    Rgb::hex(0x41ab5d),
    Rgb::hex(0x238443),
    Rgb::hex(0x006837),
    Rgb::hex(0x004529),
];

pub const DOMAIN: (f64, f64) = (1.0, 100.0);

/// Linear interpolation along [`YL_GN_9`], stops spaced evenly over [`DOMAIN`].
/// Values outside the domain are clamped; non-finite values get [`MISSING`].
pub fn green_ramp(value: f64) -> Rgb {
    if !value.is_finite() { return MISSING }

    let (lo, hi) = DOMAIN;
    let position = ((value - lo) / (hi - lo)).clamp(0.0, 1.0) * (YL_GN_9.len() - 1) as f64;
    let i = (position.floor() as usize).min(YL_GN_9.len() - 2);
    let t = position - i as f64;

    let (a, b) = (YL_GN_9[i], YL_GN_9[i + 1]);
    let lerp = |a: u8, b: u8| -> u8 {
        (a as f64 + (b as f64 - a as f64) * t).round().clamp(0.0, 255.0) as u8
    };
    Rgb { r: lerp(a.r, b.r), g: lerp(a.g, b.g), b: lerp(a.b, b.b) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_match_ramp() {
        assert_eq!(green_ramp(1.0), YL_GN_9[0]);
        assert_eq!(green_ramp(100.0), YL_GN_9[8]);
        assert_eq!(green_ramp(-5.0), YL_GN_9[0]);
        assert_eq!(green_ramp(250.0), YL_GN_9[8]);
        assert_eq!(green_ramp(100.0).to_string(), "#004529");
    }

    #[test]
    fn stops_are_evenly_spaced() {
        // stop k sits at 1 + 99 * k / 8
        assert_eq!(green_ramp(1.0 + 99.0 * 4.0 / 8.0), YL_GN_9[4]);
    }

    #[test]
    fn missing_scores_are_gray() {
        assert_eq!(green_ramp(f64::NAN), MISSING);
    }
}
