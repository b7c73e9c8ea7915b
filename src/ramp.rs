//! Speed color ramps.
//!
//! A ramp is a 256×1 RGBA8 strip built from color stops the same way a 2D
//! canvas linear gradient fills a 256-pixel row. The draw program samples it
//! with a linear filter at `(speed_t, 0.5)`.
//!
//! # Usage
//!
//! ```ignore
//! let ramp = ColorRamp::from_css(&[
//!     (0.0, "RGBA(55,60,63,1)"),
//!     (1.0, "#6e2864"),
//! ])?;
//! engine.set_color_ramp(&ramp);
//! ```

use glam::Vec4;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Width of the ramp texture in texels.
pub const RAMP_WIDTH: u32 = 256;

/// A color at a position along the ramp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    /// Position in `[0, 1]`.
    pub t: f32,
    /// Straight (non-premultiplied) RGBA bytes.
    pub color: [u8; 4],
}

impl ColorStop {
    pub fn new(t: f32, color: [u8; 4]) -> Self {
        Self { t, color }
    }
}

/// Ordered color stops mapping normalized speed to color.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorRamp {
    stops: Vec<ColorStop>,
}

impl ColorRamp {
    /// Build a ramp from stops in any order. Stops must lie in `[0, 1]`.
    pub fn new(mut stops: Vec<ColorStop>) -> Result<Self, ConfigError> {
        if stops.is_empty() {
            return Err(ConfigError::EmptyRamp);
        }
        if let Some(bad) = stops.iter().find(|s| !(0.0..=1.0).contains(&s.t)) {
            return Err(ConfigError::OutOfRange {
                name: "colorStop",
                value: bad.t,
                range: "[0, 1]",
            });
        }
        // Stable, so stops sharing a position keep their insertion order.
        stops.sort_by(|a, b| a.t.total_cmp(&b.t));
        Ok(Self { stops })
    }

    /// Build a ramp from `(position, css color)` pairs.
    pub fn from_css(stops: &[(f32, &str)]) -> Result<Self, ConfigError> {
        let stops = stops
            .iter()
            .map(|&(t, css)| parse_css_color(css).map(|color| ColorStop::new(t, color)))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(stops)
    }

    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    /// Color at `t`, interpolated between neighbouring stops.
    ///
    /// Positions before the first stop take its color, positions after the
    /// last stop take the last color.
    pub fn sample(&self, t: f32) -> Vec4 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let first = self.stops[0];
        if t <= first.t {
            return to_vec4(first.color);
        }
        for pair in self.stops.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b.t {
                let span = b.t - a.t;
                if span <= 0.0 {
                    return to_vec4(b.color);
                }
                let f = (t - a.t) / span;
                return to_vec4(a.color).lerp(to_vec4(b.color), f);
            }
        }
        to_vec4(self.stops[self.stops.len() - 1].color)
    }

    /// Rasterize to the `RAMP_WIDTH × 1` RGBA8 strip uploaded to the GPU.
    pub fn to_texels(&self) -> Vec<u8> {
        (0..RAMP_WIDTH)
            .flat_map(|x| {
                let t = (x as f32 + 0.5) / RAMP_WIDTH as f32;
                let c = self.sample(t) * 255.0;
                [c.x, c.y, c.z, c.w].map(|v| v.round().clamp(0.0, 255.0) as u8)
            })
            .collect()
    }
}

impl Default for ColorRamp {
    fn default() -> Self {
        Palette::Wind.ramp()
    }
}

fn to_vec4(c: [u8; 4]) -> Vec4 {
    Vec4::new(c[0] as f32, c[1] as f32, c[2] as f32, c[3] as f32) / 255.0
}

/// Linear-filtered, edge-clamped read of a ramp strip at `t`.
///
/// Mirrors what the draw program's sampler returns for `(t, 0.5)`.
pub fn lookup_texels(texels: &[u8], t: f32) -> Vec4 {
    let width = texels.len() / 4;
    if width == 0 {
        return Vec4::ZERO;
    }
    let texel = |i: i64| {
        let i = i.clamp(0, width as i64 - 1) as usize * 4;
        to_vec4([texels[i], texels[i + 1], texels[i + 2], texels[i + 3]])
    };
    let x = t.clamp(0.0, 1.0) * width as f32 - 0.5;
    let i0 = x.floor();
    let f = x - i0;
    texel(i0 as i64).lerp(texel(i0 as i64 + 1), f)
}

/// Parse a CSS color: `rgb(r,g,b)`, `rgba(r,g,b,a)` or `#rgb`/`#rrggbb`/`#rrggbbaa`.
///
/// Function names are case-insensitive; alpha in `rgba()` is a `[0, 1]` float.
pub fn parse_css_color(css: &str) -> Result<[u8; 4], ConfigError> {
    let invalid = || ConfigError::InvalidColor(css.to_string());
    let s = css.trim();

    if let Some(hex) = s.strip_prefix('#') {
        let digits = hex
            .chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(invalid)?;
        return match digits.len() {
            3 => Ok([digits[0] * 17, digits[1] * 17, digits[2] * 17, 255]),
            6 | 8 => {
                let mut out = [255u8; 4];
                for (i, pair) in digits.chunks(2).enumerate() {
                    out[i] = pair[0] * 16 + pair[1];
                }
                Ok(out)
            }
            _ => Err(invalid()),
        };
    }

    let lower = s.to_ascii_lowercase();
    let (body, has_alpha) = if let Some(rest) = lower.strip_prefix("rgba(") {
        (rest, true)
    } else if let Some(rest) = lower.strip_prefix("rgb(") {
        (rest, false)
    } else {
        return Err(invalid());
    };
    let body = body.strip_suffix(')').ok_or_else(invalid)?;
    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    if parts.len() != if has_alpha { 4 } else { 3 } {
        return Err(invalid());
    }

    let mut out = [255u8; 4];
    for (i, part) in parts.iter().take(3).enumerate() {
        let v: f32 = part.parse().map_err(|_| invalid())?;
        if !(0.0..=255.0).contains(&v) {
            return Err(invalid());
        }
        out[i] = v.round() as u8;
    }
    if has_alpha {
        let a: f32 = parts[3].parse().map_err(|_| invalid())?;
        if !(0.0..=1.0).contains(&a) {
            return Err(invalid());
        }
        out[3] = (a * 255.0).round() as u8;
    }
    Ok(out)
}

/// Built-in ramps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    /// Slate through blue, green, ochre and red to plum (default).
    #[default]
    Wind,

    /// Viridis - perceptually uniform, colorblind-friendly (purple to yellow).
    Viridis,

    /// Magma - perceptually uniform (black to yellow through red).
    Magma,

    /// Ocean - cool blues and teals.
    Ocean,

    /// Fire - black through red, orange, yellow, white.
    Fire,

    /// Grayscale - black to white.
    Grayscale,
}

impl Palette {
    /// Color stops for this palette.
    pub fn stops(&self) -> Vec<ColorStop> {
        let even = |colors: [[u8; 3]; 5]| {
            colors
                .iter()
                .enumerate()
                .map(|(i, c)| ColorStop::new(i as f32 / 4.0, [c[0], c[1], c[2], 255]))
                .collect()
        };
        match self {
            Palette::Wind => vec![
                ColorStop::new(0.0, [55, 60, 63, 255]),
                ColorStop::new(0.1, [5, 102, 131, 255]),
                ColorStop::new(0.2, [42, 150, 79, 255]),
                ColorStop::new(0.3, [179, 168, 43, 255]),
                ColorStop::new(0.4, [179, 111, 42, 255]),
                ColorStop::new(0.5, [177, 50, 48, 255]),
                ColorStop::new(0.6, [112, 45, 95, 255]),
                ColorStop::new(1.0, [110, 40, 100, 255]),
            ],
            Palette::Viridis => even([
                [68, 1, 84],    // Dark purple
                [72, 36, 117],  // Purple
                [32, 144, 140], // Teal
                [94, 201, 98],  // Green
                [253, 231, 37], // Yellow
            ]),
            Palette::Magma => even([
                [0, 0, 4],       // Black
                [84, 18, 111],   // Purple
                [183, 55, 121],  // Pink
                [253, 138, 97],  // Orange
                [252, 253, 191], // Light yellow
            ]),
            Palette::Ocean => even([
                [0, 13, 38],    // Deep blue
                [0, 51, 102],   // Dark blue
                [0, 102, 153],  // Blue
                [51, 153, 204], // Light blue
                [153, 230, 255],
            ]),
            Palette::Fire => even([
                [26, 0, 0],
                [128, 0, 0],
                [255, 77, 0],
                [255, 179, 0],
                [255, 255, 204],
            ]),
            Palette::Grayscale => even([
                [0, 0, 0],
                [64, 64, 64],
                [128, 128, 128],
                [191, 191, 191],
                [255, 255, 255],
            ]),
        }
    }

    pub fn ramp(&self) -> ColorRamp {
        let mut stops = self.stops();
        stops.sort_by(|a, b| a.t.total_cmp(&b.t));
        ColorRamp { stops }
    }
}
