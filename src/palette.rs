// Palette Module - Palette lookup, HSV conversion and brightness curves
use anyhow::{anyhow, Result};
use colorgrad::Color;

use crate::types::{InterpolationMode, Rgb};

/// Upper end of the palette index domain.
pub const MAX_INDEX: f64 = 255.0;

/// Get list of all built-in palette names
pub fn get_palette_names() -> Vec<&'static str> {
    vec!["iluk", "rainbow", "fire", "ocean"]
}

/// Stop string for a built-in palette, if `name` is one
pub fn builtin_palette(name: &str) -> Option<&'static str> {
    match name.trim().to_lowercase().as_str() {
        // white -> lime -> red -> pink
        "iluk" => Some("0:FFFFFF,96:CCFF00,160:D40202,255:EB497F"),
        "rainbow" => Some("FF0000,FF7F00,FFFF00,00FF00,0000FF,4B0082,9400D3"),
        "fire" => Some("000000,FF0000,FFA500,FFFFFF"),
        "ocean" => Some("000069,0000FF,00CEFF,40E0D0"),
        _ => None,
    }
}

/// Ordered colour stops over the index range 0..=255, read-only once built.
pub struct Palette {
    gradient: colorgrad::Gradient,
    stops: Vec<(f64, Rgb)>,
}

impl std::fmt::Debug for Palette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Palette").field("stops", &self.stops).finish()
    }
}

impl Palette {
    /// Build from explicit `(position, colour)` stops. Positions must be
    /// non-decreasing and inside 0..=255.
    pub fn from_stops(stops: &[(f64, Rgb)], interpolation_mode: InterpolationMode) -> Result<Self> {
        if stops.is_empty() {
            anyhow::bail!("Palette needs at least one colour");
        }

        let mut stops = stops.to_vec();
        // A single colour is a flat palette
        if stops.len() == 1 {
            stops = vec![(0.0, stops[0].1), (MAX_INDEX, stops[0].1)];
        }

        for pair in stops.windows(2) {
            if pair[1].0 < pair[0].0 {
                anyhow::bail!("Palette stops out of order: {} after {}", pair[1].0, pair[0].0);
            }
        }
        if let Some((pos, _)) = stops.iter().find(|(pos, _)| !(0.0..=MAX_INDEX).contains(pos)) {
            anyhow::bail!("Palette stop position {} outside 0..=255", pos);
        }

        let colors: Vec<Color> = stops
            .iter()
            .map(|(_, rgb)| Color::from_rgba8(rgb.r, rgb.g, rgb.b, 255))
            .collect();
        let domain: Vec<f64> = stops.iter().map(|(pos, _)| *pos).collect();

        let cg_interpolation = match interpolation_mode {
            InterpolationMode::Basis => colorgrad::Interpolation::Basis,
            InterpolationMode::CatmullRom => colorgrad::Interpolation::CatmullRom,
            _ => colorgrad::Interpolation::Linear,
        };

        let gradient = colorgrad::CustomGradient::new()
            .colors(&colors)
            .domain(&domain)
            .interpolation(cg_interpolation)
            .build()?;

        Ok(Palette { gradient, stops })
    }

    /// Parse either a built-in name, positioned stops (`"0:FFFFFF,255:FF0000"`)
    /// or a plain hex list spread evenly across the index range.
    pub fn parse(palette_str: &str, interpolation_mode: InterpolationMode) -> Result<Self> {
        let palette_str = builtin_palette(palette_str).unwrap_or(palette_str);
        let entries: Vec<&str> = palette_str
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();

        if entries.is_empty() {
            anyhow::bail!("Empty palette string");
        }

        let positioned = entries.iter().filter(|e| e.contains(':')).count();
        let stops = if positioned == entries.len() {
            let mut stops = Vec::with_capacity(entries.len());
            for entry in &entries {
                let (pos, hex) = entry
                    .split_once(':')
                    .ok_or_else(|| anyhow!("Invalid palette stop: {}", entry))?;
                let pos: f64 = pos
                    .trim()
                    .parse()
                    .map_err(|e| anyhow!("Invalid palette position '{}': {}", pos, e))?;
                stops.push((pos, Rgb::from_hex(hex)?));
            }
            stops
        } else if positioned == 0 {
            let last = (entries.len().max(2) - 1) as f64;
            let mut stops = Vec::with_capacity(entries.len());
            for (i, hex) in entries.iter().enumerate() {
                stops.push((i as f64 / last * MAX_INDEX, Rgb::from_hex(hex)?));
            }
            stops
        } else {
            anyhow::bail!("Palette mixes positioned and unpositioned stops: {}", palette_str);
        };

        Self::from_stops(&stops, interpolation_mode)
    }

    pub fn stops(&self) -> &[(f64, Rgb)] {
        &self.stops
    }

    /// Interpolated colour at `index`, dimmed by `brightness / 255`.
    pub fn lookup(&self, index: u8, brightness: u8) -> Rgb {
        let [r, g, b, _] = self.gradient.at(index as f64).to_rgba8();
        Rgb::new(r, g, b).scale(brightness)
    }
}

/// Convert HSV to RGB. Hue is in degrees and wraps; saturation and value are
/// clamped into [0, 1].
pub fn hsv_to_rgb(hue: f64, sat: f64, val: f64) -> Rgb {
    let hue = if hue.is_finite() { hue.rem_euclid(360.0) } else { 0.0 };
    let sat = clamp_unit(sat);
    let val = clamp_unit(val);
    let [r, g, b, _] = Color::from_hsva(hue, sat, val, 1.0).to_rgba8();
    Rgb::new(r, g, b)
}

/// Triangle wave over the byte range: 0 -> 255, 127/128 -> 1, 255 -> 255.
/// A steadily advancing raw index sweeps the palette back and forth.
pub fn mirrored_index(raw: u8) -> u8 {
    (255 - 2 * raw as i32).unsigned_abs() as u8
}

/// Integer part of `v`, wrapped onto the byte range.
pub fn wrap_u8(v: f64) -> u8 {
    (v as i64).rem_euclid(256) as u8
}

/// Power-law curve on `v`, clamped into [0, max]. Negative input and NaN map to 0.
pub fn shape_brightness(v: f64, exponent: f64, max: f64) -> f64 {
    if !(v > 0.0) {
        return 0.0;
    }
    let shaped = v.powf(exponent);
    if shaped.is_nan() {
        return 0.0;
    }
    shaped.clamp(0.0, max)
}

/// Scale a [0, 1] level onto a byte, clamping first.
pub fn unit_to_u8(v: f64) -> u8 {
    (clamp_unit(v) * 255.0) as u8
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}
