// Shared types module - Colour values used across the render pipeline

use anyhow::Result;

// Gradient interpolation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpolationMode {
    #[default]
    Linear,
    Basis,
    CatmullRom,
}

impl InterpolationMode {
    pub fn from_string(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "basis" => InterpolationMode::Basis,
            "catmullrom" | "catmull_rom" => InterpolationMode::CatmullRom,
            _ => InterpolationMode::Linear,
        }
    }
}

// RGB color representation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 128, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);
    pub const PURPLE: Rgb = Rgb::new(128, 0, 128);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            anyhow::bail!("Invalid hex color: {}", hex);
        }
        Ok(Rgb {
            r: u8::from_str_radix(&hex[0..2], 16)?,
            g: u8::from_str_radix(&hex[2..4], 16)?,
            b: u8::from_str_radix(&hex[4..6], 16)?,
        })
    }

    /// Move each channel from `self` toward `other` by `weight / 255`.
    /// Exact at both ends: weight 0 keeps `self`, weight 255 yields `other`.
    pub fn blend(self, other: Rgb, weight: u8) -> Rgb {
        let w = weight as u16;
        let mix = |a: u8, b: u8| ((a as u16 * (255 - w) + b as u16 * w + 127) / 255) as u8;
        Rgb {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
        }
    }

    /// Scale all channels by `brightness / 255`.
    pub fn scale(self, brightness: u8) -> Rgb {
        let s = brightness as u16;
        let apply = |c: u8| ((c as u16 * s + 127) / 255) as u8;
        Rgb {
            r: apply(self.r),
            g: apply(self.g),
            b: apply(self.b),
        }
    }
}

/// Flatten a colour buffer into packed RGB bytes, applying a global brightness.
pub fn frame_to_bytes(frame: &[Rgb], brightness: u8) -> Vec<u8> {
    let mut output = Vec::with_capacity(frame.len() * 3);
    for pixel in frame {
        let p = if brightness == 255 { *pixel } else { pixel.scale(brightness) };
        output.extend_from_slice(&[p.r, p.g, p.b]);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex() {
        let c = Rgb::from_hex("#D40202").unwrap();
        assert_eq!(c, Rgb::new(212, 2, 2));
        assert!(Rgb::from_hex("12345").is_err());
        assert!(Rgb::from_hex("GG0000").is_err());
    }

    #[test]
    fn test_blend_endpoints_are_exact() {
        let a = Rgb::new(10, 200, 33);
        let b = Rgb::new(250, 0, 128);
        assert_eq!(a.blend(b, 0), a);
        assert_eq!(a.blend(b, 255), b);

        let mid = Rgb::BLACK.blend(Rgb::WHITE, 128);
        assert_eq!(mid, Rgb::new(128, 128, 128));
    }

    #[test]
    fn test_scale_and_bytes() {
        assert_eq!(Rgb::WHITE.scale(0), Rgb::BLACK);
        assert_eq!(Rgb::WHITE.scale(255), Rgb::WHITE);
        assert_eq!(Rgb::new(200, 100, 0).scale(128), Rgb::new(100, 50, 0));

        let bytes = frame_to_bytes(&[Rgb::RED, Rgb::new(2, 4, 6)], 255);
        assert_eq!(bytes, vec![255, 0, 0, 2, 4, 6]);
        let dimmed = frame_to_bytes(&[Rgb::WHITE], 128);
        assert_eq!(dimmed, vec![128, 128, 128]);
    }

    #[test]
    fn test_interpolation_from_string() {
        assert_eq!(InterpolationMode::from_string("Basis"), InterpolationMode::Basis);
        assert_eq!(InterpolationMode::from_string(" catmullrom "), InterpolationMode::CatmullRom);
        assert_eq!(InterpolationMode::from_string("nope"), InterpolationMode::Linear);
    }
}
