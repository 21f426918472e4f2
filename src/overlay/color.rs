//! Kelvin to RGB conversion and color helpers for the overlay tint.
//!
//! Uses the common curve fit of blackbody chromaticity (valid roughly
//! 1000K-40000K). At 6500K the result is near white, so a multiply-blended
//! overlay leaves the page practically untouched during the day.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::utils::interpolate_u8;

/// An opaque sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// CSS `rgb()` notation.
    pub fn css(&self) -> String {
        format!("rgb({}, {}, {})", self.r, self.g, self.b)
    }

    /// Per-channel interpolation toward `target`, each channel rounded.
    pub fn lerp(&self, target: Rgb, progress: f64) -> Rgb {
        Rgb {
            r: interpolate_u8(self.r, target.r, progress),
            g: interpolate_u8(self.g, target.g, progress),
            b: interpolate_u8(self.b, target.b, progress),
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Convert a color temperature in Kelvin to its RGB tint.
pub fn kelvin_to_rgb(kelvin: u32) -> Rgb {
    let temp = kelvin.clamp(1000, 40000) as f64 / 100.0;

    let red = if temp <= 66.0 {
        255.0
    } else {
        329.698727446 * (temp - 60.0).powf(-0.1332047592)
    };

    let green = if temp <= 66.0 {
        99.4708025861 * temp.ln() - 161.1195681661
    } else {
        288.1221695283 * (temp - 60.0).powf(-0.0755148492)
    };

    let blue = if temp >= 66.0 {
        255.0
    } else if temp <= 19.0 {
        0.0
    } else {
        138.5177312231 * (temp - 10.0).ln() - 305.0447927307
    };

    Rgb::new(channel(red), channel(green), channel(blue))
}

fn channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daylight_is_near_white() {
        let rgb = kelvin_to_rgb(6500);
        assert_eq!(rgb.r, 255);
        assert!(rgb.g >= 250, "{rgb:?}");
        assert!(rgb.b >= 245, "{rgb:?}");
    }

    #[test]
    fn test_warmer_means_less_blue() {
        let warm = kelvin_to_rgb(2700);
        let warmer = kelvin_to_rgb(1500);
        assert_eq!(warm.r, 255);
        assert!(warmer.b < warm.b);
        assert!(warmer.g < warm.g);
    }

    #[test]
    fn test_cool_temperatures_reduce_red() {
        let cool = kelvin_to_rgb(10000);
        assert!(cool.r < 255);
        assert_eq!(cool.b, 255);
    }

    #[test]
    fn test_lerp_endpoints() {
        let from = Rgb::new(255, 100, 0);
        let to = Rgb::new(255, 200, 100);
        assert_eq!(from.lerp(to, 0.0), from);
        assert_eq!(from.lerp(to, 1.0), to);
        assert_eq!(from.lerp(to, 0.5), Rgb::new(255, 150, 50));
    }

    #[test]
    fn test_css_and_hex() {
        let color = Rgb::new(255, 138, 18);
        assert_eq!(color.css(), "rgb(255, 138, 18)");
        assert_eq!(color.to_string(), "#ff8a12");
    }
}
