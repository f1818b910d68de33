//! Per-point color tags derived from altitude or ground speed.

use serde::{Deserialize, Serialize};

use crate::models::{ColorMode, TrailPoint, MIN_VALID_ALTITUDE_FT};

/// (altitude_ft, hue_deg) stops for the altitude ramp.
const ALTITUDE_HUE_STOPS: [(f64, f64); 3] = [(2_000.0, 20.0), (10_000.0, 140.0), (40_000.0, 300.0)];
const ALTITUDE_SATURATION: f64 = 0.88;
const ALTITUDE_LIGHTNESS: f64 = 0.44;

const SPEED_MAX_KTS: f64 = 600.0;
const SPEED_SLOW_HUE: f64 = 120.0;
const SPEED_FAST_HUE: f64 = 15.0;
const SPEED_SATURATION: f64 = 0.85;
const SPEED_LIGHTNESS: f64 = 0.5;

/// Linear RGB with components in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const GRAY: Rgb = Rgb {
        r: 0.5,
        g: 0.5,
        b: 0.5,
    };

    /// Convert HSL (hue in degrees, s/l in [0, 1]).
    pub fn from_hsl(hue_deg: f64, saturation: f64, lightness: f64) -> Self {
        let h = hue_deg.rem_euclid(360.0) / 360.0;
        let s = saturation.clamp(0.0, 1.0);
        let l = lightness.clamp(0.0, 1.0);

        if s == 0.0 {
            let v = l as f32;
            return Rgb { r: v, g: v, b: v };
        }

        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;

        Rgb {
            r: hue_to_channel(p, q, h + 1.0 / 3.0) as f32,
            g: hue_to_channel(p, q, h) as f32,
            b: hue_to_channel(p, q, h - 1.0 / 3.0) as f32,
        }
    }

    pub fn as_array(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

fn hue_to_channel(p: f64, q: f64, t: f64) -> f64 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

/// Hue for an altitude, clamped to the outer stops.
pub fn altitude_hue(altitude_ft: f64) -> f64 {
    let (first_alt, first_hue) = ALTITUDE_HUE_STOPS[0];
    if altitude_ft <= first_alt {
        return first_hue;
    }
    for pair in ALTITUDE_HUE_STOPS.windows(2) {
        let (alt0, hue0) = pair[0];
        let (alt1, hue1) = pair[1];
        if altitude_ft <= alt1 {
            let t = (altitude_ft - alt0) / (alt1 - alt0);
            return hue0 + (hue1 - hue0) * t;
        }
    }
    ALTITUDE_HUE_STOPS[ALTITUDE_HUE_STOPS.len() - 1].1
}

pub fn altitude_color(altitude_ft: f64) -> Rgb {
    if !(altitude_ft >= MIN_VALID_ALTITUDE_FT) {
        return Rgb::GRAY;
    }
    Rgb::from_hsl(altitude_hue(altitude_ft), ALTITUDE_SATURATION, ALTITUDE_LIGHTNESS)
}

pub fn speed_color(ground_speed_kts: f64) -> Rgb {
    let speed = if ground_speed_kts.is_finite() {
        ground_speed_kts
    } else {
        0.0
    };
    let t = (speed / SPEED_MAX_KTS).clamp(0.0, 1.0);
    let hue = SPEED_SLOW_HUE + (SPEED_FAST_HUE - SPEED_SLOW_HUE) * t;
    Rgb::from_hsl(hue, SPEED_SATURATION, SPEED_LIGHTNESS)
}

pub fn color_for(point: &TrailPoint, mode: ColorMode) -> Rgb {
    match mode {
        ColorMode::Altitude => altitude_color(point.altitude_ft),
        ColorMode::Speed => speed_color(point.ground_speed_kts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_altitude_is_gray() {
        assert_eq!(altitude_color(0.0), Rgb::GRAY);
        assert_eq!(altitude_color(499.0), Rgb::GRAY);
        assert_ne!(altitude_color(500.0), Rgb::GRAY);
    }

    #[test]
    fn altitude_hue_hits_stops() {
        assert!((altitude_hue(2_000.0) - 20.0).abs() < 1e-9);
        assert!((altitude_hue(10_000.0) - 140.0).abs() < 1e-9);
        assert!((altitude_hue(40_000.0) - 300.0).abs() < 1e-9);
        assert!((altitude_hue(60_000.0) - 300.0).abs() < 1e-9);
        assert!((altitude_hue(6_000.0) - 80.0).abs() < 1e-9);
    }

    #[test]
    fn high_altitude_is_magenta() {
        let c = altitude_color(45_000.0);
        assert!(c.r > c.g && c.b > c.g);
    }

    #[test]
    fn speed_ramps_green_to_red() {
        let slow = speed_color(0.0);
        let fast = speed_color(700.0);
        assert!(slow.g > slow.r);
        assert!(fast.r > fast.g);
        assert_eq!(speed_color(600.0), fast);
    }

    #[test]
    fn hsl_primary_colors() {
        let red = Rgb::from_hsl(0.0, 1.0, 0.5);
        assert!((red.r - 1.0).abs() < 1e-6 && red.g.abs() < 1e-6 && red.b.abs() < 1e-6);
        let green = Rgb::from_hsl(120.0, 1.0, 0.5);
        assert!((green.g - 1.0).abs() < 1e-6 && green.r.abs() < 1e-6);
    }
}
