//! Color parsing and palettes for SVG output.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Simple RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };
    pub const WHITE: Rgb = Rgb { r: 255, g: 255, b: 255 };

    #[inline] pub const fn new(r: u8, g: u8, b: u8) -> Self { Self { r, g, b } }

    /// Parse `#rrggbb`, `#rgb`, a single-letter plot color (`k`, `g`, ...) or a CSS color name.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Some(hex) = value.strip_prefix('#') {
            if !hex.is_ascii() { return None }
            return match hex.len() {
                6 => Some(Self::new(
                    u8::from_str_radix(&hex[0..2], 16).ok()?,
                    u8::from_str_radix(&hex[2..4], 16).ok()?,
                    u8::from_str_radix(&hex[4..6], 16).ok()?,
                )),
                3 => {
                    let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|d| d * 17);
                    Some(Self::new(digit(0)?, digit(1)?, digit(2)?))
                }
                _ => None,
            };
        }

        let (r, g, b) = match value.to_ascii_lowercase().as_str() {
            "k" | "black" => (0, 0, 0),
            "w" | "white" => (255, 255, 255),
            "r" => (255, 0, 0),
            "g" => (0, 128, 0),
            "b" => (0, 0, 255),
            "c" | "cyan" | "aqua" => (0, 191, 191),
            "m" => (191, 0, 191),
            "y" => (191, 191, 0),
            "red" => (255, 0, 0),
            "green" => (0, 128, 0),
            "blue" => (0, 0, 255),
            "navy" => (0, 0, 128),
            "teal" => (0, 128, 128),
            "orange" => (255, 165, 0),
            "gold" => (255, 215, 0),
            "crimson" => (220, 20, 60),
            "purple" => (128, 0, 128),
            "darkmagenta" => (139, 0, 139),
            "magenta" | "fuchsia" => (255, 0, 255),
            "thistle" => (216, 191, 216),
            "paleturquoise" => (175, 238, 238),
            "turquoise" => (64, 224, 208),
            "steelblue" => (70, 130, 180),
            "skyblue" => (135, 206, 235),
            "lightblue" => (173, 216, 230),
            "seagreen" => (46, 139, 87),
            "olive" => (128, 128, 0),
            "brown" => (165, 42, 42),
            "gray" | "grey" => (128, 128, 128),
            "lightgray" | "lightgrey" => (211, 211, 211),
            "darkgray" | "darkgrey" => (169, 169, 169),
            _ => return None,
        };
        Some(Self::new(r, g, b))
    }
}

impl fmt::Display for Rgb {
    /// Format as CSS hex: #rrggbb
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Rgb::parse(&value).ok_or_else(|| format!("unrecognised color {value:?}"))
    }
}

impl From<Rgb> for String {
    fn from(color: Rgb) -> Self { color.to_string() }
}

/// HSL color: h in degrees, s and l in [0.0, 1.0].
#[derive(Clone, Copy, Debug)]
pub(crate) struct Hsl {
    pub(crate) h: f64,
    pub(crate) s: f64,
    pub(crate) l: f64,
}

impl From<Hsl> for Rgb {
    fn from(hsl: Hsl) -> Self {
        let h = (hsl.h % 360.0 + 360.0) % 360.0 / 60.0;
        let c = (1.0 - (2.0 * hsl.l - 1.0).abs()) * hsl.s;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = hsl.l - c / 2.0;
        let channel = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Rgb::new(channel(r), channel(g), channel(b))
    }
}

const GOLDEN_ANGLE: f64 = 137.50776405;

/// Distinct fallback color for the `index`-th layer without an explicit color.
pub(crate) fn golden_angle_color(index: usize) -> Rgb {
    Hsl { h: ((index as f64) * GOLDEN_ANGLE) % 360.0, s: 0.70, l: 0.55 }.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_and_names() {
        assert_eq!(Rgb::parse("#d8bfd8"), Some(Rgb::new(216, 191, 216)));
        assert_eq!(Rgb::parse("#fff"), Some(Rgb::WHITE));
        assert_eq!(Rgb::parse("thistle"), Rgb::parse("#D8BFD8"));
        assert_eq!(Rgb::parse("k"), Some(Rgb::BLACK));
        assert_eq!(Rgb::parse("PaleTurquoise"), Some(Rgb::new(175, 238, 238)));
        assert_eq!(Rgb::parse("not-a-color"), None);
        assert_eq!(Rgb::parse("#12345"), None);
    }

    #[test]
    fn displays_as_hex() {
        assert_eq!(Rgb::new(220, 20, 60).to_string(), "#dc143c");
    }

    #[test]
    fn hsl_primaries() {
        assert_eq!(Rgb::from(Hsl { h: 0.0, s: 1.0, l: 0.5 }), Rgb::new(255, 0, 0));
        assert_eq!(Rgb::from(Hsl { h: 120.0, s: 1.0, l: 0.5 }), Rgb::new(0, 255, 0));
        assert_eq!(Rgb::from(Hsl { h: 240.0, s: 1.0, l: 0.5 }), Rgb::new(0, 0, 255));
    }

    #[test]
    fn golden_angle_colors_differ() {
        assert_ne!(golden_angle_color(0), golden_angle_color(1));
    }
}
