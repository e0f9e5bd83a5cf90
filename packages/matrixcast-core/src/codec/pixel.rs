//! Pixel and grid types shared by the extractor and the encoders.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::protocol_constants::OPAQUE_ALPHA;

/// One RGBA sample with its row-major position inside the grid.
///
/// `id` is `y * width + x`. It is stable across the frames of one animation
/// and is the address used by delta fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pixel {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
    pub id: u32,
}

impl Pixel {
    /// Returns true if the pixel is fully opaque.
    #[must_use]
    pub const fn is_opaque(&self) -> bool {
        self.alpha >= OPAQUE_ALPHA
    }

    /// Color as the controller will display it.
    ///
    /// The controller has no alpha channel: anything below full opacity is
    /// flattened to black.
    #[must_use]
    pub const fn wire_color(&self) -> Rgb {
        if self.is_opaque() {
            Rgb::new(self.red, self.green, self.blue)
        } else {
            Rgb::BLACK
        }
    }

    /// Returns true if color or opacity differ.
    #[must_use]
    pub const fn differs_from(&self, other: &Pixel) -> bool {
        self.red != other.red
            || self.green != other.green
            || self.blue != other.blue
            || self.alpha != other.alpha
    }
}

/// An opaque color as sent to the controller.
///
/// Serializes as a lowercase, zero-padded `rrggbb` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Formats the color as `rrggbb`.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.to_string()
    }

    /// Parses a six-digit hex color (case-insensitive, no leading `#`).
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HexVisitor;

        impl Visitor<'_> for HexVisitor {
            type Value = Rgb;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a six-digit hex color")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Rgb, E> {
                Rgb::from_hex(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_str(HexVisitor)
    }
}

/// All pixels of one decoded raster, in row-major order.
///
/// Invariant: `pixels[i].id == i` for every `i`, and
/// `pixels.len() == width * height`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    width: u32,
    height: u32,
    pixels: Vec<Pixel>,
}

impl PixelGrid {
    /// Wraps pixels produced by a row-major traversal.
    pub(crate) fn from_pixels(width: u32, height: u32, pixels: Vec<Pixel>) -> Self {
        debug_assert_eq!(pixels.len(), (width as usize) * (height as usize));
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Builds a grid from `[r, g, b, a]` samples listed in row-major order.
    #[cfg(test)]
    pub(crate) fn from_samples(width: u32, height: u32, samples: &[[u8; 4]]) -> Self {
        let pixels = samples
            .iter()
            .enumerate()
            .map(|(i, &[red, green, blue, alpha])| Pixel {
                red,
                green,
                blue,
                alpha,
                id: i as u32,
            })
            .collect();
        Self::from_pixels(width, height, pixels)
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    #[must_use]
    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    /// Colors as the controller displays them, indexed by pixel id.
    #[must_use]
    pub fn wire_colors(&self) -> Vec<Rgb> {
        self.pixels.iter().map(Pixel::wire_color).collect()
    }
}
