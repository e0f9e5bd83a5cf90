//! Frame resizing and preview output.
//!
//! Ingestion only depends on the [`Transcoder`] trait; [`CoverTranscoder`]
//! is the default, backed by the `image` crate.

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbaImage};

/// Resizes decoded frames and writes preview files.
///
/// Implementations run inside blocking tasks and may be CPU heavy.
pub trait Transcoder: Send + Sync {
    /// Scales `frame` to exactly `width`x`height`.
    fn fit(&self, frame: &RgbaImage, width: u32, height: u32) -> RgbaImage;

    /// Writes `frame` as a PNG file.
    fn write_png(&self, frame: &RgbaImage, path: &Path) -> image::ImageResult<()>;
}

/// Scales to cover the target and crops the overflow around the center.
#[derive(Debug, Clone, Copy)]
pub struct CoverTranscoder {
    filter: FilterType,
}

impl CoverTranscoder {
    #[must_use]
    pub fn new(filter: FilterType) -> Self {
        Self { filter }
    }
}

impl Default for CoverTranscoder {
    fn default() -> Self {
        Self::new(FilterType::Lanczos3)
    }
}

impl Transcoder for CoverTranscoder {
    fn fit(&self, frame: &RgbaImage, width: u32, height: u32) -> RgbaImage {
        if frame.dimensions() == (width, height) {
            return frame.clone();
        }
        DynamicImage::ImageRgba8(frame.clone())
            .resize_to_fill(width, height, self.filter)
            .to_rgba8()
    }

    fn write_png(&self, frame: &RgbaImage, path: &Path) -> image::ImageResult<()> {
        frame.save_with_format(path, ImageFormat::Png)
    }
}
