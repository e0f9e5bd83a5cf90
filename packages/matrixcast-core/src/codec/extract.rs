//! Raster decoding into pixel grids.
//!
//! Static formats decode to a single frame. GIF files decode every frame,
//! already composited onto the logical screen, so consecutive frames can be
//! diffed pixel for pixel.

use std::io::Cursor;
use std::path::Path;

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, ImageFormat, RgbaImage};
use thiserror::Error;

use super::pixel::{Pixel, PixelGrid};

/// Errors that can occur while decoding a raster file.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file could not be read.
    #[error("failed to read raster: {0}")]
    Io(#[from] std::io::Error),

    /// The bytes are not a supported or intact raster format.
    #[error("unsupported or corrupt raster: {0}")]
    Image(#[from] image::ImageError),

    /// The container parsed but held no frames.
    #[error("raster contains no frames")]
    NoFrames,
}

/// Flattens a decoded image into a row-major [`PixelGrid`].
///
/// Pixels are visited `y` outer, `x` inner; ids are assigned during that
/// traversal.
#[must_use]
pub fn extract_grid(image: &RgbaImage) -> PixelGrid {
    let (width, height) = image.dimensions();
    let mut pixels = Vec::with_capacity((width as usize) * (height as usize));

    for y in 0..height {
        for x in 0..width {
            let [red, green, blue, alpha] = image.get_pixel(x, y).0;
            pixels.push(Pixel {
                red,
                green,
                blue,
                alpha,
                id: y * width + x,
            });
        }
    }

    PixelGrid::from_pixels(width, height, pixels)
}

/// Decodes every frame of a raster file as RGBA.
///
/// GIFs yield one image per frame; all other formats yield exactly one.
pub fn decode_frames(path: &Path) -> Result<Vec<RgbaImage>, DecodeError> {
    let bytes = std::fs::read(path)?;
    decode_frames_from_memory(&bytes)
}

/// Decodes every frame of an in-memory raster as RGBA.
pub fn decode_frames_from_memory(bytes: &[u8]) -> Result<Vec<RgbaImage>, DecodeError> {
    let format = image::guess_format(bytes)?;

    let frames = if format == ImageFormat::Gif {
        let decoder = GifDecoder::new(Cursor::new(bytes))?;
        decoder
            .into_frames()
            .collect_frames()?
            .into_iter()
            .map(|frame| frame.into_buffer())
            .collect()
    } else {
        vec![image::load_from_memory_with_format(bytes, format)?.to_rgba8()]
    };

    if frames.is_empty() {
        return Err(DecodeError::NoFrames);
    }

    Ok(frames)
}

/// Decodes a raster file into the grid of its first frame.
pub fn decode_grid(path: &Path) -> Result<PixelGrid, DecodeError> {
    let frames = decode_frames(path)?;
    frames
        .first()
        .map(extract_grid)
        .ok_or(DecodeError::NoFrames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Frame, Rgba};

    fn checkerboard(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 128])
            }
        })
    }

    #[test]
    fn extract_assigns_row_major_ids() {
        let image = RgbaImage::from_fn(4, 3, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let grid = extract_grid(&image);

        assert_eq!(grid.len(), 12);
        assert_eq!(grid.width(), 4);
        assert_eq!(grid.height(), 3);
        for pixel in grid.pixels() {
            let x = pixel.red as u32;
            let y = pixel.green as u32;
            assert_eq!(pixel.id, y * 4 + x);
        }
    }

    #[test]
    fn decode_png_keeps_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.png");
        checkerboard(2, 2).save(&path).unwrap();

        let grid = decode_grid(&path).unwrap();
        assert_eq!(grid.len(), 4);
        assert_eq!(grid.pixels()[0].alpha, 255);
        assert_eq!(grid.pixels()[1].alpha, 128);
        assert_eq!(grid.pixels()[1].blue, 255);
    }

    #[test]
    fn decode_gif_yields_every_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blink.gif");
        {
            let file = std::fs::File::create(&path).unwrap();
            let mut encoder = GifEncoder::new(file);
            let frames = [[255u8, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255]]
                .into_iter()
                .map(|color| {
                    Frame::from_parts(
                        RgbaImage::from_pixel(3, 3, Rgba(color)),
                        0,
                        0,
                        Delay::from_numer_denom_ms(100, 1),
                    )
                });
            encoder.encode_frames(frames).unwrap();
        }

        let frames = decode_frames(&path).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].get_pixel(1, 1).0, [0, 255, 0, 255]);
    }

    #[test]
    fn corrupt_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        assert!(matches!(decode_grid(&path), Err(DecodeError::Image(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = decode_grid(Path::new("/nonexistent/matrixcast/picture.png"));
        assert!(matches!(result, Err(DecodeError::Io(_))));
    }
}
