//! Image normalization for container artwork.
//!
//! Every thumbnail is decoded and re-encoded as PNG so a container always
//! declares the same image type regardless of what the source served.

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};

use crate::error::{Context, Result};

/// Canonical artwork encoding.
pub const CANONICAL_MEDIA_TYPE: &str = "image/png";

/// Artwork after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pub data: Vec<u8>,
    /// Always [`CANONICAL_MEDIA_TYPE`].
    pub media_type: String,
    pub width: u32,
    pub height: u32,
    pub was_resized: bool,
}

/// Decode `data`, shrink it to fit `max_dimension` if given, and re-encode as PNG.
pub fn normalize_to_png(data: &[u8], max_dimension: Option<u32>) -> Result<NormalizedImage> {
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .context("failed to guess image format")?
        .decode()
        .context("failed to decode image")?;

    let (orig_width, orig_height) = img.dimensions();
    let (width, height, img) = match max_dimension {
        Some(max) => resize_to_fit(img, max),
        None => (orig_width, orig_height, img),
    };

    let mut output = Cursor::new(Vec::new());
    img.write_to(&mut output, ImageFormat::Png)
        .context("failed to encode as PNG")?;

    Ok(NormalizedImage {
        data: output.into_inner(),
        media_type: CANONICAL_MEDIA_TYPE.to_string(),
        width,
        height,
        was_resized: (width, height) != (orig_width, orig_height),
    })
}

/// Resize image to fit within max dimension, preserving aspect ratio.
fn resize_to_fit(img: DynamicImage, max_dimension: u32) -> (u32, u32, DynamicImage) {
    let (width, height) = img.dimensions();

    if max_dimension == 0 || (width <= max_dimension && height <= max_dimension) {
        return (width, height, img);
    }

    let ratio = if width > height {
        max_dimension as f64 / width as f64
    } else {
        max_dimension as f64 / height as f64
    };

    let new_width = ((width as f64 * ratio).round() as u32).max(1);
    let new_height = ((height as f64 * ratio).round() as u32).max(1);

    let resized = img.resize_exact(new_width, new_height, image::imageops::FilterType::Lanczos3);
    (new_width, new_height, resized)
}
