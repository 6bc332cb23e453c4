//! 8-bit grayscale rendering of a decoded image through a display interval.
//!
//! Rows are emitted in storage order (FITS row 0 first).

use std::path::Path;

use anyhow::Context;
use image::GrayImage;

use crate::error::{Error, Result};
use crate::fits::FitsImage;
use crate::zscale::{display_levels, Interval, ZscaleConfig};

/// Render `image` with the given interval.
pub fn to_gray_image(image: &FitsImage, interval: Interval) -> Result<GrayImage> {
    let levels = display_levels(&image.pixels, interval);
    let (w, h) = (
        u32::try_from(image.width).map_err(|_| too_large(image))?,
        u32::try_from(image.height).map_err(|_| too_large(image))?,
    );
    GrayImage::from_raw(w, h, levels).ok_or_else(|| {
        Error::InvalidInput(format!(
            "pixel buffer does not match {}x{} image",
            image.width, image.height
        ))
    })
}

/// Render `image` with its zscale interval and write it to `path`.
/// The output format follows the file extension.
pub fn save_zscaled(image: &FitsImage, path: impl AsRef<Path>, config: &ZscaleConfig) -> anyhow::Result<()> {
    let path = path.as_ref();
    let interval = image.pixels.zscale(config);
    let gray = to_gray_image(image, interval)?;
    gray.save(path)
        .with_context(|| format!("Failed to write image: {}", path.display()))?;
    Ok(())
}

fn too_large(image: &FitsImage) -> Error {
    Error::InvalidInput(format!("{}x{} image is too large to render", image.width, image.height))
}
