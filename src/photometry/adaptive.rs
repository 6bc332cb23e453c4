//! FWHM on a full frame with a measurement box that grows to fit the star.
//!
//! The star is first measured in a small box around the requested position.
//! A box much smaller than the star clips the wings of the profile, so while
//! `fwhm × grow_trigger` exceeds the box size, the box is re-cut at
//! `fwhm × box_fwhm_factor` around the refined center and measured again.

use tracing::debug;

use super::{compute_fwhm, extract_box, FwhmConfig, StarMeasurement};
use crate::error::{Error, Result};
use crate::fits::PixelData;

/// Configuration for [`compute_adaptive_fwhm`].
#[derive(Debug, Clone)]
pub struct AdaptiveFwhmConfig {
    /// Size of the first measurement box in pixels, or in arcseconds when a
    /// plate scale is supplied.
    /// Default: 20
    pub initial_box: usize,

    /// Maximum number of box re-sizes.
    /// Default: 3
    pub max_iterations: usize,

    /// New box size as a multiple of the last FWHM.
    /// Default: 10.0
    pub box_fwhm_factor: f64,

    /// Grow the box while `fwhm × grow_trigger` is larger than it.
    /// Default: 5.0
    pub grow_trigger: f64,

    /// Settings for each individual measurement.
    pub fwhm: FwhmConfig,
}

impl Default for AdaptiveFwhmConfig {
    fn default() -> Self {
        Self {
            initial_box: 20,
            max_iterations: 3,
            box_fwhm_factor: 10.0,
            grow_trigger: 5.0,
            fwhm: FwhmConfig::default(),
        }
    }
}

/// Measure the star nearest `(x, y)` in a full image.
///
/// `plate_scale` is in arcseconds per pixel; when given, `initial_box` is
/// interpreted in arcseconds. The returned center is in image coordinates.
///
/// The box never grows past half the smaller image dimension.
pub fn compute_adaptive_fwhm(
    pixels: &PixelData,
    width: usize,
    height: usize,
    x: f64,
    y: f64,
    plate_scale: Option<f64>,
    config: &AdaptiveFwhmConfig,
) -> Result<StarMeasurement> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidInput("image is empty".into()));
    }
    if pixels.len() != width * height {
        return Err(Error::InvalidInput(format!(
            "pixel buffer length {} does not match {}x{}",
            pixels.len(),
            width,
            height
        )));
    }
    if !(x >= 0.0 && y >= 0.0 && x < width as f64 && y < height as f64) {
        return Err(Error::InvalidInput(format!(
            "position ({x}, {y}) is outside the {width}x{height} image"
        )));
    }

    let short_side = width.min(height);
    let limit = (short_side / 2).max(1);
    let mut size = match plate_scale {
        Some(scale) if scale > 0.0 => (config.initial_box as f64 / scale).ceil() as usize,
        _ => config.initial_box,
    };
    size = size.clamp(1, short_side);

    let mut measurement = measure_box(pixels, width, height, (x, y), size, &config.fwhm)?;
    debug!(
        "Adaptive FWHM: box {} px, fwhm {:.3} at ({:.1}, {:.1})",
        size, measurement.fwhm, measurement.center.0, measurement.center.1
    );

    for _ in 0..config.max_iterations {
        if measurement.fwhm * config.grow_trigger <= size as f64 {
            break;
        }
        let grown = ((measurement.fwhm * config.box_fwhm_factor).ceil() as usize).min(limit);
        if grown <= size {
            break;
        }
        size = grown;
        measurement = measure_box(pixels, width, height, measurement.center, size, &config.fwhm)?;
        debug!(
            "Adaptive FWHM: grew box to {} px, fwhm {:.3} at ({:.1}, {:.1})",
            size, measurement.fwhm, measurement.center.0, measurement.center.1
        );
    }

    Ok(measurement)
}

/// Cut a box around `center`, measure it, and move the result back to image coordinates.
fn measure_box(
    pixels: &PixelData,
    width: usize,
    height: usize,
    (cx, cy): (f64, f64),
    size: usize,
    config: &FwhmConfig,
) -> Result<StarMeasurement> {
    let sub = extract_box(pixels, width, height, cx, cy, size);
    let mut m = compute_fwhm(&sub.data, sub.width, sub.height, None, config)?;
    m.center = (m.center.0 + sub.x0 as f64, m.center.1 + sub.y0 as f64);
    Ok(m)
}
