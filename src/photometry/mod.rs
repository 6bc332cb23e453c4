//! Stellar FWHM from a radial intensity profile.
//!
//! The profile is built by binning pixels by their distance from the star
//! center (one bin per pixel of radius), averaging intensity and radius in
//! each bin. The background is the mean of a border frame around the
//! sub-image. The FWHM is twice the radius at which the background-subtracted,
//! peak-normalized profile first drops to one half.
//!
//! All functions take the pixel buffer, width and height explicitly; nothing
//! refers to a "current" image.
//!
//! # Example
//!
//! ```
//! use fitsview::photometry::{compute_fwhm, FwhmConfig};
//!
//! let (w, h) = (50usize, 50usize);
//! let pixels: Vec<f64> = (0..w * h)
//!     .map(|i| {
//!         let (x, y) = ((i % w) as f64 - 25.0, (i / w) as f64 - 25.0);
//!         10.0 + 100.0 * (-(x * x + y * y) / 18.0).exp()
//!     })
//!     .collect();
//!
//! let star = compute_fwhm(&pixels, w, h, None, &FwhmConfig::default()).unwrap();
//! assert!((star.fwhm - 7.06).abs() < 0.4);
//! ```

mod adaptive;

pub use adaptive::{compute_adaptive_fwhm, AdaptiveFwhmConfig};

use crate::error::{Error, NumericError, Result};
use crate::fits::PixelData;

/// Aperture radius multipliers `{1.7, 1.9, 2.55} × FWHM` (seeing-radius set).
pub const SEEING_APERTURE_MULTIPLIERS: [f64; 3] = [1.7, 1.9, 2.55];

/// Aperture radius multipliers `{1.5, 2.0, 2.5} × FWHM` (round-number set).
pub const ROUND_APERTURE_MULTIPLIERS: [f64; 3] = [1.5, 2.0, 2.5];

/// Configuration for [`compute_fwhm`].
#[derive(Debug, Clone)]
pub struct FwhmConfig {
    /// Multipliers applied to the FWHM to obtain the three photometric
    /// aperture radii (source aperture, inner and outer background annulus).
    /// Default: [`SEEING_APERTURE_MULTIPLIERS`]
    pub aperture_multipliers: [f64; 3],

    /// Thickness of the background border frame as a fraction of the smaller
    /// image dimension.
    /// Default: 0.1
    pub border_fraction: f64,

    /// Minimum thickness of the background border frame, in pixels.
    /// Default: 5
    pub min_border: usize,

    /// Largest profile radius analysed, in pixels.
    /// Default: 30.0
    pub max_radius: f64,
}

impl Default for FwhmConfig {
    fn default() -> Self {
        Self {
            aperture_multipliers: SEEING_APERTURE_MULTIPLIERS,
            border_fraction: 0.1,
            min_border: 5,
            max_radius: 30.0,
        }
    }
}

/// Azimuthally averaged intensity profile. Empty bins are omitted, so the
/// three vectors always have the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RadialProfile {
    /// Mean distance from the center of the pixels in each bin.
    pub radius: Vec<f64>,
    /// Mean intensity of each bin.
    pub intensity: Vec<f64>,
    /// `(intensity - background) / (profile_peak - background)`.
    pub normalized_intensity: Vec<f64>,
}

/// Result of one FWHM measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct StarMeasurement {
    /// Star center `(x, y)` in the coordinates of the measured image.
    pub center: (f64, f64),
    /// Raw pixel value at `center`: the caller's position when one was
    /// given, otherwise the brightest pixel of the image.
    pub peak: f64,
    /// Largest binned mean intensity; the normalization reference.
    pub profile_peak: f64,
    /// Mean of the border frame.
    pub background: f64,
    /// Full width at half maximum in pixels, or `0.0` if the profile never
    /// drops to half maximum within the analysed radius.
    pub fwhm: f64,
    /// Half width at half maximum.
    pub hwhm: f64,
    /// `fwhm × aperture_multipliers`.
    pub aperture_radii: [f64; 3],
    pub radial_profile: RadialProfile,
}

impl StarMeasurement {
    /// Whether a half-maximum crossing was found.
    pub fn is_resolved(&self) -> bool {
        self.fwhm > 0.0
    }
}

/// An owned rectangular cut-out of a larger image.
#[derive(Debug, Clone, PartialEq)]
pub struct SubImage {
    pub data: Vec<f64>,
    pub width: usize,
    pub height: usize,
    /// Column of the cut-out's first pixel in the parent image.
    pub x0: usize,
    /// Row of the cut-out's first pixel in the parent image.
    pub y0: usize,
}

/// Copy a `size × size` box centered on `(cx, cy)`, truncated at the image edges.
pub fn extract_box(
    pixels: &PixelData,
    width: usize,
    height: usize,
    cx: f64,
    cy: f64,
    size: usize,
) -> SubImage {
    let half = (size / 2) as isize;
    let x0 = (cx.round() as isize - half).clamp(0, width as isize) as usize;
    let y0 = (cy.round() as isize - half).clamp(0, height as isize) as usize;
    let x1 = (x0 + size).min(width);
    let y1 = (y0 + size).min(height);

    let mut data = Vec::with_capacity((x1 - x0) * (y1 - y0));
    for y in y0..y1 {
        data.extend((x0..x1).map(|x| pixels.get(y * width + x).unwrap_or(f64::NAN)));
    }
    SubImage {
        data,
        width: x1 - x0,
        height: y1 - y0,
        x0,
        y0,
    }
}

/// Measure the FWHM of the star in `pixels` (row-major, `width × height`).
///
/// If `center` is `None`, the brightest pixel is used as the center.
///
/// # Errors
///
/// - [`Error::InvalidInput`] for an empty image, a buffer whose length is not
///   `width * height`, or a center outside the image.
/// - [`NumericError::ZeroContrast`] when the profile peak equals the background.
pub fn compute_fwhm(
    pixels: &[f64],
    width: usize,
    height: usize,
    center: Option<(f64, f64)>,
    config: &FwhmConfig,
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

    let ((cx, cy), peak) = match center {
        Some((cx, cy)) => {
            let (col, row) = (cx.round(), cy.round());
            if !(col >= 0.0 && row >= 0.0 && col < width as f64 && row < height as f64) {
                return Err(Error::InvalidInput(format!(
                    "center ({cx}, {cy}) is outside the {width}x{height} image"
                )));
            }
            ((cx, cy), pixels[row as usize * width + col as usize])
        }
        None => brightest_pixel(pixels, width)
            .ok_or_else(|| Error::InvalidInput("image has no finite pixels".into()))?,
    };

    let background = border_background(pixels, width, height, config)?;

    // Bins reach the nearest edge, capped at max_radius
    let edge_distance = cx.min(width as f64 - 1.0 - cx).min(cy.min(height as f64 - 1.0 - cy));
    let analysis_radius = edge_distance.min(config.max_radius).max(0.0);
    let n_bins = analysis_radius.ceil() as usize;

    let bins = radial_bins(pixels, width, height, (cx, cy), analysis_radius, n_bins);
    let profile_peak = bins
        .iter()
        .flatten()
        .map(|&(_, mean)| mean)
        .fold(f64::NEG_INFINITY, f64::max);

    if n_bins == 0 || !profile_peak.is_finite() {
        // Star sits on the image edge: nothing to profile
        return Ok(StarMeasurement {
            center: (cx, cy),
            peak,
            profile_peak: peak,
            background,
            fwhm: 0.0,
            hwhm: 0.0,
            aperture_radii: [0.0; 3],
            radial_profile: RadialProfile::default(),
        });
    }

    let contrast = profile_peak - background;
    if contrast == 0.0 || !contrast.is_finite() {
        return Err(NumericError::ZeroContrast.into());
    }

    let normalized: Vec<Option<(f64, f64)>> = bins
        .iter()
        .map(|b| b.map(|(r, mean)| (r, (mean - background) / contrast)))
        .collect();

    let fwhm = half_max_crossing(&normalized)
        .map(|r| 2.0 * r)
        .unwrap_or(0.0);

    let mut profile = RadialProfile::default();
    for (bin, norm) in bins.iter().zip(&normalized) {
        if let (Some((r, mean)), Some((_, n))) = (bin, norm) {
            profile.radius.push(*r);
            profile.intensity.push(*mean);
            profile.normalized_intensity.push(*n);
        }
    }

    let [m1, m2, m3] = config.aperture_multipliers;
    Ok(StarMeasurement {
        center: (cx, cy),
        peak,
        profile_peak,
        background,
        fwhm,
        hwhm: fwhm / 2.0,
        aperture_radii: [fwhm * m1, fwhm * m2, fwhm * m3],
        radial_profile: profile,
    })
}

/// Location and value of the first maximum pixel, ignoring non-finite values.
fn brightest_pixel(pixels: &[f64], width: usize) -> Option<((f64, f64), f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in pixels.iter().enumerate() {
        if v.is_finite() && best.map_or(true, |(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, v)| (((i % width) as f64, (i / width) as f64), v))
}

/// Mean over a border frame: full top and bottom rows, then the left and
/// right columns of the rows in between. The frame thickness is clamped to
/// the image so small cut-outs never index out of range.
fn border_background(pixels: &[f64], width: usize, height: usize, config: &FwhmConfig) -> Result<f64> {
    let border = config
        .min_border
        .max((width.min(height) as f64 * config.border_fraction).floor() as usize);
    let rows = border.min(height);
    let cols = border.min(width);

    let mut sum = 0.0;
    let mut count = 0usize;
    let mut add = |v: f64| {
        if v.is_finite() {
            sum += v;
            count += 1;
        }
    };

    for y in 0..rows {
        for x in 0..width {
            add(pixels[y * width + x]);
            add(pixels[(height - 1 - y) * width + x]);
        }
    }
    for y in rows..height.saturating_sub(rows) {
        for x in 0..cols {
            add(pixels[y * width + x]);
            add(pixels[y * width + width - 1 - x]);
        }
    }

    if count == 0 {
        return Err(Error::InvalidInput("no finite background pixels".into()));
    }
    Ok(sum / count as f64)
}

/// `(mean radius, mean intensity)` per one-pixel-wide radial bin; `None` for empty bins.
fn radial_bins(
    pixels: &[f64],
    width: usize,
    height: usize,
    (cx, cy): (f64, f64),
    radius: f64,
    n_bins: usize,
) -> Vec<Option<(f64, f64)>> {
    let mut r_sum = vec![0.0; n_bins];
    let mut v_sum = vec![0.0; n_bins];
    let mut counts = vec![0usize; n_bins];

    let x_min = (cx - radius).floor().max(0.0) as usize;
    let x_max = ((cx + radius).ceil() as usize).min(width - 1);
    let y_min = (cy - radius).floor().max(0.0) as usize;
    let y_max = ((cy + radius).ceil() as usize).min(height - 1);

    for y in y_min..=y_max {
        // distances are measured to pixel centers
        let dy = y as f64 + 0.5 - cy;
        for x in x_min..=x_max {
            let dx = x as f64 + 0.5 - cx;
            let r = (dx * dx + dy * dy).sqrt();
            let bin = r.floor() as usize;
            let v = pixels[y * width + x];
            if bin < n_bins && v.is_finite() {
                r_sum[bin] += r;
                v_sum[bin] += v;
                counts[bin] += 1;
            }
        }
    }

    (0..n_bins)
        .map(|b| {
            (counts[b] > 0).then(|| {
                let n = counts[b] as f64;
                (r_sum[b] / n, v_sum[b] / n)
            })
        })
        .collect()
}

/// Radius at which the normalized profile first falls from above 0.5 to at or
/// below 0.5 between adjacent bins, by linear interpolation.
fn half_max_crossing(normalized: &[Option<(f64, f64)>]) -> Option<f64> {
    normalized.windows(2).find_map(|w| match (w[0], w[1]) {
        (Some((r0, n0)), Some((r1, n1))) if n0 > 0.5 && n1 <= 0.5 => {
            let slope = (n1 - n0) / (r1 - r0);
            Some(r0 + (0.5 - n0) / slope)
        }
        _ => None,
    })
}
