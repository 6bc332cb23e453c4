//! IRAF-style zscale display interval.
//!
//! The zscale algorithm picks a display range `(vmin, vmax)` that follows the
//! bulk of the sky and ignores outliers such as cosmic rays and saturated
//! stars:
//!
//! 1. Take an evenly strided sample of the finite pixel values and sort it.
//! 2. Fit a straight line to the sorted sample (value against rank) with
//!    iterative k-sigma rejection of points far from the line.
//! 3. Center the interval on the sample median and scale its width by the
//!    fitted slope divided by the contrast parameter, clipped to the sample range.
//!
//! The interval is used for display scaling only; the pixel buffer is never
//! modified.

use tracing::debug;

use crate::fits::PixelData;

/// Tuning parameters for [`zscale`].
#[derive(Debug, Clone)]
pub struct ZscaleConfig {
    /// Maximum number of values sampled from the input.
    /// Default: 1000
    pub n_samples: usize,

    /// Scaling applied to the fitted slope; smaller values widen the interval.
    /// A value `<= 0` leaves the slope unchanged.
    /// Default: 0.25
    pub contrast: f64,

    /// Largest fraction of the sample that may be rejected before the fit is
    /// abandoned in favour of the raw sample range.
    /// Default: 0.5
    pub max_reject: f64,

    /// Minimum number of accepted points for the fit to be used.
    /// Default: 5
    pub min_npixels: usize,

    /// Rejection threshold in units of the residual standard deviation.
    /// Default: 2.5
    pub krej: f64,

    /// Maximum number of fit/reject iterations.
    /// Default: 5
    pub max_iterations: usize,

    /// Dilation of the rejection mask as a fraction of the sample size. Each
    /// rejected point also rejects the following
    /// `max(1, floor(npix * grow_fraction)) - 1` points. `0.0` disables
    /// dilation.
    /// Default: 0.0
    pub grow_fraction: f64,
}

impl Default for ZscaleConfig {
    fn default() -> Self {
        Self {
            n_samples: 1000,
            contrast: 0.25,
            max_reject: 0.5,
            min_npixels: 5,
            krej: 2.5,
            max_iterations: 5,
            grow_fraction: 0.0,
        }
    }
}

/// Display intensity interval with `vmin <= vmax`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub vmin: f64,
    pub vmax: f64,
}

impl Interval {
    pub fn new(vmin: f64, vmax: f64) -> Self {
        Self { vmin, vmax }
    }

    pub fn width(&self) -> f64 {
        self.vmax - self.vmin
    }

    /// Map `v` into `[0, 1]`, clamping values outside the interval.
    ///
    /// A zero-width interval (constant image) maps every value to `0.5`.
    /// Non-finite values map to `0.0`.
    pub fn normalize(&self, v: f64) -> f64 {
        if !v.is_finite() {
            return 0.0;
        }
        let width = self.width();
        if !(width > 0.0) {
            return 0.5;
        }
        ((v - self.vmin) / width).clamp(0.0, 1.0)
    }

    /// Map `v` to an 8-bit display level.
    pub fn to_u8(&self, v: f64) -> u8 {
        (self.normalize(v) * 255.0).round() as u8
    }
}

/// One least-squares line fit of sample value against sample index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
}

/// Compute the zscale interval of `values`.
///
/// Non-finite values are ignored. An input without finite values yields
/// `Interval { vmin: 0.0, vmax: 0.0 }`.
pub fn zscale<I>(values: I, config: &ZscaleConfig) -> Interval
where
    I: IntoIterator<Item = f64>,
    I::IntoIter: Clone,
{
    let samples = sample(values.into_iter(), config.n_samples);
    zscale_sorted(&samples, config)
}

/// Zscale on an already sorted, finite sample.
pub fn zscale_sorted(samples: &[f64], config: &ZscaleConfig) -> Interval {
    let npix = samples.len();
    let (Some(&first), Some(&last)) = (samples.first(), samples.last()) else {
        return Interval::new(0.0, 0.0);
    };
    let mut vmin = first;
    let mut vmax = last;

    let minpix = config
        .min_npixels
        .max((npix as f64 * config.max_reject).floor() as usize);
    let ngrow = if config.grow_fraction > 0.0 {
        ((npix as f64 * config.grow_fraction).floor() as usize).max(1)
    } else {
        1
    };

    let mut rejected = vec![false; npix];
    let mut ngood = npix;
    let mut last_ngood = npix + 1;
    let mut fit = LineFit {
        slope: 0.0,
        intercept: 0.0,
    };
    let mut iterations = 0;

    for _ in 0..config.max_iterations {
        if ngood >= last_ngood || ngood < minpix {
            break;
        }
        fit = line_fit(samples, &rejected);
        let residuals: Vec<f64> = samples
            .iter()
            .enumerate()
            .map(|(i, &s)| s - (fit.slope * i as f64 + fit.intercept))
            .collect();
        let sigma = accepted_std(&residuals, &rejected);

        rejected = next_mask(&residuals, config.krej * sigma, ngrow);
        last_ngood = ngood;
        ngood = rejected.iter().filter(|&&r| !r).count();
        iterations += 1;
    }

    debug!(
        "zscale: {} samples, {} accepted after {} iterations (minimum {})",
        npix, ngood, iterations, minpix
    );

    if ngood >= minpix {
        let slope = if config.contrast > 0.0 {
            fit.slope / config.contrast
        } else {
            fit.slope
        };
        // The sample is sorted, so the median is a direct selection.
        let median = samples[npix / 2];
        let center = ((npix - 1) / 2) as f64;
        vmin = vmin.max(median - (center - 1.0) * slope);
        vmax = vmax.min(median + (npix as f64 - center) * slope);
    }

    Interval::new(vmin, vmax)
}

/// Draw an evenly strided, sorted sample of up to `n_samples` finite values.
pub fn sample<I>(values: I, n_samples: usize) -> Vec<f64>
where
    I: Iterator<Item = f64> + Clone,
{
    let n_finite = values.clone().filter(|v| v.is_finite()).count();
    let stride = (n_finite / n_samples.max(1)).max(1);

    let mut samples = Vec::with_capacity(n_samples.min(n_finite));
    samples.extend(
        values
            .filter(|v| v.is_finite())
            .step_by(stride)
            .take(n_samples),
    );
    samples.sort_unstable_by(|a, b| a.total_cmp(b));
    samples
}

/// Ordinary least squares of `samples[i]` against `i` over non-rejected points.
///
/// Degenerate systems (fewer than two points) fit a flat line through the mean.
pub fn line_fit(samples: &[f64], rejected: &[bool]) -> LineFit {
    let (mut n, mut sx, mut sy, mut sxy, mut sxx) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (i, (&y, &bad)) in samples.iter().zip(rejected).enumerate() {
        if bad {
            continue;
        }
        let x = i as f64;
        n += 1.0;
        sx += x;
        sy += y;
        sxy += x * y;
        sxx += x * x;
    }
    if n == 0.0 {
        return LineFit {
            slope: 0.0,
            intercept: 0.0,
        };
    }
    let denom = n * sxx - sx * sx;
    let slope = if denom != 0.0 {
        (n * sxy - sx * sy) / denom
    } else {
        0.0
    };
    LineFit {
        slope,
        intercept: (sy - slope * sx) / n,
    }
}

/// Population standard deviation of the residuals not currently rejected.
fn accepted_std(residuals: &[f64], rejected: &[bool]) -> f64 {
    let accepted = || {
        residuals
            .iter()
            .zip(rejected)
            .filter(|(_, bad)| !**bad)
            .map(|(&r, _)| r)
    };
    let n = accepted().count();
    if n == 0 {
        return 0.0;
    }
    let mean = accepted().sum::<f64>() / n as f64;
    let var = accepted().map(|r| (r - mean) * (r - mean)).sum::<f64>() / n as f64;
    var.sqrt()
}

/// Rejection mask for one iteration, built fresh from the residuals.
///
/// A point is rejected when `|residual| > threshold`; each rejection extends
/// over the following `ngrow - 1` points.
pub fn next_mask(residuals: &[f64], threshold: f64, ngrow: usize) -> Vec<bool> {
    let n = residuals.len();
    let mut mask = vec![false; n];
    for (i, r) in residuals.iter().enumerate() {
        if r.abs() > threshold {
            let end = (i + ngrow.max(1)).min(n);
            mask[i..end].iter_mut().for_each(|m| *m = true);
        }
    }
    mask
}

/// Map every pixel to an 8-bit display level through `interval`.
pub fn display_levels(pixels: &PixelData, interval: Interval) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels.len());
    out.extend(pixels.iter().map(|v| interval.to_u8(v)));
    out
}

impl PixelData {
    /// Zscale interval of this buffer.
    pub fn zscale(&self, config: &ZscaleConfig) -> Interval {
        zscale(self.iter(), config)
    }
}
