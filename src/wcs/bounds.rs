//! Sky bounding box of the image footprint.

use super::{center_pixel, Wcs};
use crate::error::{Error, Result};

/// RA/Dec extent in degrees. `ra_min` may be negative and `ra_max` may exceed
/// 360 when the footprint straddles RA = 0; both stay within 180° of the
/// image-center RA.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaDecBounds {
    pub ra_min: f64,
    pub ra_max: f64,
    pub dec_min: f64,
    pub dec_max: f64,
}

impl RaDecBounds {
    pub fn ra_span(&self) -> f64 {
        self.ra_max - self.ra_min
    }

    pub fn dec_span(&self) -> f64 {
        self.dec_max - self.dec_min
    }
}

impl Wcs {
    /// Walk the image perimeter every `step` pixels and collect the RA/Dec range.
    ///
    /// If a celestial pole falls inside the image, RA spans `[0, 360]` and Dec
    /// extends to that pole.
    pub fn bounding_box(&self, step: f64) -> Result<RaDecBounds> {
        if !(step > 0.0 && step.is_finite()) {
            return Err(Error::InvalidInput(format!("boundary step must be positive, got {step}")));
        }
        let (cx, cy) = center_pixel(self.image_width, self.image_height);
        let (ra_c, dec_c) = self
            .pixel_to_sky(cx, cy)?
            .ok_or_else(|| Error::InvalidInput("image center has no sky position".into()))?;

        let mut b = RaDecBounds {
            ra_min: ra_c,
            ra_max: ra_c,
            dec_min: dec_c,
            dec_max: dec_c,
        };

        let (w, h) = (self.image_width as f64, self.image_height as f64);
        let (x_min, x_max) = (0.5, w + 0.5);
        let (y_min, y_max) = (0.5, h + 0.5);
        let n_w = (w / step).ceil() as usize + 1;
        let n_h = (h / step).ceil() as usize + 1;

        // Clockwise from the top-left corner: (start, direction, points)
        let sides = [
            ((x_min, y_min), (step, 0.0), n_w),
            ((x_max, y_min), (0.0, step), n_h),
            ((x_max, y_max), (-step, 0.0), n_w),
            ((x_min, y_max), (0.0, -step), n_h),
        ];

        for ((x0, y0), (dx, dy), n) in sides {
            for k in 0..n {
                let x = (x0 + k as f64 * dx).clamp(x_min, x_max);
                let y = (y0 + k as f64 * dy).clamp(y_min, y_max);
                let Some((mut ra, dec)) = self.pixel_to_sky(x, y)? else {
                    continue;
                };
                b.dec_min = b.dec_min.min(dec);
                b.dec_max = b.dec_max.max(dec);
                if ra - ra_c > 180.0 {
                    ra -= 360.0;
                }
                if ra_c - ra > 180.0 {
                    ra += 360.0;
                }
                b.ra_min = b.ra_min.min(ra);
                b.ra_max = b.ra_max.max(ra);
            }
        }

        if self.is_inside_image(0.0, 90.0)? {
            b.ra_min = 0.0;
            b.ra_max = 360.0;
            b.dec_max = 90.0;
        }
        if self.is_inside_image(0.0, -90.0)? {
            b.ra_min = 0.0;
            b.ra_max = 360.0;
            b.dec_min = -90.0;
        }
        Ok(b)
    }
}
