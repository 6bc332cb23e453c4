//! Zenithal projections between the unit sphere and the tangent plane at CRVAL.
//!
//! Both directions share one orthonormal basis `(i, j, r)` built at the
//! reference point `r`:
//!
//! ```text
//! i = (r_y, -r_x, 0) / |·|      points towards decreasing RA
//! j = i × r                      points north
//! ```
//!
//! At a celestial pole `i` is taken as `(-1, 0, 0)`. Plane coordinates
//! `(x, y)` are in degrees with `x` increasing eastwards (towards increasing RA).

use nalgebra::Vector3;

/// Projection family from the `CTYPE` cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Gnomonic.
    Tan,
    /// Orthographic.
    Sin,
}

impl Projection {
    /// Parse the three-letter projection code of `RA---TAN-SIP` style axis types.
    pub fn from_ctype(ctype: &str) -> Option<Self> {
        match ctype.get(5..8)? {
            "TAN" => Some(Projection::Tan),
            "SIN" => Some(Projection::Sin),
            _ => None,
        }
    }
}

/// Unit vector for `(ra, dec)` in degrees.
pub fn radec_to_xyz(ra: f64, dec: f64) -> Vector3<f64> {
    let (ra, dec) = (ra.to_radians(), dec.to_radians());
    Vector3::new(dec.cos() * ra.cos(), dec.cos() * ra.sin(), dec.sin())
}

/// `(ra, dec)` in degrees, RA in `[0, 360)`.
pub fn xyz_to_radec(v: &Vector3<f64>) -> (f64, f64) {
    let mut ra = v.y.atan2(v.x).to_degrees();
    if ra < 0.0 {
        ra += 360.0;
    }
    if ra >= 360.0 {
        ra -= 360.0;
    }
    let dec = v.z.clamp(-1.0, 1.0).asin().to_degrees();
    (ra, dec)
}

/// Orthonormal basis of the tangent plane at a reference point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TangentBasis {
    r: Vector3<f64>,
    i: Vector3<f64>,
    j: Vector3<f64>,
}

impl TangentBasis {
    pub fn at(ra: f64, dec: f64) -> Self {
        let r = radec_to_xyz(ra, dec);
        let norm = r.x.hypot(r.y);
        let i = if norm < 1e-12 {
            Vector3::new(-1.0, 0.0, 0.0)
        } else {
            Vector3::new(r.y / norm, -r.x / norm, 0.0)
        };
        let j = i.cross(&r).normalize();
        Self { r, i, j }
    }

    /// Plane coordinates (degrees) to a unit vector. `None` when a SIN point
    /// falls outside the unit disk.
    pub fn deproject(&self, x: f64, y: f64, projection: Projection) -> Option<Vector3<f64>> {
        let x = -x.to_radians();
        let y = y.to_radians();
        let p = self.i * x + self.j * y;
        match projection {
            Projection::Tan => Some((p + self.r).normalize()),
            Projection::Sin => {
                let rho2 = x * x + y * y;
                if rho2 >= 1.0 {
                    return None;
                }
                Some(p + self.r * (1.0 - rho2).sqrt())
            }
        }
    }

    /// Unit vector to plane coordinates (degrees). `None` on or beyond the
    /// limb of the reference hemisphere.
    pub fn project(&self, s: &Vector3<f64>, projection: Projection) -> Option<(f64, f64)> {
        let s_dot_r = s.dot(&self.r);
        if s_dot_r <= 0.0 {
            return None;
        }
        let mut x = -s.dot(&self.i);
        let mut y = s.dot(&self.j);
        if projection == Projection::Tan {
            x /= s_dot_r;
            y /= s_dot_r;
        }
        Some((x.to_degrees(), y.to_degrees()))
    }
}
