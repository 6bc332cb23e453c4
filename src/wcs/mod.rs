//! World coordinate system: pixel ↔ sky under TAN/SIN projections with SIP
//! distortion.
//!
//! Pixel coordinates follow the FITS convention: 1-based, with the center of
//! the first pixel at `(1, 1)`. Sky coordinates are `(ra, dec)` in degrees.
//!
//! ## Pixel → sky
//!
//! 1. Offsets from CRPIX are pushed through the forward SIP polynomials (A/B).
//! 2. The CD matrix maps them to intermediate world coordinates in degrees.
//! 3. The plane point is deprojected onto the sphere at CRVAL.
//!
//! Sky → pixel runs the same steps backwards with CD⁻¹ and the inverse
//! polynomials (AP/BP). A sky point that has no image on the plane (far
//! hemisphere, or outside the orthographic disk) is `Ok(None)`.

mod bounds;
mod fit;
pub mod grid;
mod projection;
mod sip;

pub use bounds::RaDecBounds;
pub use projection::{radec_to_xyz, xyz_to_radec, Projection};
pub use sip::{term_pairs, Sip, SipPolynomial, MAX_SIP_ORDER};

use nalgebra::{Matrix2, Vector2};
use tracing::{debug, warn};

use crate::error::{FormatError, NumericError, Result};
use crate::fits::Header;

use projection::TangentBasis;

/// Celestial coordinate model built from FITS header cards.
#[derive(Debug, Clone, PartialEq)]
pub struct Wcs {
    pub ctype: (String, String),
    pub projection: Projection,
    /// Reference sky position `(ra, dec)` in degrees.
    pub crval: [f64; 2],
    /// Reference pixel (1-based).
    pub crpix: [f64; 2],
    /// Linear transform from pixel offsets to intermediate world coordinates (degrees).
    pub cd: Matrix2<f64>,
    pub sip: Option<Sip>,
    pub image_width: usize,
    pub image_height: usize,
    pub wcsaxes: Option<i64>,
    pub equinox: Option<f64>,
    pub lonpole: Option<f64>,
    pub latpole: Option<f64>,
    pub cunit: (Option<String>, Option<String>),
    supported_projection: bool,
    cd_inverse: Option<Matrix2<f64>>,
    basis: TangentBasis,
}

impl Wcs {
    /// Build the model from header cards.
    ///
    /// Required: `CTYPE1/2`, `CRVAL1/2`, `CRPIX1/2`, the image size
    /// (`IMAGEW/IMAGEH` or `NAXIS1/NAXIS2`) and a linear transform (`CDi_j`,
    /// or `CDELTi` with optional `PCi_j`/`CROTA2`). An unrecognized projection
    /// is reported and treated as TAN.
    pub fn from_header(header: &Header) -> Result<Self> {
        let ctype1 = header.require_str("CTYPE1")?.to_string();
        let ctype2 = header.require_str("CTYPE2")?.to_string();

        let (projection, supported_projection) =
            match (Projection::from_ctype(&ctype1), Projection::from_ctype(&ctype2)) {
                (Some(p1), Some(p2)) if p1 == p2 => (p1, true),
                _ => {
                    warn!(
                        "Unsupported WCS projection {} / {}; falling back to TAN",
                        ctype1, ctype2
                    );
                    (Projection::Tan, false)
                }
            };

        let crval = [header.require_f64("CRVAL1")?, header.require_f64("CRVAL2")?];
        let crpix = [header.require_f64("CRPIX1")?, header.require_f64("CRPIX2")?];
        let cd = read_cd(header)?;
        let image_width = image_dimension(header, "IMAGEW", "NAXIS1")?;
        let image_height = image_dimension(header, "IMAGEH", "NAXIS2")?;

        let sip = read_sip(header, crpix, image_width, image_height)?;

        let det = cd.determinant();
        let cd_inverse = if det == 0.0 { None } else { cd.try_inverse() };

        let wcs = Wcs {
            ctype: (ctype1, ctype2),
            projection,
            crval,
            crpix,
            cd,
            sip,
            image_width,
            image_height,
            wcsaxes: header.get_i64("WCSAXES"),
            equinox: header.optional_f64("EQUINOX")?,
            lonpole: header.optional_f64("LONPOLE")?,
            latpole: header.optional_f64("LATPOLE")?,
            cunit: (
                header.get_str("CUNIT1").map(str::to_string),
                header.get_str("CUNIT2").map(str::to_string),
            ),
            supported_projection,
            cd_inverse,
            basis: TangentBasis::at(crval[0], crval[1]),
        };

        debug!(
            "WCS: {:?} at CRVAL ({:.6}, {:.6}), CRPIX ({:.2}, {:.2}), {:.3}\"/px, SIP {}",
            wcs.projection,
            crval[0],
            crval[1],
            crpix[0],
            crpix[1],
            wcs.pixel_scale(),
            wcs.sip
                .as_ref()
                .map(|s| format!("order {}/{}", s.a.order(), s.ap.order()))
                .unwrap_or_else(|| "none".into())
        );
        Ok(wcs)
    }

    /// Whether `CTYPE` named a projection this model implements.
    pub fn has_supported_projection(&self) -> bool {
        self.supported_projection
    }

    pub fn det_cd(&self) -> f64 {
        self.cd.determinant()
    }

    /// Pixel scale in arcseconds per pixel, from the CD determinant.
    pub fn pixel_scale(&self) -> f64 {
        3600.0 * self.det_cd().abs().sqrt()
    }

    /// Sky position of pixel `(x, y)`.
    pub fn pixel_to_sky(&self, x: f64, y: f64) -> Result<Option<(f64, f64)>> {
        if self.cd_inverse.is_none() {
            return Err(NumericError::SingularCd.into());
        }
        let (u, v) = (x - self.crpix[0], y - self.crpix[1]);
        let (u, v) = match &self.sip {
            Some(sip) => sip.distort(u, v),
            None => (u, v),
        };
        let iwc = self.cd * Vector2::new(u, v);
        Ok(self
            .basis
            .deproject(iwc.x, iwc.y, self.projection)
            .map(|s| xyz_to_radec(&s)))
    }

    /// Pixel position of sky point `(ra, dec)`.
    pub fn sky_to_pixel(&self, ra: f64, dec: f64) -> Result<Option<(f64, f64)>> {
        let cd_inverse = self.cd_inverse.ok_or(NumericError::SingularCd)?;
        let Some((x, y)) = self.basis.project(&radec_to_xyz(ra, dec), self.projection) else {
            return Ok(None);
        };
        let uv = cd_inverse * Vector2::new(x, y);
        let (u, v) = match &self.sip {
            Some(sip) => sip.undistort(uv.x, uv.y),
            None => (uv.x, uv.y),
        };
        Ok(Some((u + self.crpix[0], v + self.crpix[1])))
    }

    /// Sky position of the image center.
    pub fn center(&self) -> Result<Option<(f64, f64)>> {
        let (cx, cy) = center_pixel(self.image_width, self.image_height);
        self.pixel_to_sky(cx, cy)
    }

    /// Whether the sky point lands within `[0.5, w + 0.5] × [0.5, h + 0.5]`.
    pub fn is_inside_image(&self, ra: f64, dec: f64) -> Result<bool> {
        Ok(self
            .sky_to_pixel(ra, dec)?
            .is_some_and(|(x, y)| self.pixel_is_inside(x, y)))
    }

    pub(crate) fn pixel_is_inside(&self, x: f64, y: f64) -> bool {
        x >= 0.5
            && x <= self.image_width as f64 + 0.5
            && y >= 0.5
            && y <= self.image_height as f64 + 0.5
    }
}

/// Pixel at the geometric center of a `width × height` image.
pub(crate) fn center_pixel(width: usize, height: usize) -> (f64, f64) {
    (0.5 + 0.5 * width as f64, 0.5 + 0.5 * height as f64)
}

/// `CDi_j` when any is present (missing elements are zero), else
/// `CDELTi` scaled by `PCi_j` or rotated by `CROTA2`.
fn read_cd(header: &Header) -> Result<Matrix2<f64>> {
    const CD_KEYS: [&str; 4] = ["CD1_1", "CD1_2", "CD2_1", "CD2_2"];
    if CD_KEYS.iter().any(|k| header.contains(k)) {
        let mut m = [0.0; 4];
        for (slot, key) in m.iter_mut().zip(CD_KEYS) {
            *slot = header.optional_f64(key)?.unwrap_or(0.0);
        }
        return Ok(Matrix2::new(m[0], m[1], m[2], m[3]));
    }

    let (Some(cdelt1), Some(cdelt2)) = (header.optional_f64("CDELT1")?, header.optional_f64("CDELT2")?)
    else {
        return Err(FormatError::MissingKeyword("CD1_1".into()).into());
    };

    const PC_KEYS: [&str; 4] = ["PC1_1", "PC1_2", "PC2_1", "PC2_2"];
    if PC_KEYS.iter().any(|k| header.contains(k)) {
        let identity = [1.0, 0.0, 0.0, 1.0];
        let mut pc = [0.0; 4];
        for ((slot, key), default) in pc.iter_mut().zip(PC_KEYS).zip(identity) {
            *slot = header.optional_f64(key)?.unwrap_or(default);
        }
        return Ok(Matrix2::new(
            cdelt1 * pc[0],
            cdelt1 * pc[1],
            cdelt2 * pc[2],
            cdelt2 * pc[3],
        ));
    }

    let rho = header.optional_f64("CROTA2")?.unwrap_or(0.0).to_radians();
    let (sin, cos) = rho.sin_cos();
    Ok(Matrix2::new(
        cdelt1 * cos,
        -cdelt2 * sin,
        cdelt1 * sin,
        cdelt2 * cos,
    ))
}

fn image_dimension(header: &Header, keyword: &str, fallback: &str) -> Result<usize> {
    let key = if header.contains(keyword) { keyword } else { fallback };
    let n = header.require_i64(key)?;
    usize::try_from(n).map_err(|_| {
        FormatError::InvalidValue {
            keyword: key.to_string(),
            value: n.to_string(),
        }
        .into()
    })
}

/// SIP polynomials when `A_ORDER` is present. `B_ORDER` defaults to `A_ORDER`
/// and `BP_ORDER` to `AP_ORDER`; missing AP/BP are fitted.
fn read_sip(header: &Header, crpix: [f64; 2], width: usize, height: usize) -> Result<Option<Sip>> {
    let Some(a_order) = sip::read_order(header, "A_ORDER")? else {
        return Ok(None);
    };
    let b_order = sip::read_order(header, "B_ORDER")?.unwrap_or(a_order);
    let a = SipPolynomial::from_header(header, "A", a_order)?;
    let b = SipPolynomial::from_header(header, "B", b_order)?;

    let (ap, bp, inverse_fitted) = match sip::read_order(header, "AP_ORDER")? {
        Some(ap_order) => {
            let bp_order = sip::read_order(header, "BP_ORDER")?.unwrap_or(ap_order);
            (
                SipPolynomial::from_header(header, "AP", ap_order)?,
                SipPolynomial::from_header(header, "BP", bp_order)?,
                false,
            )
        }
        None if a.is_zero() && b.is_zero() => (SipPolynomial::zero(0), SipPolynomial::zero(0), false),
        None => {
            warn!("Forward SIP terms without AP/BP; fitting the inverse polynomials");
            let (ap, bp) = fit::fit_inverse(&a, &b, crpix, width, height);
            (ap, bp, true)
        }
    };

    Ok(Some(Sip {
        a,
        b,
        ap,
        bp,
        inverse_fitted,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn tan_header() -> Header {
        let mut h = Header::new();
        for (k, v) in [
            ("WCSAXES", "2"),
            ("CTYPE1", "'RA---TAN'"),
            ("CTYPE2", "'DEC--TAN'"),
            ("EQUINOX", "2000.0"),
            ("CRVAL1", "10.0"),
            ("CRVAL2", "20.0"),
            ("CRPIX1", "50.0"),
            ("CRPIX2", "50.0"),
            ("CUNIT1", "'deg     '"),
            ("CUNIT2", "'deg     '"),
            ("CD1_1", "-0.001"),
            ("CD1_2", "0.0"),
            ("CD2_1", "0.0"),
            ("CD2_2", "0.001"),
            ("IMAGEW", "100"),
            ("IMAGEH", "100"),
        ] {
            h.insert(k, v);
        }
        h
    }

    #[test]
    fn test_reference_pixel_maps_to_crval() {
        let wcs = Wcs::from_header(&tan_header()).unwrap();
        let (ra, dec) = wcs.pixel_to_sky(50.0, 50.0).unwrap().unwrap();
        assert!((ra - 10.0).abs() < 1e-12 && (dec - 20.0).abs() < 1e-12);
        assert!(wcs.has_supported_projection());
        assert_eq!(wcs.equinox, Some(2000.0));
        assert_eq!(wcs.cunit.0.as_deref(), Some("deg"));
        assert!((wcs.pixel_scale() - 3.6).abs() < 1e-9);
    }

    #[test]
    fn test_east_is_left() {
        let wcs = Wcs::from_header(&tan_header()).unwrap();
        // CD1_1 < 0: moving +x decreases RA
        let (ra, dec) = wcs.pixel_to_sky(60.0, 50.0).unwrap().unwrap();
        let expected = 10.0 - 0.01 / 20f64.to_radians().cos();
        assert!((ra - expected).abs() < 1e-6, "ra {} vs {}", ra, expected);
        assert!((dec - 20.0).abs() < 1e-5);
    }

    #[test]
    fn test_roundtrip() {
        let wcs = Wcs::from_header(&tan_header()).unwrap();
        for &(x, y) in &[(1.0, 1.0), (100.0, 1.0), (37.5, 81.25), (50.0, 50.0)] {
            let (ra, dec) = wcs.pixel_to_sky(x, y).unwrap().unwrap();
            let (x2, y2) = wcs.sky_to_pixel(ra, dec).unwrap().unwrap();
            assert!((x2 - x).abs() < 1e-8 && (y2 - y).abs() < 1e-8);
        }
    }

    #[test]
    fn test_sky_first_roundtrip_identity_cd() {
        let mut h = tan_header();
        h.insert("CD1_1", "1.0");
        h.insert("CD2_2", "1.0");
        let wcs = Wcs::from_header(&h).unwrap();
        let reference = radec_to_xyz(10.0, 20.0);

        let mut checked = 0;
        for ra in (-60..=80).step_by(10) {
            for dec in (-40..=85).step_by(5) {
                let (ra, dec) = (ra as f64, dec as f64);
                let s = radec_to_xyz(ra, dec);
                // Near hemisphere only
                if s.dot(&reference) < 0.1 {
                    continue;
                }
                let (x, y) = wcs.sky_to_pixel(ra, dec).unwrap().unwrap();
                let (ra2, dec2) = wcs.pixel_to_sky(x, y).unwrap().unwrap();
                let error = (radec_to_xyz(ra2, dec2) - s).norm().to_degrees();
                assert!(error < 1e-6, "({ra}, {dec}) -> ({ra2}, {dec2}): {error}°");
                checked += 1;
            }
        }
        assert!(checked > 50, "only {checked} points on the near hemisphere");
    }

    #[test]
    fn test_reference_at_celestial_poles() {
        for projection in ["TAN", "SIN"] {
            for pole in [90.0, -90.0] {
                let mut h = tan_header();
                h.insert("CTYPE1", format!("'RA---{projection}'"));
                h.insert("CTYPE2", format!("'DEC--{projection}'"));
                h.insert("CRVAL1", "0.0");
                h.insert("CRVAL2", pole.to_string());
                let wcs = Wcs::from_header(&h).unwrap();

                let (_, dec) = wcs.pixel_to_sky(50.0, 50.0).unwrap().unwrap();
                assert!((dec - pole).abs() < 1e-9);

                for &(x, y) in &[(20.0, 70.0), (1.0, 100.0), (95.5, 3.25)] {
                    let (ra, dec) = wcs.pixel_to_sky(x, y).unwrap().unwrap();
                    assert!(dec.abs() < 90.0 && dec.signum() == pole.signum());
                    let (x2, y2) = wcs.sky_to_pixel(ra, dec).unwrap().unwrap();
                    assert!(
                        (x2 - x).abs() < 1e-6 && (y2 - y).abs() < 1e-6,
                        "{projection} at dec {pole}: ({x}, {y}) -> ({x2}, {y2})"
                    );
                }
            }
        }
    }

    #[test]
    fn test_far_hemisphere_has_no_pixel() {
        let wcs = Wcs::from_header(&tan_header()).unwrap();
        assert_eq!(wcs.sky_to_pixel(190.0, -20.0).unwrap(), None);
        assert!(!wcs.is_inside_image(190.0, -20.0).unwrap());
        assert!(wcs.is_inside_image(10.0, 20.0).unwrap());
    }

    #[test]
    fn test_singular_cd() {
        let mut h = tan_header();
        h.insert("CD1_1", "0.001");
        h.insert("CD2_1", "0.001");
        h.insert("CD1_2", "0.001");
        h.insert("CD2_2", "0.001");
        let wcs = Wcs::from_header(&h).unwrap();
        let singular = Error::from(NumericError::SingularCd);
        assert_eq!(wcs.pixel_to_sky(1.0, 1.0).unwrap_err(), singular);
        assert_eq!(wcs.sky_to_pixel(10.0, 20.0).unwrap_err(), singular);
    }

    #[test]
    fn test_unsupported_projection_falls_back() {
        let mut h = tan_header();
        h.insert("CTYPE1", "'RA---ZEA'");
        h.insert("CTYPE2", "'DEC--ZEA'");
        let wcs = Wcs::from_header(&h).unwrap();
        assert!(!wcs.has_supported_projection());
        assert_eq!(wcs.projection, Projection::Tan);
    }

    #[test]
    fn test_missing_required_keyword() {
        let mut h = tan_header();
        h.insert("CRVAL2", "");
        assert!(matches!(
            Wcs::from_header(&h),
            Err(Error::Format(FormatError::InvalidValue { .. }))
        ));
        let mut h = Header::new();
        h.insert("CTYPE1", "'RA---TAN'");
        assert_eq!(
            Wcs::from_header(&h).unwrap_err(),
            Error::from(FormatError::MissingKeyword("CTYPE2".into()))
        );
    }

    #[test]
    fn test_cdelt_with_rotation() {
        let mut h = tan_header();
        for k in ["CD1_1", "CD1_2", "CD2_1", "CD2_2"] {
            h.remove(k);
        }
        h.insert("CDELT1", "-0.001");
        h.insert("CDELT2", "0.001");
        h.insert("CROTA2", "90.0");
        let wcs = Wcs::from_header(&h).unwrap();
        assert!((wcs.cd[(0, 0)]).abs() < 1e-15);
        assert!((wcs.cd[(0, 1)] + 0.001).abs() < 1e-15);
        assert!((wcs.cd[(1, 0)] + 0.001).abs() < 1e-15);
        assert!((wcs.det_cd() + 1e-6).abs() < 1e-15);
    }

    #[test]
    fn test_image_size_falls_back_to_naxis() {
        let mut h = tan_header();
        h.remove("IMAGEW");
        h.remove("IMAGEH");
        h.insert("NAXIS1", "640");
        h.insert("NAXIS2", "480");
        let wcs = Wcs::from_header(&h).unwrap();
        assert_eq!((wcs.image_width, wcs.image_height), (640, 480));
    }

    #[test]
    fn test_sin_projection() {
        let mut h = tan_header();
        h.insert("CTYPE1", "'RA---SIN'");
        h.insert("CTYPE2", "'DEC--SIN'");
        let wcs = Wcs::from_header(&h).unwrap();
        assert_eq!(wcs.projection, Projection::Sin);
        let (ra, dec) = wcs.pixel_to_sky(5.0, 90.0).unwrap().unwrap();
        let (x, y) = wcs.sky_to_pixel(ra, dec).unwrap().unwrap();
        assert!((x - 5.0).abs() < 1e-8 && (y - 90.0).abs() < 1e-8);
        // Far outside the orthographic disk
        assert_eq!(wcs.pixel_to_sky(50.0, 1.0e5).unwrap(), None);
    }

    #[test]
    fn test_sip_header_with_inverse() {
        let mut h = tan_header();
        h.insert("CTYPE1", "'RA---TAN-SIP'");
        h.insert("CTYPE2", "'DEC--TAN-SIP'");
        h.insert("A_ORDER", "2");
        h.insert("B_ORDER", "2");
        h.insert("A_2_0", "1.0E-5");
        h.insert("B_0_2", "-1.0E-5");
        h.insert("AP_ORDER", "2");
        h.insert("BP_ORDER", "2");
        h.insert("AP_2_0", "-1.0E-5");
        h.insert("BP_0_2", "1.0E-5");
        let wcs = Wcs::from_header(&h).unwrap();
        let sip = wcs.sip.as_ref().unwrap();
        assert!(!sip.inverse_fitted);
        assert_eq!(sip.bp.get(0, 2), 1.0e-5);

        let (ra, dec) = wcs.pixel_to_sky(90.0, 20.0).unwrap().unwrap();
        let (x, y) = wcs.sky_to_pixel(ra, dec).unwrap().unwrap();
        assert!((x - 90.0).abs() < 0.01 && (y - 20.0).abs() < 0.01);
    }

    #[test]
    fn test_sip_inverse_is_fitted_when_missing() {
        let mut h = tan_header();
        h.insert("CTYPE1", "'RA---TAN-SIP'");
        h.insert("CTYPE2", "'DEC--TAN-SIP'");
        h.insert("A_ORDER", "2");
        h.insert("A_2_0", "1.0E-5");
        h.insert("A_1_1", "-2.0E-5 / cross term");
        let wcs = Wcs::from_header(&h).unwrap();
        let sip = wcs.sip.as_ref().unwrap();
        assert!(sip.inverse_fitted);
        assert_eq!(sip.ap.order(), 3);

        for &(x, y) in &[(1.0, 1.0), (99.0, 12.0), (70.0, 95.0)] {
            let (ra, dec) = wcs.pixel_to_sky(x, y).unwrap().unwrap();
            let (x2, y2) = wcs.sky_to_pixel(ra, dec).unwrap().unwrap();
            assert!((x2 - x).abs() < 1e-3 && (y2 - y).abs() < 1e-3);
        }
    }

    #[test]
    fn test_sip_order_out_of_range() {
        let mut h = tan_header();
        h.insert("A_ORDER", "12");
        assert!(matches!(
            Wcs::from_header(&h),
            Err(Error::Format(FormatError::SipOrder { order: 12, .. }))
        ));
    }
}
