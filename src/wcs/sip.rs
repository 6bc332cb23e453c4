//! SIP (Simple Imaging Polynomial) distortion.
//!
//! Coordinates are pixel offsets `(u, v)` from CRPIX. The forward polynomials
//! map measured pixels onto the linear (CD) frame:
//!
//! ```text
//! U = u + Σ A_ij · u^i · v^j        (i + j ≤ A_ORDER)
//! V = v + Σ B_ij · u^i · v^j        (i + j ≤ B_ORDER)
//! ```
//!
//! and the inverse polynomials AP/BP map back the same way. Every term with
//! `i + j ≤ order` is evaluated, including constant and linear ones.

use crate::error::{FormatError, Result};
use crate::fits::Header;

/// Largest supported polynomial order.
pub const MAX_SIP_ORDER: usize = 9;

const GRID: usize = MAX_SIP_ORDER + 1;

/// One SIP polynomial on a 10×10 coefficient grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SipPolynomial {
    order: usize,
    /// `coeffs[i][j]` multiplies `u^i · v^j`.
    coeffs: [[f64; GRID]; GRID],
}

impl SipPolynomial {
    /// All-zero polynomial. `order` is clamped to [`MAX_SIP_ORDER`].
    pub fn zero(order: usize) -> Self {
        Self {
            order: order.min(MAX_SIP_ORDER),
            coeffs: [[0.0; GRID]; GRID],
        }
    }

    /// Read the `{name}_i_j` cards for every term of `order`. Absent cards are zero.
    pub fn from_header(header: &Header, name: &str, order: usize) -> Result<Self> {
        let mut poly = Self::zero(order);
        for (i, j) in term_pairs(poly.order) {
            if let Some(c) = header.optional_f64(&format!("{name}_{i}_{j}"))? {
                poly.coeffs[i][j] = c;
            }
        }
        Ok(poly)
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Coefficient of `u^i · v^j`; zero outside the polynomial's order.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i + j > self.order {
            return 0.0;
        }
        self.coeffs[i][j]
    }

    /// Set the coefficient of `u^i · v^j`. Terms beyond the order are ignored.
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        if i + j <= self.order {
            self.coeffs[i][j] = value;
        }
    }

    pub fn is_zero(&self) -> bool {
        term_pairs(self.order).all(|(i, j)| self.coeffs[i][j] == 0.0)
    }

    /// `Σ c_ij · u^i · v^j`
    pub fn eval(&self, u: f64, v: f64) -> f64 {
        let pu = powers(u, self.order);
        let pv = powers(v, self.order);
        term_pairs(self.order)
            .map(|(i, j)| self.coeffs[i][j] * pu[i] * pv[j])
            .sum()
    }
}

/// Forward and inverse SIP polynomials.
#[derive(Debug, Clone, PartialEq)]
pub struct Sip {
    pub a: SipPolynomial,
    pub b: SipPolynomial,
    pub ap: SipPolynomial,
    pub bp: SipPolynomial,
    /// AP/BP were absent from the header and fitted from A/B.
    pub inverse_fitted: bool,
}

impl Sip {
    /// Measured offset → linear offset.
    pub fn distort(&self, u: f64, v: f64) -> (f64, f64) {
        (u + self.a.eval(u, v), v + self.b.eval(u, v))
    }

    /// Linear offset → measured offset.
    pub fn undistort(&self, u: f64, v: f64) -> (f64, f64) {
        (u + self.ap.eval(u, v), v + self.bp.eval(u, v))
    }
}

/// Read and range-check a `*_ORDER` card.
pub(crate) fn read_order(header: &Header, keyword: &str) -> Result<Option<usize>> {
    if !header.contains(keyword) {
        return Ok(None);
    }
    let order = header.require_i64(keyword)?;
    if !(0..=MAX_SIP_ORDER as i64).contains(&order) {
        return Err(FormatError::SipOrder {
            name: keyword.to_string(),
            order,
        }
        .into());
    }
    Ok(Some(order as usize))
}

/// All `(i, j)` with `i + j ≤ order`, by increasing total degree.
pub fn term_pairs(order: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..=order).flat_map(|s| (0..=s).rev().map(move |i| (i, s - i)))
}

/// `[1, x, x², …, x^order]`, padded with zeros.
fn powers(x: f64, order: usize) -> [f64; GRID] {
    let mut p = [0.0; GRID];
    p[0] = 1.0;
    for k in 1..=order {
        p[k] = p[k - 1] * x;
    }
    p
}
