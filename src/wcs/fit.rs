//! Least-squares fit of inverse SIP polynomials from the forward ones.
//!
//! Headers written by some solvers carry A/B but no AP/BP. The inverse is
//! recovered by sampling a grid over the image, pushing each point through
//! the forward polynomials, and solving for the AP/BP coefficients that map
//! the distorted points back. Coordinates are divided by a scale (half the
//! larger image side) before building the design matrix to keep it well
//! conditioned.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use super::sip::{term_pairs, SipPolynomial, MAX_SIP_ORDER};

/// Grid points per axis.
const GRID_POINTS: usize = 25;

/// Fit AP/BP of order `min(forward order + 1, 9)`.
///
/// `crpix` and the image size define the sampled region: pixels
/// `[1, width] × [1, height]`, expressed as offsets from CRPIX.
pub(crate) fn fit_inverse(
    a: &SipPolynomial,
    b: &SipPolynomial,
    crpix: [f64; 2],
    width: usize,
    height: usize,
) -> (SipPolynomial, SipPolynomial) {
    let order = (a.order().max(b.order()) + 1).min(MAX_SIP_ORDER);
    let terms: Vec<(usize, usize)> = term_pairs(order).collect();

    let w = width.max(2) as f64;
    let h = height.max(2) as f64;
    let scale = (w.max(h) / 2.0).max(1.0);

    let n = GRID_POINTS * GRID_POINTS;
    let mut design = DMatrix::<f64>::zeros(n, terms.len());
    let mut rhs_u = DVector::<f64>::zeros(n);
    let mut rhs_v = DVector::<f64>::zeros(n);

    let step = |lo: f64, hi: f64, k: usize| lo + (hi - lo) * k as f64 / (GRID_POINTS - 1) as f64;
    let mut row = 0;
    for gy in 0..GRID_POINTS {
        for gx in 0..GRID_POINTS {
            let u = step(1.0, w, gx) - crpix[0];
            let v = step(1.0, h, gy) - crpix[1];
            let du = u + a.eval(u, v);
            let dv = v + b.eval(u, v);

            let (su, sv) = (du / scale, dv / scale);
            for (col, &(i, j)) in terms.iter().enumerate() {
                design[(row, col)] = su.powi(i as i32) * sv.powi(j as i32);
            }
            rhs_u[row] = u - du;
            rhs_v[row] = v - dv;
            row += 1;
        }
    }

    let svd = design.svd(true, true);
    let cu = svd
        .solve(&rhs_u, 1e-12)
        .unwrap_or_else(|_| DVector::zeros(terms.len()));
    let cv = svd
        .solve(&rhs_v, 1e-12)
        .unwrap_or_else(|_| DVector::zeros(terms.len()));

    let mut ap = SipPolynomial::zero(order);
    let mut bp = SipPolynomial::zero(order);
    for (col, &(i, j)) in terms.iter().enumerate() {
        let norm = scale.powi((i + j) as i32);
        ap.set(i, j, cu[col] / norm);
        bp.set(i, j, cv[col] / norm);
    }

    debug!(
        "Fitted inverse SIP of order {} over {}x{} grid (scale {:.1})",
        order, GRID_POINTS, GRID_POINTS, scale
    );
    (ap, bp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_recovers_quadratic_inverse() {
        let mut a = SipPolynomial::zero(2);
        a.set(2, 0, 2e-6);
        a.set(1, 1, -1e-6);
        let mut b = SipPolynomial::zero(2);
        b.set(0, 2, 1.5e-6);

        let crpix = [256.5, 200.5];
        let (ap, bp) = fit_inverse(&a, &b, crpix, 512, 400);
        assert_eq!(ap.order(), 3);

        for &(u, v) in &[(0.0, 0.0), (-200.0, 150.0), (250.0, -190.0), (100.0, 40.0)] {
            let du = u + a.eval(u, v);
            let dv = v + b.eval(u, v);
            let ru = du + ap.eval(du, dv);
            let rv = dv + bp.eval(du, dv);
            assert!(
                (ru - u).abs() < 1e-3 && (rv - v).abs() < 1e-3,
                "round trip ({}, {}) -> ({}, {})",
                u,
                v,
                ru,
                rv
            );
        }
    }

    #[test]
    fn test_zero_forward_gives_zero_inverse() {
        let a = SipPolynomial::zero(3);
        let b = SipPolynomial::zero(3);
        let (ap, bp) = fit_inverse(&a, &b, [50.0, 50.0], 100, 100);
        assert!((0..=4).all(|i| (0..=4 - i).all(|j| ap.get(i, j).abs() < 1e-12)));
        assert!((0..=4).all(|i| (0..=4 - i).all(|j| bp.get(i, j).abs() < 1e-12)));
    }
}
