//! # fitsview
//!
//! Astronomical image processing core for a FITS viewer: decode a FITS
//! primary image, choose a display stretch, measure stars, and convert
//! between pixel and sky coordinates.
//!
//! ## Features
//!
//! - **FITS decoding** — header cards and big-endian pixel data for `BITPIX`
//!   8, 16, 32, -32 and -64 with `BSCALE`/`BZERO` scaling
//! - **Zscale** — IRAF-style robust display interval with k-sigma rejection
//! - **Photometry** — stellar FWHM from an azimuthally averaged radial profile,
//!   with an adaptive measurement box for full frames
//! - **WCS** — TAN and SIN projections with SIP distortion, image bounding box
//!   in RA/Dec, and coordinate-grid tick and label helpers
//!
//! ## Example
//!
//! ```no_run
//! use fitsview::{fits, photometry, wcs::Wcs, zscale::ZscaleConfig};
//!
//! let image = fits::read_fits("data/m31.fits").unwrap();
//!
//! // Display stretch
//! let interval = image.pixels.zscale(&ZscaleConfig::default());
//! println!("display range {:.1} .. {:.1}", interval.vmin, interval.vmax);
//!
//! // Star near a clicked position
//! let star = photometry::compute_adaptive_fwhm(
//!     &image.pixels,
//!     image.width,
//!     image.height,
//!     512.0,
//!     384.0,
//!     None,
//!     &Default::default(),
//! )
//! .unwrap();
//! println!("FWHM {:.2} px at {:?}", star.fwhm, star.center);
//!
//! // Sky position of that star (FITS pixels are 1-based)
//! let wcs = Wcs::from_header(&image.header).unwrap();
//! if let Some((ra, dec)) = wcs.pixel_to_sky(star.center.0 + 1.0, star.center.1 + 1.0).unwrap() {
//!     println!("RA {ra:.5} Dec {dec:.5}");
//! }
//! ```
//!
//! All operations are pure functions over their inputs; the library never
//! installs a `tracing` subscriber.

#[cfg(feature = "image")]
pub mod display;
pub mod error;
pub mod fits;
pub mod photometry;
pub mod wcs;
pub mod zscale;

#[cfg(feature = "image")]
pub use display::{save_zscaled, to_gray_image};
pub use error::{Error, FormatError, NumericError, Result};
pub use fits::{decode, read_fits, FitsImage, Header, PixelData};
pub use photometry::{
    compute_adaptive_fwhm, compute_fwhm, AdaptiveFwhmConfig, FwhmConfig, StarMeasurement,
};
pub use wcs::{RaDecBounds, Wcs};
pub use zscale::{zscale, Interval, ZscaleConfig};
