//! Error taxonomy for the decoding, photometry and WCS operations.
//!
//! Three kinds of failure are distinguished:
//!
//! - [`FormatError`]: the input bytes or header do not describe something this
//!   crate can process (malformed header, unsupported `BITPIX`, missing WCS
//!   keyword). Fatal to the operation; no partial result.
//! - [`NumericError`]: the input is well-formed but numerically degenerate
//!   (singular CD matrix, star with zero contrast against its background).
//! - [`Error::InvalidInput`]: the caller passed arguments outside the domain of
//!   the operation (empty image, center outside the frame, zero grid ticks).
//!
//! "No solution" outcomes, such as a sky position on the far hemisphere, are
//! not errors; they are reported as `Ok(None)`.

use thiserror::Error;

/// Malformed or unsupported FITS content.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    #[error("header has no END card before the end of the data")]
    MissingEnd,

    #[error("unsupported BITPIX: {0}")]
    UnsupportedBitpix(i64),

    #[error("required keyword {0} is missing")]
    MissingKeyword(String),

    #[error("keyword {keyword} has an invalid value: '{value}'")]
    InvalidValue { keyword: String, value: String },

    #[error("data unit is truncated: expected {expected} bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("SIP polynomial {name} has order {order}; at most 9 is supported")]
    SipOrder { name: String, order: i64 },
}

/// Numerically degenerate input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NumericError {
    #[error("CD matrix is singular (determinant is zero)")]
    SingularCd,

    #[error("star profile peak equals the background level")]
    ZeroContrast,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Numeric(#[from] NumericError),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, Error>;
