//! Decode a FITS primary image: header cards plus big-endian pixel payload.
//!
//! Only the primary HDU is read, and only the first `NAXIS1 × NAXIS2` plane of
//! it. Extensions, tables and random groups are not supported.
//!
//! # Example
//!
//! ```no_run
//! use fitsview::fits;
//!
//! let image = fits::read_fits("m31.fits").unwrap();
//! println!("{}x{} pixels, BITPIX {}", image.width, image.height, image.bitpix.code());
//! ```

mod header;
mod pixels;

pub use header::{Header, BLOCK_SIZE, CARDS_PER_BLOCK, CARD_SIZE};
pub use pixels::{Bitpix, Iter, PixelData};

use anyhow::Context;
use tracing::debug;

use crate::error::{FormatError, Result};

/// A decoded FITS image.
#[derive(Debug, Clone)]
pub struct FitsImage {
    pub header: Header,
    pub bitpix: Bitpix,
    /// `NAXIS1`
    pub width: usize,
    /// `NAXIS2`
    pub height: usize,
    /// Physical values, row-major, `width * height` long.
    pub pixels: PixelData,
}

impl FitsImage {
    /// Physical value at column `x`, row `y` (0-based).
    pub fn pixel(&self, x: usize, y: usize) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y * self.width + x)
    }
}

/// Parse only the header, returning it with the byte offset of the data unit.
pub fn decode_header(bytes: &[u8]) -> Result<(Header, usize)> {
    Header::parse(bytes)
}

/// Decode a complete FITS file held in memory.
pub fn decode(bytes: &[u8]) -> Result<FitsImage> {
    let (header, data_offset) = Header::parse(bytes)?;

    // Validate the sample format before anything is allocated for pixels.
    let bitpix = Bitpix::try_from(header.require_i64("BITPIX")?)?;
    let width = axis_length(&header, "NAXIS1")?;
    let height = axis_length(&header, "NAXIS2")?;
    let bscale = header
        .optional_f64("BSCALE")?
        .filter(|&s| s != 0.0)
        .unwrap_or(1.0);
    let bzero = header.optional_f64("BZERO")?.unwrap_or(0.0);

    let count = width
        .checked_mul(height)
        .ok_or_else(|| crate::Error::InvalidInput("image dimensions overflow".into()))?;

    debug!(
        "FITS header: {} cards, BITPIX {}, {}x{}, BSCALE {}, BZERO {}",
        header.len(),
        bitpix.code(),
        width,
        height,
        bscale,
        bzero
    );

    let data = bytes.get(data_offset..).unwrap_or(&[]);
    let pixels = PixelData::decode(data, bitpix, count, bscale, bzero)?;

    Ok(FitsImage {
        header,
        bitpix,
        width,
        height,
        pixels,
    })
}

/// Read and decode a FITS file from disk.
pub fn read_fits(path: impl AsRef<std::path::Path>) -> anyhow::Result<FitsImage> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read FITS file: {}", path.display()))?;
    let image =
        decode(&bytes).with_context(|| format!("Failed to decode FITS file: {}", path.display()))?;
    Ok(image)
}

fn axis_length(header: &Header, keyword: &str) -> Result<usize> {
    let n = header.require_i64(keyword)?;
    usize::try_from(n).map_err(|_| {
        FormatError::InvalidValue {
            keyword: keyword.to_string(),
            value: n.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fits_bytes(cards: &[String], data: &[u8]) -> Vec<u8> {
        let mut bytes: Vec<u8> = Vec::new();
        for c in cards {
            bytes.extend_from_slice(format!("{:<80}", c).as_bytes());
        }
        bytes.extend_from_slice(format!("{:<80}", "END").as_bytes());
        bytes.resize(bytes.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE, b' ');
        bytes.extend_from_slice(data);
        bytes.resize(bytes.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE, 0);
        bytes
    }

    fn cards(bitpix: i64, w: usize, h: usize) -> Vec<String> {
        vec![
            format!("{:<8}= {:>20}", "SIMPLE", "T"),
            format!("{:<8}= {:>20}", "BITPIX", bitpix),
            format!("{:<8}= {:>20}", "NAXIS", 2),
            format!("{:<8}= {:>20}", "NAXIS1", w),
            format!("{:<8}= {:>20}", "NAXIS2", h),
        ]
    }

    #[test]
    fn test_decode_dimensions() {
        let data: Vec<u8> = (0..12i16).flat_map(|v| v.to_be_bytes()).collect();
        let bytes = fits_bytes(&cards(16, 4, 3), &data);
        let image = decode(&bytes).unwrap();
        assert_eq!(image.width, 4);
        assert_eq!(image.height, 3);
        assert_eq!(image.pixels.len(), 12);
        assert_eq!(image.pixel(1, 2), Some(9.0));
        assert_eq!(image.pixel(4, 0), None);
    }

    #[test]
    fn test_unsupported_bitpix() {
        let bytes = fits_bytes(&cards(12, 2, 2), &[0u8; 16]);
        assert_eq!(
            decode(&bytes).unwrap_err(),
            crate::Error::from(FormatError::UnsupportedBitpix(12))
        );
    }

    #[test]
    fn test_missing_naxis() {
        let mut c = cards(8, 2, 2);
        c.remove(4);
        let bytes = fits_bytes(&c, &[0u8; 4]);
        assert_eq!(
            decode(&bytes).unwrap_err(),
            crate::Error::from(FormatError::MissingKeyword("NAXIS2".into()))
        );
    }

    #[test]
    fn test_bscale_bzero_applied() {
        let mut c = cards(8, 2, 1);
        c.push(format!("{:<8}= {:>20}", "BSCALE", 2));
        c.push(format!("{:<8}= {:>20} / offset", "BZERO", -10));
        let bytes = fits_bytes(&c, &[5, 100]);
        let image = decode(&bytes).unwrap();
        assert_eq!(image.pixels, PixelData::Int32(vec![0, 190]));
    }

    #[test]
    fn test_truncated_data() {
        let bytes = fits_bytes(&cards(-32, 100, 100), &[0u8; 16]);
        assert!(matches!(
            decode(&bytes),
            Err(crate::Error::Format(FormatError::Truncated { .. }))
        ));
    }
}
