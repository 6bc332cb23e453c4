//! Typed pixel storage selected by `BITPIX`.

use crate::error::{FormatError, Result};

/// Pixel sample format of a FITS data unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bitpix {
    /// `BITPIX = 8`: unsigned bytes.
    U8,
    /// `BITPIX = 16`: big-endian two's complement.
    I16,
    /// `BITPIX = 32`: big-endian two's complement.
    I32,
    /// `BITPIX = -32`: big-endian IEEE single precision.
    F32,
    /// `BITPIX = -64`: big-endian IEEE double precision.
    F64,
}

impl Bitpix {
    pub fn code(self) -> i64 {
        match self {
            Bitpix::U8 => 8,
            Bitpix::I16 => 16,
            Bitpix::I32 => 32,
            Bitpix::F32 => -32,
            Bitpix::F64 => -64,
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        (self.code().unsigned_abs() / 8) as usize
    }

    pub fn is_integer(self) -> bool {
        self.code() > 0
    }

    /// Range of raw stored values, for integer formats.
    fn raw_range(self) -> (f64, f64) {
        match self {
            Bitpix::U8 => (0.0, u8::MAX as f64),
            Bitpix::I16 => (i16::MIN as f64, i16::MAX as f64),
            Bitpix::I32 => (i32::MIN as f64, i32::MAX as f64),
            Bitpix::F32 => (f32::MIN as f64, f32::MAX as f64),
            Bitpix::F64 => (f64::MIN, f64::MAX),
        }
    }

    /// Read one raw big-endian sample. `c` holds exactly `bytes_per_pixel` bytes.
    #[inline]
    fn read(self, c: &[u8]) -> f64 {
        match self {
            Bitpix::U8 => c[0] as f64,
            Bitpix::I16 => i16::from_be_bytes([c[0], c[1]]) as f64,
            Bitpix::I32 => i32::from_be_bytes([c[0], c[1], c[2], c[3]]) as f64,
            Bitpix::F32 => f32::from_be_bytes([c[0], c[1], c[2], c[3]]) as f64,
            Bitpix::F64 => {
                f64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])
            }
        }
    }
}

impl TryFrom<i64> for Bitpix {
    type Error = FormatError;

    fn try_from(code: i64) -> std::result::Result<Self, Self::Error> {
        match code {
            8 => Ok(Bitpix::U8),
            16 => Ok(Bitpix::I16),
            32 => Ok(Bitpix::I32),
            -32 => Ok(Bitpix::F32),
            -64 => Ok(Bitpix::F64),
            other => Err(FormatError::UnsupportedBitpix(other)),
        }
    }
}

/// Decoded physical pixel values, row-major.
///
/// Integer data is held in an `i32` container; if `BSCALE`/`BZERO` would
/// produce values that `i32` cannot represent exactly (fractional scaling, or
/// an offset pushing the range past `i32`), integer data is promoted to `f64`.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    Int32(Vec<i32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl PixelData {
    /// Decode `count` samples from the data unit, applying `raw * bscale + bzero`.
    pub fn decode(
        data: &[u8],
        bitpix: Bitpix,
        count: usize,
        bscale: f64,
        bzero: f64,
    ) -> Result<Self> {
        let bpp = bitpix.bytes_per_pixel();
        let expected = count
            .checked_mul(bpp)
            .ok_or_else(|| crate::Error::InvalidInput("image dimensions overflow".into()))?;
        let payload = data.get(..expected).ok_or(FormatError::Truncated {
            expected,
            actual: data.len(),
        })?;
        let samples = payload.chunks_exact(bpp);

        let pixels = match bitpix {
            Bitpix::F32 => {
                let mut out = Vec::with_capacity(count);
                out.extend(samples.map(|c| (bitpix.read(c) * bscale + bzero) as f32));
                PixelData::Float32(out)
            }
            Bitpix::F64 => {
                let mut out = Vec::with_capacity(count);
                out.extend(samples.map(|c| bitpix.read(c) * bscale + bzero));
                PixelData::Float64(out)
            }
            _ if fits_i32(bitpix, bscale, bzero) => {
                let mut out = Vec::with_capacity(count);
                out.extend(samples.map(|c| (bitpix.read(c) * bscale + bzero) as i32));
                PixelData::Int32(out)
            }
            _ => {
                let mut out = Vec::with_capacity(count);
                out.extend(samples.map(|c| bitpix.read(c) * bscale + bzero));
                PixelData::Float64(out)
            }
        };
        Ok(pixels)
    }

    pub fn len(&self) -> usize {
        match self {
            PixelData::Int32(v) => v.len(),
            PixelData::Float32(v) => v.len(),
            PixelData::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Physical value at flat index `i`.
    #[inline]
    pub fn get(&self, i: usize) -> Option<f64> {
        match self {
            PixelData::Int32(v) => v.get(i).map(|&p| p as f64),
            PixelData::Float32(v) => v.get(i).map(|&p| p as f64),
            PixelData::Float64(v) => v.get(i).copied(),
        }
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            data: self,
            pos: 0,
        }
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.len());
        out.extend(self.iter());
        out
    }
}

/// Iterator over the physical values of a [`PixelData`].
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    data: &'a PixelData,
    pos: usize,
}

impl Iterator for Iter<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let v = self.data.get(self.pos)?;
        self.pos += 1;
        Some(v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.data.len().saturating_sub(self.pos);
        (n, Some(n))
    }
}

impl ExactSizeIterator for Iter<'_> {}

/// Whether scaled integer samples are exactly representable as `i32`.
fn fits_i32(bitpix: Bitpix, bscale: f64, bzero: f64) -> bool {
    if bscale.fract() != 0.0 || bzero.fract() != 0.0 {
        return false;
    }
    let (lo, hi) = bitpix.raw_range();
    let a = lo * bscale + bzero;
    let b = hi * bscale + bzero;
    a.min(b) >= i32::MIN as f64 && a.max(b) <= i32::MAX as f64
}
