//! FITS header: 2880-byte blocks of 80-character card images.

use std::collections::HashMap;

use crate::error::{FormatError, Result};

/// Size of one FITS logical record.
pub const BLOCK_SIZE: usize = 2880;
/// Size of one header card image.
pub const CARD_SIZE: usize = 80;
/// Cards per header block.
pub const CARDS_PER_BLOCK: usize = BLOCK_SIZE / CARD_SIZE;

/// Parsed FITS header.
///
/// Maps the trimmed keyword (card columns 0..8) to the trimmed value text
/// (columns 10..80). The value text is stored verbatim, including any quoted
/// string delimiters and trailing `/ comment`; the typed accessors strip those.
/// Keywords are case-sensitive and a repeated keyword keeps its last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: HashMap<String, String>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the header at the start of `bytes`.
    ///
    /// Returns the header and the length of the header unit in bytes, which is
    /// the smallest multiple of [`BLOCK_SIZE`] containing the `END` card. The
    /// data unit starts at that offset.
    pub fn parse(bytes: &[u8]) -> Result<(Self, usize)> {
        let mut header = Header::new();
        let mut offset = 0usize;

        loop {
            let block = bytes
                .get(offset..offset + BLOCK_SIZE)
                .ok_or(FormatError::MissingEnd)?;
            offset += BLOCK_SIZE;

            // Columns are byte positions; slice before decoding text
            for card in block.chunks_exact(CARD_SIZE) {
                let keyword = String::from_utf8_lossy(&card[..8]);
                let keyword = keyword.trim();
                if keyword == "END" {
                    return Ok((header, offset));
                }
                if keyword.is_empty() {
                    continue;
                }
                let value = String::from_utf8_lossy(&card[10..]);
                header.insert(keyword, value.trim());
            }
        }
    }

    /// Insert or replace a card value.
    pub fn insert(&mut self, keyword: impl Into<String>, value: impl Into<String>) {
        self.cards.insert(keyword.into(), value.into());
    }

    pub fn remove(&mut self, keyword: &str) -> Option<String> {
        self.cards.remove(keyword)
    }

    /// Raw value text of a keyword, as stored on the card.
    pub fn raw(&self, keyword: &str) -> Option<&str> {
        self.cards.get(keyword).map(String::as_str)
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.cards.contains_key(keyword)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cards.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Value with any trailing comment and string quotes removed.
    pub fn get_str(&self, keyword: &str) -> Option<&str> {
        self.raw(keyword).map(strip_value)
    }

    /// Numeric value of a keyword; `None` if absent or not a number.
    pub fn get_f64(&self, keyword: &str) -> Option<f64> {
        self.get_str(keyword).and_then(parse_f64)
    }

    /// Integer value of a keyword; `None` if absent or not an integer.
    pub fn get_i64(&self, keyword: &str) -> Option<i64> {
        self.get_str(keyword).and_then(|v| v.parse::<i64>().ok())
    }

    pub fn require_str(&self, keyword: &str) -> Result<&str> {
        self.get_str(keyword)
            .ok_or_else(|| FormatError::MissingKeyword(keyword.to_string()).into())
    }

    pub fn require_f64(&self, keyword: &str) -> Result<f64> {
        let value = self.require_str(keyword)?;
        parse_f64(value).ok_or_else(|| invalid(keyword, value))
    }

    pub fn require_i64(&self, keyword: &str) -> Result<i64> {
        let value = self.require_str(keyword)?;
        value.parse::<i64>().map_err(|_| invalid(keyword, value))
    }

    /// Optional numeric keyword: absent is `Ok(None)`, present but unparsable is an error.
    pub fn optional_f64(&self, keyword: &str) -> Result<Option<f64>> {
        match self.get_str(keyword) {
            None => Ok(None),
            Some(value) => parse_f64(value)
                .map(Some)
                .ok_or_else(|| invalid(keyword, value)),
        }
    }
}

fn invalid(keyword: &str, value: &str) -> crate::Error {
    FormatError::InvalidValue {
        keyword: keyword.to_string(),
        value: value.to_string(),
    }
    .into()
}

/// Strip a trailing `/ comment` and surrounding quotes from a card value.
///
/// A quoted string keeps any `/` inside its quotes; `''` inside a string is an
/// escaped quote.
fn strip_value(value: &str) -> &str {
    if let Some(rest) = value.strip_prefix('\'') {
        let bytes = rest.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    i += 2;
                    continue;
                }
                return rest[..i].trim_end();
            }
            i += 1;
        }
        return rest.trim_end();
    }
    match value.find('/') {
        Some(slash) => value[..slash].trim(),
        None => value.trim(),
    }
}

/// Parse a FITS numeric literal, accepting the Fortran `D` exponent.
fn parse_f64(value: &str) -> Option<f64> {
    value
        .parse::<f64>()
        .ok()
        .or_else(|| value.replace(['D', 'd'], "E").parse::<f64>().ok())
}
