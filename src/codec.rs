//! Tile-data codec: layer payload text -> raw 32-bit cell codes.

use std::io::Read;

use base64::Engine as _;
use flate2::read::{GzDecoder, ZlibDecoder};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unsupported encoding '{0}'")]
    UnsupportedEncoding(String),
    #[error("unsupported compression '{0}'")]
    UnsupportedCompression(String),
    #[error("{0}")]
    Malformed(String),
}

/// Declared text encoding of a `<data>` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Comma separated decimal ids.
    Csv,
    Base64,
    /// No `encoding` attribute: one `<tile gid=".."/>` child per cell.
    Xml,
}

impl Encoding {
    pub fn from_attr(attr: Option<&str>) -> Result<Self, DecodeError> {
        match attr.map(str::trim) {
            None | Some("") => Ok(Encoding::Xml),
            Some("csv") => Ok(Encoding::Csv),
            Some("base64") => Ok(Encoding::Base64),
            Some(other) => Err(DecodeError::UnsupportedEncoding(other.to_owned())),
        }
    }
}

/// Declared compression of a base64 payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Zlib,
    Zstd,
}

impl Compression {
    pub fn from_attr(attr: Option<&str>) -> Result<Self, DecodeError> {
        match attr.map(str::trim) {
            None | Some("") => Ok(Compression::None),
            Some("gzip") => Ok(Compression::Gzip),
            Some("zlib") => Ok(Compression::Zlib),
            Some("zstd") => Ok(Compression::Zstd),
            Some(other) => Err(DecodeError::UnsupportedCompression(other.to_owned())),
        }
    }

    fn decompress(self, bytes: Vec<u8>) -> Result<Vec<u8>, DecodeError> {
        let mut out = Vec::with_capacity(bytes.len() * 4);
        match self {
            Compression::None => return Ok(bytes),
            Compression::Gzip => GzDecoder::new(&bytes[..])
                .read_to_end(&mut out)
                .map_err(|e| DecodeError::Malformed(format!("gzip: {e}")))?,
            Compression::Zlib => ZlibDecoder::new(&bytes[..])
                .read_to_end(&mut out)
                .map_err(|e| DecodeError::Malformed(format!("zlib: {e}")))?,
            Compression::Zstd => return decompress_zstd(&bytes),
        };
        Ok(out)
    }
}

#[cfg(feature = "zstd")]
fn decompress_zstd(bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
    zstd::stream::decode_all(bytes).map_err(|e| DecodeError::Malformed(format!("zstd: {e}")))
}

#[cfg(not(feature = "zstd"))]
fn decompress_zstd(_bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
    Err(DecodeError::UnsupportedCompression("zstd".to_owned()))
}

/// Decodes a text payload into exactly `expected` cell codes.
///
/// `Encoding::Xml` has no text payload; use [`collect_cells`] on the gids of
/// the `<tile>` children instead.
pub fn decode_cells(
    encoding: Encoding,
    compression: Compression,
    payload: &str,
    expected: usize,
) -> Result<Vec<u32>, DecodeError> {
    let cells = match encoding {
        Encoding::Csv => {
            if compression != Compression::None {
                return Err(DecodeError::UnsupportedCompression(format!(
                    "{compression:?} with csv encoding"
                )));
            }
            parse_csv(payload)?
        }
        Encoding::Base64 => {
            let bytes = decode_base64(payload)?;
            let bytes = compression.decompress(bytes)?;
            words_le(&bytes)?
        }
        Encoding::Xml => {
            return Err(DecodeError::Malformed(
                "xml tile encoding carries no text payload".to_owned(),
            ))
        }
    };
    check_len(cells, expected)
}

/// Length check shared by every encoding.
pub fn collect_cells(
    gids: impl IntoIterator<Item = u32>,
    expected: usize,
) -> Result<Vec<u32>, DecodeError> {
    check_len(gids.into_iter().collect(), expected)
}

fn check_len(cells: Vec<u32>, expected: usize) -> Result<Vec<u32>, DecodeError> {
    if cells.len() != expected {
        return Err(DecodeError::Malformed(format!(
            "expected {expected} cells, decoded {}",
            cells.len()
        )));
    }
    Ok(cells)
}

fn parse_csv(payload: &str) -> Result<Vec<u32>, DecodeError> {
    payload
        .split(',')
        .map(str::trim)
        .filter(|tok| !tok.is_empty())
        .map(|tok| {
            tok.parse::<u32>()
                .map_err(|_| DecodeError::Malformed(format!("invalid csv cell '{tok}'")))
        })
        .collect()
}

fn decode_base64(payload: &str) -> Result<Vec<u8>, DecodeError> {
    let cleaned: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| DecodeError::Malformed(format!("base64: {e}")))
}

fn words_le(bytes: &[u8]) -> Result<Vec<u32>, DecodeError> {
    if bytes.len() % 4 != 0 {
        return Err(DecodeError::Malformed(format!(
            "{} bytes is not a whole number of 32-bit cells",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .collect())
}
