//! Whole-file compression selected by the header's compression tag
//!
//! **Tags** (persisted as `u32` in the header):
//! - `0`: no compression
//! - `1..=9`: zlib at that level
//! - `100`: Zstd (level 3)
//! - `200`: LZ4 block format
//!
//! The codecs sit behind the `compression` cargo feature. A build without it
//! only accepts tag `0`.
//!
//! Decoding always knows the expected length (`uncompressed_size` from the
//! directory), so no size prefix is stored alongside the compressed bytes.

use crate::error::{Result, VfsError};
use serde::{Deserialize, Serialize};

pub const TAG_NONE: u32 = 0;
pub const TAG_ZLIB_MIN: u32 = 1;
pub const TAG_ZLIB_MAX: u32 = 9;
pub const TAG_ZSTD: u32 = 100;
pub const TAG_LZ4: u32 = 200;

/// Zstd level used for tag 100
pub const ZSTD_LEVEL: i32 = 3;

/// Compression method for file payloads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum CompressionMethod {
    /// No compression
    #[default]
    None,
    /// zlib with a level from 1 (fastest) to 9 (smallest)
    Zlib { level: u32 },
    /// Zstd compression (better ratio)
    Zstd,
    /// LZ4 compression (fast, moderate ratio)
    Lz4,
}

impl CompressionMethod {
    /// Decode a persisted tag
    ///
    /// Unknown tags, and any non-zero tag in a build without codecs, are
    /// rejected rather than treated as uncompressed.
    pub fn from_tag(tag: u32) -> Result<Self> {
        let method = match tag {
            TAG_NONE => return Ok(CompressionMethod::None),
            TAG_ZLIB_MIN..=TAG_ZLIB_MAX => CompressionMethod::Zlib { level: tag },
            TAG_ZSTD => CompressionMethod::Zstd,
            TAG_LZ4 => CompressionMethod::Lz4,
            _ => return Err(VfsError::UnsupportedCompressionTag(tag)),
        };

        if Self::codecs_available() {
            Ok(method)
        } else {
            Err(VfsError::UnsupportedCompressionTag(tag))
        }
    }

    pub fn tag(&self) -> u32 {
        match self {
            CompressionMethod::None => TAG_NONE,
            CompressionMethod::Zlib { level } => *level,
            CompressionMethod::Zstd => TAG_ZSTD,
            CompressionMethod::Lz4 => TAG_LZ4,
        }
    }

    /// Whether this build was compiled with the compression codecs
    pub const fn codecs_available() -> bool {
        cfg!(feature = "compression")
    }

    pub fn is_none(&self) -> bool {
        matches!(self, CompressionMethod::None)
    }

    /// Compress a whole file payload
    pub fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        match self {
            CompressionMethod::None => Ok(data.to_vec()),
            method => codecs::encode(*method, data),
        }
    }

    /// Decompress a payload that must expand to exactly `expected_len` bytes
    pub fn decode(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        if expected_len == 0 && data.is_empty() {
            return Ok(Vec::new());
        }

        let decoded = match self {
            CompressionMethod::None => data.to_vec(),
            method => codecs::decode(*method, data, expected_len)?,
        };

        if decoded.len() != expected_len {
            return Err(VfsError::Decompression(format!(
                "Expected {} bytes, got {}",
                expected_len,
                decoded.len()
            )));
        }

        Ok(decoded)
    }
}

impl TryFrom<u32> for CompressionMethod {
    type Error = VfsError;

    fn try_from(tag: u32) -> Result<Self> {
        CompressionMethod::from_tag(tag)
    }
}

impl From<CompressionMethod> for u32 {
    fn from(method: CompressionMethod) -> u32 {
        method.tag()
    }
}

#[cfg(feature = "compression")]
mod codecs {
    use super::{CompressionMethod, ZSTD_LEVEL};
    use crate::error::{Result, VfsError};
    use std::io::{Read, Write};

    pub fn encode(method: CompressionMethod, data: &[u8]) -> Result<Vec<u8>> {
        match method {
            CompressionMethod::None => Ok(data.to_vec()),
            CompressionMethod::Zlib { level } => {
                let mut encoder = flate2::write::ZlibEncoder::new(
                    Vec::new(),
                    flate2::Compression::new(level),
                );
                encoder
                    .write_all(data)
                    .map_err(|e| VfsError::Compression(format!("zlib compression failed: {}", e)))?;
                encoder
                    .finish()
                    .map_err(|e| VfsError::Compression(format!("zlib compression failed: {}", e)))
            }
            CompressionMethod::Zstd => zstd::bulk::compress(data, ZSTD_LEVEL)
                .map_err(|e| VfsError::Compression(format!("Zstd compression failed: {}", e))),
            CompressionMethod::Lz4 => Ok(lz4_flex::block::compress(data)),
        }
    }

    pub fn decode(method: CompressionMethod, data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        match method {
            CompressionMethod::None => Ok(data.to_vec()),
            CompressionMethod::Zlib { .. } => {
                read_bounded(flate2::read::ZlibDecoder::new(data), expected_len, "zlib")
            }
            CompressionMethod::Zstd => {
                let decoder = zstd::stream::read::Decoder::new(data).map_err(|e| {
                    VfsError::Decompression(format!("Zstd decompression failed: {}", e))
                })?;
                read_bounded(decoder, expected_len, "Zstd")
            }
            CompressionMethod::Lz4 => {
                if expected_len > data.len().saturating_mul(LZ4_MAX_RATIO) {
                    return Err(VfsError::Decompression(format!(
                        "LZ4 block of {} bytes cannot expand to {} bytes",
                        data.len(),
                        expected_len
                    )));
                }
                lz4_flex::block::decompress(data, expected_len)
                    .map_err(|e| VfsError::Decompression(format!("LZ4 decompression failed: {}", e)))
            }
        }
    }

    /// Upper bound on the LZ4 block expansion ratio
    const LZ4_MAX_RATIO: usize = 255;

    /// Stream-decode without trusting `expected_len` for allocation
    fn read_bounded<R: Read>(reader: R, expected_len: usize, codec: &str) -> Result<Vec<u8>> {
        let mut decoded = Vec::new();
        // One extra byte is enough to notice an oversized stream
        reader
            .take(expected_len as u64 + 1)
            .read_to_end(&mut decoded)
            .map_err(|e| VfsError::Decompression(format!("{} decompression failed: {}", codec, e)))?;
        Ok(decoded)
    }
}

#[cfg(not(feature = "compression"))]
mod codecs {
    use super::CompressionMethod;
    use crate::error::{Result, VfsError};

    pub fn encode(method: CompressionMethod, _data: &[u8]) -> Result<Vec<u8>> {
        Err(VfsError::UnsupportedCompressionTag(method.tag()))
    }

    pub fn decode(method: CompressionMethod, _data: &[u8], _expected_len: usize) -> Result<Vec<u8>> {
        Err(VfsError::UnsupportedCompressionTag(method.tag()))
    }
}
