//! Compression adapter for flagged content chunks.
//!
//! # Identity
//! A chunk carries a single "compressed" bit (bit 2 of its flags byte), so
//! the format knows exactly one algorithm: deflate in a zlib container
//! (RFC 1950).  Nothing identifying the codec is written to disk beyond
//! that bit.
//!
//! # Contract
//! `compress` and `decompress` are atomic: the framing engine never sees
//! partial output.  Both are pure functions of their input and safe to call
//! from several threads at once.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use thiserror::Error;

/// Default deflate level, matching zlib's own default.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Decompression error: {0}")]
    Decompression(String),
}

// ── Codec trait ──────────────────────────────────────────────────────────────

pub trait Codec: Send + Sync {
    /// Human-readable name (diagnostics only).
    fn name(&self) -> &'static str;
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
}

// ── Deflate ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct DeflateCodec {
    level: Compression,
}

impl DeflateCodec {
    /// `level` is clamped to zlib's 0..=9 range.
    pub fn with_level(level: u32) -> Self {
        Self { level: Compression::new(level.min(9)) }
    }

    pub fn level(&self) -> u32 {
        self.level.level()
    }
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self::with_level(DEFAULT_COMPRESSION_LEVEL)
    }
}

impl Codec for DeflateCodec {
    fn name(&self) -> &'static str { "deflate" }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2 + 16), self.level);
        encoder
            .write_all(data)
            .map_err(|e| CodecError::Compression(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| CodecError::Compression(e.to_string()))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(data.len().saturating_mul(2));
        ZlibDecoder::new(data)
            .read_to_end(&mut out)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        Ok(out)
    }
}
