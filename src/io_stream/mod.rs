//! Sequential byte I/O for the container framing.
//!
//! # Writer
//! [`GffWriteExt`] extends any [`Write`] with the field encodings the format
//! uses: null-terminated UTF-8, 8-bit length-prefixed UTF-8 (content types),
//! and 32-bit length-prefixed bytes (payloads).
//!
//! # Reader
//! [`GffReader`] is a forward-only cursor over a fully materialized buffer.
//! It hands out borrowed slices, so decoding copies nothing until a field is
//! turned into an owned value.  Every failure reports the field being read
//! and the offset it started at.
//!
//! # Endianness
//! Length prefixes are big-endian ([`LengthOrder`]).  This is a fixed
//! property of the `JSGFF` variant; no runtime negotiation is ever performed.

use std::io::{self, Cursor, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

/// Byte order of every multi-byte length prefix.
pub type LengthOrder = BigEndian;

/// `\n` written before metadata and before chunk headers.
pub const SEPARATOR: u8 = 0x0a;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FramingError {
    #[error("Corrupted file: unexpected end of buffer at offset {offset} while reading {field}")]
    UnexpectedEof { field: &'static str, offset: usize },
    #[error("Corrupted file: missing '\\n' before {field} at offset {offset} (found 0x{found:02x})")]
    MissingSeparator { field: &'static str, offset: usize, found: u8 },
    #[error("Corrupted file: unknown content format {tag} in flags byte at offset {offset}")]
    UnknownContentFormat { tag: u8, offset: usize },
    #[error("Corrupted file: {field} at offset {offset} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str, offset: usize },
    #[error("Corrupted file: expected end of file at offset {offset}, {remaining} byte(s) remain")]
    ExpectedEndOfFile { offset: usize, remaining: usize },
    #[error("Content type '{content_type}' must be 1 to 255 bytes of UTF-8")]
    InvalidContentType { content_type: String },
    #[error("{field} is {len} bytes, more than a 32-bit length prefix can describe")]
    PayloadTooLarge { field: &'static str, len: usize },
    #[error("Failed to write {field}: {reason}")]
    Write { field: &'static str, reason: String },
}

// ── Writer ───────────────────────────────────────────────────────────────────

pub trait GffWriteExt: Write {
    /// UTF-8 text followed by a `0x00` terminator.
    ///
    /// Metadata-language text never contains NUL: the stringifier escapes
    /// every control character.
    fn write_nul_terminated_utf8(&mut self, text: &str, field: &'static str) -> Result<(), FramingError> {
        self.write_all(text.as_bytes()).map_err(|e| write_failed(field, e))?;
        self.write_u8(0).map_err(|e| write_failed(field, e))
    }

    /// One length byte followed by the UTF-8 bytes of `text`.
    fn write_lps8_utf8(&mut self, text: &str) -> Result<(), FramingError> {
        let len = u8::try_from(text.len())
            .ok()
            .filter(|&len| len > 0)
            .ok_or_else(|| FramingError::InvalidContentType { content_type: text.to_owned() })?;
        self.write_u8(len).map_err(|e| write_failed("content type", e))?;
        self.write_all(text.as_bytes()).map_err(|e| write_failed("content type", e))
    }

    /// A 32-bit length followed by `bytes`.
    fn write_lps32(&mut self, bytes: &[u8], field: &'static str) -> Result<(), FramingError> {
        let len = u32::try_from(bytes.len())
            .map_err(|_| FramingError::PayloadTooLarge { field, len: bytes.len() })?;
        self.write_u32::<LengthOrder>(len).map_err(|e| write_failed(field, e))?;
        self.write_all(bytes).map_err(|e| write_failed(field, e))
    }
}

impl<W: Write + ?Sized> GffWriteExt for W {}

fn write_failed(field: &'static str, err: io::Error) -> FramingError {
    FramingError::Write { field, reason: err.to_string() }
}

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct GffReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> GffReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { cursor: Cursor::new(buf) }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.position())
    }

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8, FramingError> {
        let offset = self.position();
        self.cursor
            .read_u8()
            .map_err(|_| FramingError::UnexpectedEof { field, offset })
    }

    pub fn read_u32(&mut self, field: &'static str) -> Result<u32, FramingError> {
        let offset = self.position();
        self.cursor
            .read_u32::<LengthOrder>()
            .map_err(|_| FramingError::UnexpectedEof { field, offset })
    }

    /// Borrow the next `len` bytes.
    pub fn read_bytes(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], FramingError> {
        let offset = self.position();
        let buf: &'a [u8] = *self.cursor.get_ref();
        let bytes = offset
            .checked_add(len)
            .and_then(|end| buf.get(offset..end))
            .ok_or(FramingError::UnexpectedEof { field, offset })?;
        self.cursor.set_position((offset + len) as u64);
        Ok(bytes)
    }

    /// Consume the `\n` separator that precedes `field`.
    pub fn expect_separator(&mut self, field: &'static str) -> Result<(), FramingError> {
        let offset = self.position();
        match self.read_u8(field)? {
            SEPARATOR => Ok(()),
            found => Err(FramingError::MissingSeparator { field, offset, found }),
        }
    }

    /// Read UTF-8 text up to (and consuming) the next `0x00`.
    pub fn read_nul_terminated_utf8(&mut self, field: &'static str) -> Result<&'a str, FramingError> {
        let offset = self.position();
        let buf: &'a [u8] = *self.cursor.get_ref();
        let rest = buf.get(offset..).unwrap_or_default();
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(FramingError::UnexpectedEof { field, offset })?;
        self.cursor.set_position((offset + len + 1) as u64);
        std::str::from_utf8(&rest[..len]).map_err(|_| FramingError::InvalidUtf8 { field, offset })
    }

    /// Read a length byte and that many UTF-8 bytes.  An empty string is the
    /// end-of-chunks marker.
    pub fn read_lps8_utf8(&mut self, field: &'static str) -> Result<&'a str, FramingError> {
        let len = self.read_u8(field)? as usize;
        let offset = self.position();
        let bytes = self.read_bytes(len, field)?;
        std::str::from_utf8(bytes).map_err(|_| FramingError::InvalidUtf8 { field, offset })
    }

    /// Read a 32-bit length and borrow that many bytes.
    pub fn read_lps32(&mut self, field: &'static str) -> Result<&'a [u8], FramingError> {
        let len = self.read_u32(field)? as usize;
        self.read_bytes(len, field)
    }
}
