//! Content chunk framing.
//!
//! ```text
//! | LPS8 UTF-8   | 0x0a | NUL-terminated | 1 byte | u32 BE | variable |
//! | content type |      | chunk headers  | flags  | length | payload  |
//! ```
//!
//! Flags byte, low to high: bits 0-1 content format, bit 2 deflate, bits 3-7
//! reserved (written as zero, ignored on read).

use std::borrow::Cow;
use std::io::Write;

use tracing::{debug, warn};

use crate::codec::Codec;
use crate::document::{ContentEntry, ContentFlags, ContentValue};
use crate::error::{GffError, Result};
use crate::io_stream::{FramingError, GffReader, GffWriteExt, SEPARATOR};
use crate::meta::{self, Map, Value};

pub const FORMAT_MASK:  u8 = 0b0000_0011;
pub const FLAG_DEFLATE: u8 = 0b0000_0100;

/// A zero-length content type ends the chunk sequence.
pub const END_OF_CHUNKS: u8 = 0x00;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFormat {
    Bytes      = 0,
    Text       = 1,
    Structured = 2,
}

impl ContentFormat {
    /// `None` when the format tag in `flags` is not one of the three known ones.
    pub fn from_flags(flags: u8) -> Option<Self> {
        match flags & FORMAT_MASK {
            0 => Some(ContentFormat::Bytes),
            1 => Some(ContentFormat::Text),
            2 => Some(ContentFormat::Structured),
            _ => None,
        }
    }

    pub fn flags(self, content_flags: ContentFlags) -> u8 {
        let mut byte = self as u8;
        if content_flags.compressed {
            byte |= FLAG_DEFLATE;
        }
        byte
    }
}

/// A chunk ready to be written: payload already serialized and, when
/// flagged, compressed.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedChunk {
    pub content_type: String,
    pub headers_text: String,
    pub flags:        u8,
    pub payload:      Vec<u8>,
}

impl EncodedChunk {
    pub fn write<W: Write>(&self, mut writer: W) -> std::result::Result<(), FramingError> {
        writer.write_lps8_utf8(&self.content_type)?;
        writer.write_all(&[SEPARATOR]).map_err(|e| FramingError::Write {
            field: "chunk separator",
            reason: e.to_string(),
        })?;
        writer.write_nul_terminated_utf8(&self.headers_text, "chunk headers")?;
        writer.write_all(&[self.flags]).map_err(|e| FramingError::Write {
            field: "flags byte",
            reason: e.to_string(),
        })?;
        writer.write_lps32(&self.payload, "payload")
    }
}

/// Serialize one entry.  Returns `Ok(None)` for structured values that have
/// no wire form (scalars, null, dates): those entries are skipped.
pub fn encode_chunk(content_type: &str, entry: &ContentEntry, codec: &dyn Codec) -> Result<Option<EncodedChunk>> {
    if content_type.is_empty() || content_type.len() > u8::MAX as usize {
        return Err(FramingError::InvalidContentType { content_type: content_type.to_owned() }.into());
    }

    let (format, raw): (ContentFormat, Cow<[u8]>) = match &entry.content {
        ContentValue::Bytes(bytes) => (ContentFormat::Bytes, Cow::Borrowed(bytes.as_slice())),
        ContentValue::Text(text) => (ContentFormat::Text, Cow::Borrowed(text.as_bytes())),
        ContentValue::Structured(value) => match structured_text(value) {
            Some(text) => (ContentFormat::Structured, Cow::Owned(text.into_bytes())),
            None => {
                warn!(content_type, found = value.type_name(), "skipping content with no wire format");
                return Ok(None);
            }
        },
    };

    let payload = if entry.flags.compressed {
        codec
            .compress(&raw)
            .map_err(|e| GffError::codec(format!("<{content_type}> content"), e))?
    } else {
        raw.into_owned()
    };

    let flags = format.flags(entry.flags);
    debug!(content_type, ?format, flags, len = payload.len(), "encoded chunk");

    Ok(Some(EncodedChunk {
        content_type: content_type.to_owned(),
        headers_text: meta::stringify(&entry.headers),
        flags,
        payload,
    }))
}

/// Arrays are written as a mapping keyed by element index.
fn structured_text(value: &Value) -> Option<String> {
    match value {
        Value::Map(map) => Some(meta::stringify(map)),
        Value::Array(items) => {
            let map: Map = items
                .iter()
                .enumerate()
                .map(|(i, item)| (i.to_string(), item.clone()))
                .collect();
            Some(meta::stringify(&map))
        }
        _ => None,
    }
}

/// Read the next chunk.  Returns `Ok(None)` on the end-of-chunks marker.
pub fn decode_chunk(reader: &mut GffReader<'_>, codec: &dyn Codec) -> Result<Option<(String, ContentEntry)>> {
    let content_type = reader.read_lps8_utf8("content type")?;
    if content_type.is_empty() {
        return Ok(None);
    }

    reader.expect_separator("chunk headers")?;
    let headers_text = reader.read_nul_terminated_utf8("chunk headers")?;
    let headers = meta::parse(headers_text)
        .map_err(|e| GffError::syntax(format!("<{content_type}> headers"), e))?;

    let flags_offset = reader.position();
    let flag_byte = reader.read_u8("flags byte")?;
    let format = ContentFormat::from_flags(flag_byte).ok_or(FramingError::UnknownContentFormat {
        tag:    flag_byte & FORMAT_MASK,
        offset: flags_offset,
    })?;
    let flags = ContentFlags { compressed: flag_byte & FLAG_DEFLATE != 0 };

    let payload_offset = reader.position() + 4;
    let raw = reader.read_lps32("payload")?;
    let data: Cow<[u8]> = if flags.compressed {
        Cow::Owned(
            codec
                .decompress(raw)
                .map_err(|e| GffError::codec(format!("<{content_type}> content"), e))?,
        )
    } else {
        Cow::Borrowed(raw)
    };
    debug!(content_type, ?format, flags = flag_byte, len = raw.len(), "decoded chunk");

    let content = match format {
        ContentFormat::Bytes => ContentValue::Bytes(data.into_owned()),
        ContentFormat::Text => ContentValue::Text(utf8(data, payload_offset)?),
        ContentFormat::Structured => {
            let text = utf8(data, payload_offset)?;
            let map = meta::parse(&text)
                .map_err(|e| GffError::syntax(format!("<{content_type}> content"), e))?;
            ContentValue::Structured(Value::Map(map))
        }
    };

    Ok(Some((content_type.to_owned(), ContentEntry { content, headers, flags })))
}

fn utf8(data: Cow<'_, [u8]>, offset: usize) -> std::result::Result<String, FramingError> {
    let invalid = || FramingError::InvalidUtf8 { field: "content payload", offset };
    match data {
        Cow::Borrowed(bytes) => std::str::from_utf8(bytes).map(str::to_owned).map_err(|_| invalid()),
        Cow::Owned(bytes) => String::from_utf8(bytes).map_err(|_| invalid()),
    }
}
