//! Whole-file encode and decode.
//!
//! ```text
//! | preamble | chunk | chunk | ... | 0x00 |
//! ```
//!
//! Decoding is strictly sequential and all-or-nothing: the first framing,
//! syntax or codec failure aborts it and no partial document is returned.

use tracing::{debug, trace};

use crate::chunk::{decode_chunk, END_OF_CHUNKS};
use crate::codec::{DeflateCodec, DEFAULT_COMPRESSION_LEVEL};
use crate::document::{ContentEntry, Document};
use crate::error::Result;
use crate::io_stream::{FramingError, GffReader};
use crate::perf::encode_chunks;
use crate::preamble::Preamble;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Deflate level for entries flagged as compressed, 0..=9.
    pub compression_level: u32,
    /// Encode chunks on the Rayon pool.  Ignored without the `parallel`
    /// feature; the bytes produced are the same either way.
    pub parallel:          bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            parallel:          cfg!(feature = "parallel"),
        }
    }
}

/// Lay out `document` behind `magic`.
pub fn encode(document: &Document, magic: &[u8], options: &EncodeOptions) -> Result<Vec<u8>> {
    let codec = DeflateCodec::with_level(options.compression_level);
    let entries: Vec<(&str, &ContentEntry)> = document.entries().collect();
    let chunks = encode_chunks(&entries, &codec, options.parallel)?;

    let body_len: usize = chunks
        .iter()
        .map(|c| c.content_type.len() + c.headers_text.len() + c.payload.len() + 8)
        .sum();
    let mut out = Vec::with_capacity(magic.len() + body_len + 64);

    let preamble = Preamble {
        headers:  document.headers().clone(),
        metadata: document.metadata().clone(),
    };
    preamble.write(magic, &mut out)?;
    for chunk in &chunks {
        trace!(offset = out.len(), content_type = %chunk.content_type, "writing chunk");
        chunk.write(&mut out)?;
    }
    out.push(END_OF_CHUNKS);

    debug!(entries = entries.len(), chunks = chunks.len(), len = out.len(), "encoded document");
    Ok(out)
}

/// Parse `buf`, which must start with `magic` and end right after the
/// end-of-chunks marker.
pub fn decode(buf: &[u8], magic: &[u8], code_name: &str) -> Result<Document> {
    let codec = DeflateCodec::default();
    let mut reader = GffReader::new(buf);

    let Preamble { headers, metadata } = Preamble::read(&mut reader, magic, code_name)?;
    let mut document = Document::with_headers(headers, metadata);

    loop {
        trace!(offset = reader.position(), "reading chunk");
        match decode_chunk(&mut reader, &codec)? {
            Some((content_type, entry)) => document.push_entry(&content_type, entry),
            None => break,
        }
    }

    if !reader.is_at_end() {
        return Err(FramingError::ExpectedEndOfFile {
            offset:    reader.position(),
            remaining: reader.remaining(),
        }
        .into());
    }

    debug!(len = buf.len(), types = document.contents().len(), "decoded document");
    Ok(document)
}
