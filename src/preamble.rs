//! File preamble: magic numbers, file headers and file metadata.
//!
//! ```text
//! | "JSGFF/<code>\n" | NUL-terminated | 0x0a | NUL-terminated |
//! | magic numbers    | file headers   |      | file metadata  |
//! ```

use std::io::Write;

use tracing::debug;

use crate::error::{GffError, Result};
use crate::io_stream::{FramingError, GffReader, GffWriteExt, SEPARATOR};
use crate::meta::{self, Map};

/// `JSGFF/` + code name + `\n`.
pub fn magic_numbers(code_name: &str) -> Vec<u8> {
    let mut magic = Vec::with_capacity(code_name.len() + 7);
    magic.extend_from_slice(b"JSGFF/");
    magic.extend_from_slice(code_name.as_bytes());
    magic.push(SEPARATOR);
    magic
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preamble {
    pub headers:  Map,
    pub metadata: Map,
}

impl Preamble {
    pub fn write<W: Write>(&self, magic: &[u8], mut writer: W) -> std::result::Result<(), FramingError> {
        writer.write_all(magic).map_err(|e| FramingError::Write {
            field: "magic numbers",
            reason: e.to_string(),
        })?;
        writer.write_nul_terminated_utf8(&meta::stringify(&self.headers), "file headers")?;
        writer.write_all(&[SEPARATOR]).map_err(|e| FramingError::Write {
            field: "metadata separator",
            reason: e.to_string(),
        })?;
        writer.write_nul_terminated_utf8(&meta::stringify(&self.metadata), "file metadata")
    }

    /// Check the magic numbers byte by byte, then read both metadata blocks.
    ///
    /// A buffer shorter than the magic is reported as a format mismatch at
    /// the first missing byte, not as truncation.
    pub fn read(reader: &mut GffReader<'_>, magic: &[u8], code_name: &str) -> Result<Self> {
        let start = reader.position();
        for (i, &expected) in magic.iter().enumerate() {
            let mismatch = || GffError::FormatMismatch { code_name: code_name.to_owned(), offset: start + i };
            let found = reader.read_u8("magic numbers").map_err(|_| mismatch())?;
            if found != expected {
                return Err(mismatch());
            }
        }

        let headers_text = reader.read_nul_terminated_utf8("file headers")?;
        let headers = meta::parse(headers_text).map_err(|e| GffError::syntax("file headers", e))?;

        reader.expect_separator("file metadata")?;
        let metadata_text = reader.read_nul_terminated_utf8("file metadata")?;
        let metadata = meta::parse(metadata_text).map_err(|e| GffError::syntax("file metadata", e))?;

        debug!(code_name, headers = headers.len(), metadata = metadata.len(), "read preamble");
        Ok(Self { headers, metadata })
    }
}
