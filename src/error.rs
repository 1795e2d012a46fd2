//! Error types for encoding, decoding and validating documents

use thiserror::Error;

use crate::codec::CodecError;
use crate::io_stream::FramingError;
use crate::meta::SyntaxError;
use crate::schema::SchemaError;
use crate::storage::StorageError;

/// Result type for container operations
pub type Result<T> = std::result::Result<T, GffError>;

/// Everything that can go wrong between a byte buffer and a validated document
#[derive(Error, Debug)]
pub enum GffError {
    #[error("Not a JSGFF/{code_name} file: magic numbers differ at byte {offset}")]
    FormatMismatch { code_name: String, offset: usize },

    #[error(transparent)]
    Framing(#[from] FramingError),

    #[error("Corrupted file: invalid metadata text in {field}: {source}")]
    Syntax {
        field: String,
        #[source]
        source: SyntaxError,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Codec error in {field}: {source}")]
    Codec {
        field: String,
        #[source]
        source: CodecError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl GffError {
    pub(crate) fn syntax(field: impl Into<String>, source: SyntaxError) -> Self {
        GffError::Syntax { field: field.into(), source }
    }

    pub(crate) fn codec(field: impl Into<String>, source: CodecError) -> Self {
        GffError::Codec { field: field.into(), source }
    }
}
