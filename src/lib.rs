pub mod meta;
pub mod codec;
pub mod io_stream;
pub mod chunk;
pub mod preamble;
pub mod perf;
pub mod frame;
pub mod schema;
pub mod format;
pub mod document;
pub mod storage;
pub mod error;

pub use meta::{Map, Value};
pub use codec::{Codec, DeflateCodec};
pub use frame::EncodeOptions;
pub use schema::{SchemaError, SchemaKind, SchemaNode};
pub use format::{FormatDefinition, FormatSpec};
pub use document::{ContentEntry, ContentFlags, ContentValue, Document};
pub use storage::{FsStorage, MemoryStorage, Storage, StorageError};
pub use error::{GffError, Result};
