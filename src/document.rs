//! In-memory document: file headers, file metadata and typed content.
//!
//! ```
//! use jsgff::{ContentFlags, Document, FormatDefinition, Map, Value};
//!
//! let format = FormatDefinition::new("image");
//! let mut doc = Document::with_headers(Map::from([("title", Value::from("Paris"))]), Map::new());
//! doc.add_content("txt", "hello", Map::new(), ContentFlags::NONE);
//! doc.add_content("data", vec![0x43, 0x10, 0x56, 0xaf], Map::new(), ContentFlags::COMPRESSED);
//!
//! let bytes = format.encode(&doc)?;
//! assert_eq!(format.decode(&bytes)?, doc);
//! # Ok::<(), jsgff::GffError>(())
//! ```

use tracing::trace;

use crate::error::Result;
use crate::format::FormatDefinition;
use crate::meta::{Map, Value};
use crate::storage::Storage;

// ── ContentFlags ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentFlags {
    /// Deflate the payload on encode.
    pub compressed: bool,
}

impl ContentFlags {
    pub const NONE:       ContentFlags = ContentFlags { compressed: false };
    pub const COMPRESSED: ContentFlags = ContentFlags { compressed: true };
}

// ── ContentValue ─────────────────────────────────────────────────────────────

/// Payload of one content entry.  The variant picks the on-wire format.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentValue {
    Bytes(Vec<u8>),
    Text(String),
    /// Written as metadata-language text.  Only mappings and arrays have a
    /// wire form; other values are skipped by the encoder.
    Structured(Value),
}

impl ContentValue {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ContentValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            ContentValue::Structured(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Vec<u8>> for ContentValue {
    fn from(bytes: Vec<u8>) -> Self {
        ContentValue::Bytes(bytes)
    }
}

impl From<&[u8]> for ContentValue {
    fn from(bytes: &[u8]) -> Self {
        ContentValue::Bytes(bytes.to_vec())
    }
}

impl From<String> for ContentValue {
    fn from(text: String) -> Self {
        ContentValue::Text(text)
    }
}

impl From<&str> for ContentValue {
    fn from(text: &str) -> Self {
        ContentValue::Text(text.to_owned())
    }
}

impl From<Value> for ContentValue {
    fn from(value: Value) -> Self {
        ContentValue::Structured(value)
    }
}

impl From<Map> for ContentValue {
    fn from(map: Map) -> Self {
        ContentValue::Structured(Value::Map(map))
    }
}

// ── ContentEntry ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ContentEntry {
    pub content: ContentValue,
    pub headers: Map,
    pub flags:   ContentFlags,
}

// ── Document ─────────────────────────────────────────────────────────────────

/// Content types keep the order they were first added in; entries within a
/// type keep their append order.  Both orders are the on-disk order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    headers:  Map,
    metadata: Map,
    contents: Map<Vec<ContentEntry>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_headers(headers: Map, metadata: Map) -> Self {
        Self { headers, metadata, contents: Map::new() }
    }

    pub fn headers(&self) -> &Map {
        &self.headers
    }

    pub fn metadata(&self) -> &Map {
        &self.metadata
    }

    pub fn contents(&self) -> &Map<Vec<ContentEntry>> {
        &self.contents
    }

    /// Entries of one content type, in append order.
    pub fn content(&self, content_type: &str) -> &[ContentEntry] {
        self.contents.get(content_type).map(Vec::as_slice).unwrap_or_default()
    }

    /// Replace the file headers.  Anything but a mapping is ignored.
    pub fn set_headers(&mut self, headers: impl Into<Value>) {
        match headers.into() {
            Value::Map(map) => self.headers = map,
            other => trace!(found = other.type_name(), "ignoring non-mapping headers"),
        }
    }

    /// Replace the file metadata.  Anything but a mapping is ignored.
    pub fn set_metadata(&mut self, metadata: impl Into<Value>) {
        match metadata.into() {
            Value::Map(map) => self.metadata = map,
            other => trace!(found = other.type_name(), "ignoring non-mapping metadata"),
        }
    }

    /// Append a content entry; never overwrites an earlier entry of the same type.
    pub fn add_content(
        &mut self,
        content_type: &str,
        content:      impl Into<ContentValue>,
        headers:      Map,
        flags:        ContentFlags,
    ) {
        self.push_entry(content_type, ContentEntry { content: content.into(), headers, flags });
    }

    pub fn push_entry(&mut self, content_type: &str, entry: ContentEntry) {
        self.contents.get_or_insert_with(content_type, Vec::new).push(entry);
    }

    /// Every entry in on-disk order, paired with its content type.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ContentEntry)> {
        self.contents
            .iter()
            .flat_map(|(content_type, list)| list.iter().map(move |entry| (content_type, entry)))
    }

    // ── Storage ──────────────────────────────────────────────────────────────

    /// Encode and hand the bytes to `storage` under `locator`.
    pub fn save(&self, format: &FormatDefinition, storage: &dyn Storage, locator: &str) -> Result<()> {
        let bytes = format.encode(self)?;
        storage.write(locator, &bytes)?;
        Ok(())
    }

    /// Encode and offer the bytes for interactive download as `filename`.
    pub fn download(&self, format: &FormatDefinition, storage: &dyn Storage, filename: &str) -> Result<()> {
        let bytes = format.encode(self)?;
        storage.offer_download(filename, &bytes)?;
        Ok(())
    }

    /// Read `locator` from `storage` and decode it.
    pub fn load(format: &FormatDefinition, storage: &dyn Storage, locator: &str) -> Result<Self> {
        let bytes = storage.read(locator)?;
        format.decode(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_content_appends() {
        let mut doc = Document::new();
        doc.add_content("txt", "one", Map::new(), ContentFlags::NONE);
        doc.add_content("bin", vec![1u8, 2], Map::new(), ContentFlags::COMPRESSED);
        doc.add_content("txt", "two", Map::new(), ContentFlags::NONE);

        let texts: Vec<_> = doc.content("txt").iter().filter_map(|e| e.content.as_text()).collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert_eq!(doc.contents().keys().collect::<Vec<_>>(), vec!["txt", "bin"]);
        assert!(doc.content("missing").is_empty());
    }

    #[test]
    fn entries_follow_type_then_append_order() {
        let mut doc = Document::new();
        doc.add_content("a", "a0", Map::new(), ContentFlags::NONE);
        doc.add_content("b", "b0", Map::new(), ContentFlags::NONE);
        doc.add_content("a", "a1", Map::new(), ContentFlags::NONE);

        let order: Vec<_> = doc
            .entries()
            .map(|(ty, e)| (ty, e.content.as_text().unwrap()))
            .collect();
        assert_eq!(order, vec![("a", "a0"), ("a", "a1"), ("b", "b0")]);
    }

    #[test]
    fn set_headers_rejects_non_mappings() {
        let mut doc = Document::with_headers(Map::from([("title", Value::from("kept"))]), Map::new());
        doc.set_headers(Value::Array(vec![1.into()]));
        doc.set_headers(5);
        doc.set_headers(Value::Null);
        assert_eq!(doc.headers().get("title"), Some(&Value::from("kept")));

        doc.set_headers(Map::from([("title", Value::from("new"))]));
        assert_eq!(doc.headers().get("title"), Some(&Value::from("new")));
    }

    #[test]
    fn set_metadata_rejects_non_mappings() {
        let mut doc = Document::new();
        doc.set_metadata("not a map");
        assert!(doc.metadata().is_empty());
        doc.set_metadata(Map::from([("author", Value::from("me"))]));
        assert_eq!(doc.metadata().len(), 1);
    }
}
