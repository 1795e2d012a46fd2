//! Format definitions: one concrete file variant built on the container.
//!
//! A definition fixes the code name (and with it the magic numbers), the
//! content types every file must carry, and optional schemas for the file
//! headers and for each content type's chunk headers.  It is immutable once
//! built and can be shared across threads.
//!
//! Definitions are built in code with [`FormatDefinition::builder`] or loaded
//! from JSON through [`FormatSpec`]:
//!
//! ```json
//! {
//!   "formatCodeName": "image",
//!   "mandatoryContents": ["image"],
//!   "headersDef": { "title": [true, "string"] },
//!   "contentHeadersDef": { "image": { "width": [true, "integer"] } }
//! }
//! ```

use serde::Deserialize;
use tracing::debug;

use crate::document::Document;
use crate::error::Result;
use crate::frame::{self, EncodeOptions};
use crate::meta::Map;
use crate::preamble::magic_numbers;
use crate::schema::{SchemaError, SchemaNode, Validator};

/// Code name used when none is given.
pub const DEFAULT_CODE_NAME: &str = "generic";

#[derive(Debug, Clone, PartialEq)]
pub struct FormatDefinition {
    code_name:              String,
    magic_numbers:          Vec<u8>,
    mandatory_content:      Vec<String>,
    headers_schema:         Option<SchemaNode>,
    content_headers_schema: Map<SchemaNode>,
}

impl FormatDefinition {
    /// A definition with no requirements.
    pub fn new(code_name: impl Into<String>) -> Self {
        Self::builder(code_name).build()
    }

    pub fn builder(code_name: impl Into<String>) -> FormatDefinitionBuilder {
        FormatDefinitionBuilder {
            code_name:              code_name.into(),
            mandatory_content:      Vec::new(),
            headers_schema:         None,
            content_headers_schema: Map::new(),
        }
    }

    pub fn code_name(&self) -> &str {
        &self.code_name
    }

    /// `JSGFF/<code name>\n`.
    pub fn magic_numbers(&self) -> &[u8] {
        &self.magic_numbers
    }

    pub fn mandatory_content(&self) -> &[String] {
        &self.mandatory_content
    }

    pub fn headers_schema(&self) -> Option<&SchemaNode> {
        self.headers_schema.as_ref()
    }

    pub fn content_headers_schema(&self) -> &Map<SchemaNode> {
        &self.content_headers_schema
    }

    /// An empty document, or one seeded with headers and metadata.
    pub fn create_document(&self, headers: Map, metadata: Map) -> Document {
        Document::with_headers(headers, metadata)
    }

    pub fn encode(&self, document: &Document) -> Result<Vec<u8>> {
        self.encode_with(document, &EncodeOptions::default())
    }

    pub fn encode_with(&self, document: &Document, options: &EncodeOptions) -> Result<Vec<u8>> {
        frame::encode(document, &self.magic_numbers, options)
    }

    /// Decode `buf`.  Schemas are not applied; call
    /// [`check_requirements`](Self::check_requirements) for that.
    pub fn decode(&self, buf: &[u8]) -> Result<Document> {
        frame::decode(buf, &self.magic_numbers, &self.code_name)
    }

    /// Decode, then check the result against this definition.
    pub fn decode_checked(&self, buf: &[u8]) -> Result<Document> {
        let document = self.decode(buf)?;
        self.check_requirements(&document)?;
        Ok(document)
    }

    /// Mandatory content first, then file headers under `[file]`, then chunk
    /// headers under `<type>[index]`.  The first violation is returned.
    pub fn check_requirements(&self, document: &Document) -> std::result::Result<(), SchemaError> {
        for content_type in &self.mandatory_content {
            if document.content(content_type).is_empty() {
                return Err(SchemaError::MissingMandatoryContent {
                    format:       self.code_name.clone(),
                    content_type: content_type.clone(),
                });
            }
        }

        let validator = Validator::new(&self.code_name);
        if let Some(schema) = &self.headers_schema {
            validator.check_map(document.headers(), schema, "[file]")?;
        }

        for (content_type, schema) in self.content_headers_schema.iter() {
            for (i, entry) in document.content(content_type).iter().enumerate() {
                validator.check_map(&entry.headers, schema, &format!("<{content_type}>[{i}]"))?;
            }
        }

        debug!(format = %self.code_name, "document meets requirements");
        Ok(())
    }
}

impl Default for FormatDefinition {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_NAME)
    }
}

// ── Builder ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FormatDefinitionBuilder {
    code_name:              String,
    mandatory_content:      Vec<String>,
    headers_schema:         Option<SchemaNode>,
    content_headers_schema: Map<SchemaNode>,
}

impl FormatDefinitionBuilder {
    /// Require at least one entry of `content_type`.  Repeats are ignored.
    pub fn mandatory_content(mut self, content_type: impl Into<String>) -> Self {
        let content_type = content_type.into();
        if !self.mandatory_content.contains(&content_type) {
            self.mandatory_content.push(content_type);
        }
        self
    }

    pub fn headers_schema(mut self, schema: SchemaNode) -> Self {
        self.headers_schema = Some(schema);
        self
    }

    /// Schema for the chunk headers of every entry of `content_type`.
    pub fn content_headers_schema(mut self, content_type: impl Into<String>, schema: SchemaNode) -> Self {
        self.content_headers_schema.insert(content_type, schema);
        self
    }

    pub fn build(self) -> FormatDefinition {
        FormatDefinition {
            magic_numbers:          magic_numbers(&self.code_name),
            code_name:              self.code_name,
            mandatory_content:      self.mandatory_content,
            headers_schema:         self.headers_schema,
            content_headers_schema: self.content_headers_schema,
        }
    }
}

// ── JSON definitions ─────────────────────────────────────────────────────────

/// Serialized form of a [`FormatDefinition`].
///
/// `headersDef` and each `contentHeadersDef` entry are key maps: they
/// describe the keys of a mapping, not a full schema node.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FormatSpec {
    #[serde(default, alias = "formatCodeName")]
    pub code_name: Option<String>,
    #[serde(default, alias = "mandatoryContents")]
    pub mandatory_content: Vec<String>,
    #[serde(default, alias = "headersDef")]
    pub headers: Option<Map<SchemaNode>>,
    #[serde(default, alias = "contentHeadersDef")]
    pub content_headers: Map<Map<SchemaNode>>,
    /// Ask front ends for verbose diagnostics.  Not part of the definition.
    #[serde(default)]
    pub debug: bool,
}

impl FormatSpec {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

impl From<FormatSpec> for FormatDefinition {
    fn from(spec: FormatSpec) -> Self {
        let code_name = spec.code_name.unwrap_or_else(|| DEFAULT_CODE_NAME.to_owned());
        let mut builder = FormatDefinition::builder(code_name);
        for content_type in spec.mandatory_content {
            builder = builder.mandatory_content(content_type);
        }
        if let Some(keys) = spec.headers {
            builder = builder.headers_schema(SchemaNode::object(false, keys));
        }
        for (content_type, keys) in spec.content_headers {
            builder = builder.content_headers_schema(content_type, SchemaNode::object(false, keys));
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ContentFlags;
    use crate::meta::Value;
    use crate::schema::SchemaKind;

    fn image_format() -> FormatDefinition {
        FormatDefinition::builder("image")
            .mandatory_content("image")
            .mandatory_content("image")
            .headers_schema(SchemaNode::object(
                false,
                Map::from([("title", SchemaNode::required(SchemaKind::String))]),
            ))
            .content_headers_schema(
                "image",
                SchemaNode::object(false, Map::from([("width", SchemaNode::required(SchemaKind::Integer))])),
            )
            .build()
    }

    fn titled() -> Document {
        Document::with_headers(Map::from([("title", Value::from("t"))]), Map::new())
    }

    #[test]
    fn magic_is_derived() {
        let format = image_format();
        assert_eq!(format.magic_numbers(), b"JSGFF/image\n");
        assert_eq!(format.mandatory_content(), ["image".to_owned()]);
        assert_eq!(FormatDefinition::default().code_name(), "generic");
    }

    #[test]
    fn mandatory_content() {
        let format = image_format();
        let mut doc = titled();
        assert!(matches!(
            format.check_requirements(&doc),
            Err(SchemaError::MissingMandatoryContent { ref content_type, .. }) if content_type == "image"
        ));

        doc.add_content("image", vec![0u8], Map::from([("width", Value::from(3))]), ContentFlags::NONE);
        format.check_requirements(&doc).unwrap();
    }

    #[test]
    fn chunk_header_paths() {
        let format = image_format();
        let mut doc = titled();
        doc.add_content("image", vec![0u8], Map::from([("width", Value::from(3))]), ContentFlags::NONE);
        doc.add_content("image", vec![0u8], Map::from([("width", Value::from(3.5))]), ContentFlags::NONE);
        let err = format.check_requirements(&doc).unwrap_err();
        assert_eq!(err.path(), Some("<image>[1].width"));
    }

    #[test]
    fn file_headers_checked_before_chunks() {
        let format = image_format();
        let mut doc = Document::new();
        doc.add_content("image", vec![0u8], Map::new(), ContentFlags::NONE);
        let err = format.check_requirements(&doc).unwrap_err();
        assert_eq!(err.path(), Some("[file].title"));
    }

    #[test]
    fn decode_checked_applies_schema() {
        let format = image_format();
        let bytes = format.encode(&titled()).unwrap();
        assert!(format.decode(&bytes).is_ok());
        assert!(matches!(
            format.decode_checked(&bytes),
            Err(crate::error::GffError::Schema(SchemaError::MissingMandatoryContent { .. }))
        ));
    }

    #[test]
    fn spec_from_json() {
        let spec = FormatSpec::from_json(
            r#"{
                "formatCodeName": "test",
                "mandatoryContents": ["image"],
                "headersDef": {
                    "title": [true, "string"],
                    "indexes": [false, "arrayOf", [false, "integer"]]
                },
                "contentHeadersDef": {
                    "image": { "width": [true, "integer"], "height": [true, "integer"] }
                }
            }"#,
        )
        .unwrap();
        let format = FormatDefinition::from(spec);
        assert_eq!(format.code_name(), "test");
        assert_eq!(format.mandatory_content(), ["image".to_owned()]);
        let keys = format.headers_schema().and_then(SchemaNode::keys).unwrap();
        assert_eq!(keys.keys().collect::<Vec<_>>(), vec!["title", "indexes"]);
        assert!(format.content_headers_schema().contains_key("image"));
    }

    #[test]
    fn spec_defaults() {
        let format = FormatDefinition::from(FormatSpec::from_json("{}").unwrap());
        assert_eq!(format, FormatDefinition::default());
        assert!(FormatSpec::from_json(r#"{"debug": true}"#).unwrap().debug);
        assert!(FormatSpec::from_json(r#"{"formatName": "x"}"#).is_err());
    }

    #[test]
    fn definitions_are_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FormatDefinition>();
    }
}
