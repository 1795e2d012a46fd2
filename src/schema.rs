//! Recursive header schemas and the validator that checks documents
//! against them.
//!
//! A [`SchemaNode`] describes one header value.  Its `child` depends on the
//! kind: an `Array` node carries the schema of its elements, an `Object`
//! node carries the schemas of its declared keys.  Keys present in a value
//! but absent from the schema are never checked.
//!
//! Format definitions spell nodes as compact JSON tuples:
//!
//! ```text
//! [true, "string"]
//! [false, "array", [false, "integer"]]
//! [false, "object", { "width": [true, "number"], "height": [true, "number"] }]
//! ```

use std::fmt;

use serde::de::{self, Deserialize, Deserializer, IgnoredAny, SeqAccess, Visitor};
use thiserror::Error;
use tracing::trace;

use crate::meta::{Map, Value};

/// Largest integer an IEEE-754 double holds exactly: 2^53 - 1.
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Corrupted {format} file, missing content of type: {content_type}")]
    MissingMandatoryContent { format: String, content_type: String },
    #[error("Corrupted {format} file, missing mandatory header: {path}")]
    MissingMandatoryHeader { format: String, path: String },
    #[error("Corrupted {format} file, mandatory header is null: {path}")]
    MandatoryHeaderIsNull { format: String, path: String },
    #[error("Corrupted {format} file, expecting {expected} for header: {path} (found {found})")]
    TypeMismatch {
        format:   String,
        path:     String,
        expected: &'static str,
        found:    &'static str,
    },
}

impl SchemaError {
    /// Rendered path of the offending header, if the error is about one.
    pub fn path(&self) -> Option<&str> {
        match self {
            SchemaError::MissingMandatoryContent { .. } => None,
            SchemaError::MissingMandatoryHeader { path, .. }
            | SchemaError::MandatoryHeaderIsNull { path, .. }
            | SchemaError::TypeMismatch { path, .. } => Some(path),
        }
    }
}

// ── Schema nodes ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Boolean,
    Number,
    Integer,
    String,
    Array,
    Object,
}

impl SchemaKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "boolean"            => SchemaKind::Boolean,
            "number"             => SchemaKind::Number,
            "integer"            => SchemaKind::Integer,
            "string"             => SchemaKind::String,
            "array" | "arrayOf"  => SchemaKind::Array,
            "object"             => SchemaKind::Object,
            _ => return None,
        })
    }

    /// Noun phrase used in validation messages.
    pub fn expected(self) -> &'static str {
        match self {
            SchemaKind::Boolean => "a boolean",
            SchemaKind::Number  => "a number",
            SchemaKind::Integer => "an integer",
            SchemaKind::String  => "a string",
            SchemaKind::Array   => "an array",
            SchemaKind::Object  => "an object",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaChild {
    Element(Box<SchemaNode>),
    Keys(Map<SchemaNode>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub mandatory: bool,
    pub kind:      SchemaKind,
    pub child:     Option<SchemaChild>,
}

impl SchemaNode {
    pub fn new(mandatory: bool, kind: SchemaKind) -> Self {
        Self { mandatory, kind, child: None }
    }

    pub fn required(kind: SchemaKind) -> Self {
        Self::new(true, kind)
    }

    pub fn optional(kind: SchemaKind) -> Self {
        Self::new(false, kind)
    }

    pub fn array_of(mandatory: bool, element: SchemaNode) -> Self {
        Self {
            mandatory,
            kind:  SchemaKind::Array,
            child: Some(SchemaChild::Element(Box::new(element))),
        }
    }

    pub fn object(mandatory: bool, keys: Map<SchemaNode>) -> Self {
        Self {
            mandatory,
            kind:  SchemaKind::Object,
            child: Some(SchemaChild::Keys(keys)),
        }
    }

    pub fn element(&self) -> Option<&SchemaNode> {
        match &self.child {
            Some(SchemaChild::Element(node)) => Some(node),
            _ => None,
        }
    }

    pub fn keys(&self) -> Option<&Map<SchemaNode>> {
        match &self.child {
            Some(SchemaChild::Keys(keys)) => Some(keys),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for SchemaKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        SchemaKind::from_name(&name).ok_or_else(|| {
            de::Error::unknown_variant(&name, &["boolean", "number", "integer", "string", "array", "arrayOf", "object"])
        })
    }
}

impl<'de> Deserialize<'de> for SchemaNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NodeVisitor;

        impl<'de> Visitor<'de> for NodeVisitor {
            type Value = SchemaNode;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a schema tuple [mandatory, kind, child?]")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<SchemaNode, A::Error> {
                let mandatory: bool = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let kind: SchemaKind = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;

                // The child slot is read according to the kind.
                let child = match kind {
                    SchemaKind::Array => seq
                        .next_element::<SchemaNode>()?
                        .map(|node| SchemaChild::Element(Box::new(node))),
                    SchemaKind::Object => seq.next_element::<Map<SchemaNode>>()?.map(SchemaChild::Keys),
                    _ => {
                        seq.next_element::<IgnoredAny>()?;
                        None
                    }
                };
                if seq.next_element::<IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(4, &self));
                }
                Ok(SchemaNode { mandatory, kind, child })
            }
        }

        deserializer.deserialize_seq(NodeVisitor)
    }
}

// ── Validator ────────────────────────────────────────────────────────────────

/// Checks values against schema nodes on behalf of one format.  The first
/// violation is returned; nothing is aggregated.
pub struct Validator<'a> {
    format: &'a str,
}

impl<'a> Validator<'a> {
    pub fn new(format: &'a str) -> Self {
        Self { format }
    }

    /// Check `value` (absent when `None`) against `node`, reporting errors
    /// under `path`.
    pub fn check_value(&self, value: Option<&Value>, node: &SchemaNode, path: &str) -> Result<(), SchemaError> {
        trace!(path, kind = ?node.kind, "checking header");
        let value = match value {
            None if node.mandatory => return Err(SchemaError::MissingMandatoryHeader {
                format: self.format.to_owned(),
                path:   path.to_owned(),
            }),
            None => return Ok(()),
            Some(Value::Null) if node.mandatory => return Err(SchemaError::MandatoryHeaderIsNull {
                format: self.format.to_owned(),
                path:   path.to_owned(),
            }),
            Some(Value::Null) => return Ok(()),
            Some(value) => value,
        };

        let ok = match (node.kind, value) {
            (SchemaKind::Boolean, Value::Bool(_)) => true,
            (SchemaKind::Number, Value::Number(n)) => !n.is_nan(),
            (SchemaKind::Integer, Value::Number(n)) => n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER,
            (SchemaKind::String, Value::String(_)) => true,
            (SchemaKind::Array, Value::Array(items)) => {
                if let Some(element) = node.element() {
                    for (i, item) in items.iter().enumerate() {
                        self.check_value(Some(item), element, &format!("{path}[{i}]"))?;
                    }
                }
                true
            }
            (SchemaKind::Object, Value::Map(map)) => {
                self.check_keys(map, node, path)?;
                true
            }
            _ => false,
        };

        if ok {
            Ok(())
        } else {
            Err(self.mismatch(node.kind, value.type_name(), path))
        }
    }

    /// Check a whole mapping (file headers, chunk headers) against a node.
    /// Only an `Object` node accepts a mapping.
    pub fn check_map(&self, map: &Map, node: &SchemaNode, path: &str) -> Result<(), SchemaError> {
        match node.kind {
            SchemaKind::Object => self.check_keys(map, node, path),
            kind => Err(self.mismatch(kind, "object", path)),
        }
    }

    fn check_keys(&self, map: &Map, node: &SchemaNode, path: &str) -> Result<(), SchemaError> {
        let Some(keys) = node.keys() else {
            return Ok(());
        };
        for (key, child) in keys.iter() {
            self.check_value(map.get(key), child, &format!("{path}.{key}"))?;
        }
        Ok(())
    }

    fn mismatch(&self, kind: SchemaKind, found: &'static str, path: &str) -> SchemaError {
        SchemaError::TypeMismatch {
            format:   self.format.to_owned(),
            path:     path.to_owned(),
            expected: kind.expected(),
            found,
        }
    }
}
