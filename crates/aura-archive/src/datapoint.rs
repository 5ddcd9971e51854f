//! Datapoint: one compiled unit of source content.

use serde_json::{Map, Value};

/// Metadata attached to a datapoint: string keys to JSON values.
///
/// Conventional keys written by compilation pipelines:
/// `source` (origin path), `file_extension`, `domain`, `quality_score`.
pub type Metadata = Map<String, Value>;

/// A single compiled record: opaque payload bytes plus metadata.
///
/// Owned exclusively by the archive it is compiled into and immutable
/// after write. Payload bytes are stored and returned verbatim; they
/// are never interpreted as executable or reflective structures.
#[derive(Debug, Clone, PartialEq)]
pub struct Datapoint {
    /// Unique identifier within the archive.
    pub id: String,
    /// Raw payload bytes (typically UTF-8 text).
    pub payload: Vec<u8>,
    /// Metadata mapping.
    pub metadata: Metadata,
}

impl Datapoint {
    /// Create a datapoint from a text payload with empty metadata.
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: text.into().into_bytes(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Source path recorded at compile time, if any.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }

    /// File extension recorded at compile time, if any.
    pub fn file_extension(&self) -> Option<&str> {
        self.metadata.get("file_extension").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_constructor() {
        let dp = Datapoint::text("doc_001", "hello world");
        assert_eq!(dp.id, "doc_001");
        assert_eq!(dp.payload, b"hello world");
        assert!(dp.metadata.is_empty());
    }

    #[test]
    fn test_metadata_accessors() {
        let dp = Datapoint::text("doc_001", "x")
            .with_metadata("source", "notes/a.md")
            .with_metadata("file_extension", ".md")
            .with_metadata("quality_score", 0.8);
        assert_eq!(dp.source(), Some("notes/a.md"));
        assert_eq!(dp.file_extension(), Some(".md"));
    }
}
