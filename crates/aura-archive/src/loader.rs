//! RAG-oriented retrieval over a compiled archive.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use serde_json::Value;
use tracing::debug;

use crate::datapoint::{Datapoint, Metadata};
use crate::error::{ArchiveError, Result};
use crate::reader::{ArchiveReader, Records};

/// Aggregate statistics for an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveStats {
    pub total_datapoints: usize,
    pub size_bytes: u64,
    /// Datapoints with a non-empty payload.
    pub with_text: usize,
    /// Datapoint count per file extension (`unknown` when unrecorded).
    pub extensions: BTreeMap<String, usize>,
}

/// Retrieval handle over a `.aura` knowledge base.
///
/// Provides O(1) access by id, lazy streaming iteration, and pure
/// metadata filters, without ever loading the whole archive into
/// memory. [`RagLoader::close`] is idempotent and may be called at any
/// point; dropping the loader releases the file handle regardless, so
/// abandoning an iteration mid-stream cannot leak the handle or
/// corrupt the archive.
pub struct RagLoader {
    reader: Option<ArchiveReader>,
    meta_cache: Mutex<BTreeMap<String, Metadata>>,
}

impl RagLoader {
    /// Open an archive for retrieval.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let reader = ArchiveReader::open(path)?;
        Ok(Self {
            reader: Some(reader),
            meta_cache: Mutex::new(BTreeMap::new()),
        })
    }

    fn reader(&self) -> Result<&ArchiveReader> {
        self.reader.as_ref().ok_or(ArchiveError::Closed)
    }

    /// Number of datapoints in the archive.
    pub fn len(&self) -> usize {
        self.reader.as_ref().map(ArchiveReader::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.reader
            .as_ref()
            .map(|r| r.contains(id))
            .unwrap_or(false)
    }

    /// All datapoint ids in archive order.
    pub fn all_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .reader()?
            .index()
            .records()
            .iter()
            .map(|e| e.id.clone())
            .collect())
    }

    /// Fetch a full datapoint by id.
    pub fn get_by_id(&self, id: &str) -> Result<Datapoint> {
        self.reader()?.read(id)
    }

    /// Fetch the text payload for a datapoint.
    pub fn get_text_by_id(&self, id: &str) -> Result<String> {
        let datapoint = self.get_by_id(id)?;
        String::from_utf8(datapoint.payload)
            .map_err(|_| ArchiveError::PayloadNotText { id: id.to_string() })
    }

    /// Fetch only the metadata for a datapoint, caching the result.
    pub fn get_metadata(&self, id: &str) -> Result<Metadata> {
        if let Some(meta) = self
            .meta_cache
            .lock()
            .expect("metadata cache lock poisoned")
            .get(id)
        {
            return Ok(meta.clone());
        }
        let metadata = self.get_by_id(id)?.metadata;
        self.meta_cache
            .lock()
            .expect("metadata cache lock poisoned")
            .insert(id.to_string(), metadata.clone());
        Ok(metadata)
    }

    /// Iterate `(id, text, metadata)` lazily in archive order.
    ///
    /// Each record is read on demand from its stored offset; the
    /// iterator is finite and can be recreated to restart.
    pub fn iterate_texts(&self) -> Result<Texts<'_>> {
        Ok(Texts {
            records: self.reader()?.iter(),
        })
    }

    /// Ids whose metadata satisfies `predicate`, lazily.
    pub fn filter_ids<'a, P>(
        &'a self,
        predicate: P,
    ) -> Result<impl Iterator<Item = Result<String>> + 'a>
    where
        P: Fn(&Metadata) -> bool + 'a,
    {
        let reader = self.reader()?;
        Ok(reader.index().records().iter().filter_map(move |entry| {
            match self.get_metadata(&entry.id) {
                Ok(meta) => predicate(&meta).then(|| Ok(entry.id.clone())),
                Err(e) => Some(Err(e)),
            }
        }))
    }

    /// Ids whose recorded file extension matches `extension`
    /// (case-insensitive; a leading dot is implied).
    pub fn filter_by_extension<'a>(
        &'a self,
        extension: &str,
    ) -> Result<impl Iterator<Item = Result<String>> + 'a> {
        let wanted = if extension.starts_with('.') {
            extension.to_lowercase()
        } else {
            format!(".{}", extension.to_lowercase())
        };
        self.filter_ids(move |meta| {
            meta.get("file_extension")
                .and_then(Value::as_str)
                .map(|ext| ext.to_lowercase() == wanted)
                .unwrap_or(false)
        })
    }

    /// Ids whose source path contains `pattern` (case-insensitive).
    pub fn filter_by_source<'a>(
        &'a self,
        pattern: &str,
    ) -> Result<impl Iterator<Item = Result<String>> + 'a> {
        let wanted = pattern.to_lowercase();
        self.filter_ids(move |meta| {
            meta.get("source")
                .and_then(Value::as_str)
                .map(|source| source.to_lowercase().contains(&wanted))
                .unwrap_or(false)
        })
    }

    /// Aggregate counts for the archive.
    pub fn get_stats(&self) -> Result<ArchiveStats> {
        let reader = self.reader()?;
        let mut extensions: BTreeMap<String, usize> = BTreeMap::new();
        let mut with_text = 0usize;

        for entry in reader.index().records() {
            if entry.payload_len > 0 {
                with_text += 1;
            }
            let meta = self.get_metadata(&entry.id)?;
            let ext = meta
                .get("file_extension")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            *extensions.entry(ext).or_insert(0) += 1;
        }

        Ok(ArchiveStats {
            total_datapoints: reader.len(),
            size_bytes: reader.file_len(),
            with_text,
            extensions,
        })
    }

    /// Release the underlying file handle. Idempotent; subsequent
    /// reads fail with [`ArchiveError::Closed`].
    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!(event = "archive.loader_closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }
}

/// Lazy `(id, text, metadata)` iterator in archive order.
pub struct Texts<'a> {
    records: Records<'a>,
}

impl Iterator for Texts<'_> {
    type Item = Result<(String, String, Metadata)>;

    fn next(&mut self) -> Option<Self::Item> {
        let datapoint = match self.records.next()? {
            Ok(dp) => dp,
            Err(e) => return Some(Err(e)),
        };
        let Datapoint {
            id,
            payload,
            metadata,
        } = datapoint;
        match String::from_utf8(payload) {
            Ok(text) => Some(Ok((id, text, metadata))),
            Err(_) => Some(Err(ArchiveError::PayloadNotText { id })),
        }
    }
}
