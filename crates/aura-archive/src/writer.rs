//! Sequential archive encoder.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::datapoint::{Datapoint, Metadata};
use crate::error::{ArchiveError, Result};
use crate::format::{ArchiveIndex, IndexEntry, AURA_MAGIC};

/// Writes datapoints to a single, indexed `.aura` archive.
///
/// Records are appended sequentially; byte offsets are tracked by
/// counting, so any `Write` sink works (files, temp files, buffers).
/// Call [`ArchiveWriter::finish`] to seal the archive with its index
/// and footer; an unfinished sink is not a valid archive.
pub struct ArchiveWriter<W: Write> {
    sink: W,
    index: ArchiveIndex,
    position: u64,
}

impl ArchiveWriter<BufWriter<File>> {
    /// Create an archive file at `path`, truncating any existing file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        debug!(event = "archive.writer_created", path = %path.as_ref().display());
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> ArchiveWriter<W> {
    /// Wrap an arbitrary sink.
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            index: ArchiveIndex::new(),
            position: 0,
        }
    }

    /// Append a single datapoint. Fails on a duplicate id.
    pub fn append(&mut self, datapoint: &Datapoint) -> Result<()> {
        self.append_parts(&datapoint.id, &datapoint.payload, &datapoint.metadata)
    }

    /// Append a record from its parts without building a [`Datapoint`].
    pub fn append_parts(&mut self, id: &str, payload: &[u8], metadata: &Metadata) -> Result<()> {
        if self.index.contains(id) {
            return Err(ArchiveError::DuplicateDatapoint { id: id.to_string() });
        }

        let meta_bytes = serde_json::to_vec(metadata)?;
        let meta_len = meta_bytes.len() as u32;
        let payload_len = payload.len() as u32;
        let offset = self.position;

        self.write_all(&meta_len.to_le_bytes())?;
        self.write_all(&payload_len.to_le_bytes())?;
        self.write_all(&meta_bytes)?;
        self.write_all(payload)?;

        self.index.push(IndexEntry {
            id: id.to_string(),
            offset,
            meta_len,
            payload_len,
        })
    }

    /// Number of records appended so far.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Seal the archive: write the index and footer, flush, and return
    /// the inner sink.
    pub fn finish(mut self) -> Result<W> {
        let index_offset = self.position;
        let index_bytes = self.index.to_bytes()?;
        self.write_all(&index_bytes)?;
        self.write_all(&index_offset.to_le_bytes())?;
        self.write_all(&AURA_MAGIC)?;
        self.sink.flush()?;
        debug!(event = "archive.sealed", datapoints = self.index.len());
        Ok(self.sink)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }
}

/// Encode a sequence of datapoints into an in-memory archive image.
pub fn encode(datapoints: &[Datapoint]) -> Result<Vec<u8>> {
    let mut writer = ArchiveWriter::new(Vec::new());
    for dp in datapoints {
        writer.append(dp)?;
    }
    writer.finish()
}
