//! Aura-Archive: Indexed Binary Knowledge Archives
//!
//! This crate implements the `.aura` archive format: a sequential
//! binary file of length-prefixed datapoints (metadata + opaque
//! payload) followed by an index and a fixed footer, giving O(1)
//! random access without scanning prior records.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: byte-exact encoding, validated decoding, and streaming
//! retrieval for RAG consumers.
//!
//! ## Key Components
//!
//! - `ArchiveWriter`: sequential encoder, sealed with index + footer
//! - `ArchiveReader`: validated decoder with random access
//! - `RagLoader`: retrieval handle (text lookup, filters, stats)

mod datapoint;
mod error;
pub mod format;
mod loader;
mod reader;
mod writer;

pub use datapoint::{Datapoint, Metadata};
pub use error::{ArchiveError, Result};
pub use format::{ArchiveIndex, IndexEntry, AURA_MAGIC, FOOTER_LEN};
pub use loader::{ArchiveStats, RagLoader, Texts};
pub use reader::{decode, ArchiveReader, Records};
pub use writer::{encode, ArchiveWriter};
