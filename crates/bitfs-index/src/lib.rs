//! # bitfs-index
//!
//! Durable indexes kept alongside the content store, both on LMDB:
//!
//! - [`MetadataIndex`]: id → content-type, one named database per object
//!   kind, read by the serving side.
//! - [`LmdbManifestStore`]: BCAT manifests keyed by txid, plus a
//!   chunk id → manifest txid secondary index so a late chunk can find
//!   the manifest that claims it without scanning.

pub mod manifest;
pub mod metadata;

pub use manifest::{LmdbManifestStore, ManifestRecord, ManifestStore, ManifestStoreError};
pub use metadata::{MetaKind, MetadataIndex};

use thiserror::Error;

/// Index errors
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("LMDB error: {0}")]
    Heed(#[from] heed::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type IndexResult<T> = std::result::Result<T, IndexError>;

/// LMDB environment sizing
#[derive(Debug, Clone, Copy)]
pub struct IndexOptions {
    /// Upper bound of the memory map, in bytes
    pub map_size: usize,
    pub max_readers: u32,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            map_size: 2 * 1024 * 1024 * 1024,
            max_readers: 128,
        }
    }
}
