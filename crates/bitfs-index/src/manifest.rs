//! BCAT manifest index.
//!
//! A manifest lists the chunk txids whose payloads, concatenated in order,
//! make up one file. Manifests are created once and never changed; a
//! second manifest with the same txid is rejected as a duplicate.
//!
//! Databases:
//! - `bcat`: manifest txid → [`ManifestRecord`]
//! - `bcat_chunks`: chunk txid → manifest txids that list it

use std::path::Path;

use heed::types::{SerdeBincode, Str};
use heed::{Database, Env, EnvOpenOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{IndexError, IndexOptions, IndexResult};

/// A persisted BCAT manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
    /// Txid of the manifest transaction; also the id of the assembled file
    pub tx_id: String,
    /// Chunk txids in assembly order
    pub chunks: Vec<String>,
    pub info: Option<String>,
    pub content_type: Option<String>,
    pub encoding: Option<String>,
    pub filename: Option<String>,
}

#[derive(Error, Debug)]
pub enum ManifestStoreError {
    /// A manifest with this txid already exists
    #[error("duplicate manifest: {0}")]
    Duplicate(String),

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl From<heed::Error> for ManifestStoreError {
    fn from(e: heed::Error) -> Self {
        ManifestStoreError::Index(IndexError::Heed(e))
    }
}

/// Record store for manifests with lookup by chunk id.
pub trait ManifestStore: Send + Sync {
    /// Persist a new manifest. Fails with [`ManifestStoreError::Duplicate`]
    /// if the txid is already known; the stored record is left untouched.
    fn create(&self, record: &ManifestRecord) -> Result<(), ManifestStoreError>;

    fn get(&self, tx_id: &str) -> IndexResult<Option<ManifestRecord>>;

    /// Every manifest whose chunk list contains `chunk_id`, oldest first.
    fn find_by_chunk(&self, chunk_id: &str) -> IndexResult<Vec<ManifestRecord>>;
}

pub struct LmdbManifestStore {
    env: Env,
    manifests_db: Database<Str, SerdeBincode<ManifestRecord>>,
    chunks_db: Database<Str, SerdeBincode<Vec<String>>>,
}

impl LmdbManifestStore {
    /// Open or create the manifest index at `path` (a directory).
    pub fn open<P: AsRef<Path>>(path: P, options: IndexOptions) -> IndexResult<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(options.map_size)
                .max_readers(options.max_readers)
                .max_dbs(2)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let manifests_db = env.create_database(&mut wtxn, Some("bcat"))?;
        let chunks_db = env.create_database(&mut wtxn, Some("bcat_chunks"))?;
        wtxn.commit()?;

        debug!("Opened manifest index at {:?}", path);

        Ok(Self {
            env,
            manifests_db,
            chunks_db,
        })
    }

    /// Number of stored manifests
    pub fn len(&self) -> IndexResult<u64> {
        let rtxn = self.env.read_txn()?;
        Ok(self.manifests_db.len(&rtxn)?)
    }

    pub fn is_empty(&self) -> IndexResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl ManifestStore for LmdbManifestStore {
    fn create(&self, record: &ManifestRecord) -> Result<(), ManifestStoreError> {
        // The existence check and both inserts share one write txn; LMDB
        // allows a single writer, so concurrent creates serialize here.
        let mut wtxn = self.env.write_txn()?;

        if self.manifests_db.get(&wtxn, &record.tx_id)?.is_some() {
            return Err(ManifestStoreError::Duplicate(record.tx_id.clone()));
        }
        self.manifests_db.put(&mut wtxn, &record.tx_id, record)?;

        for chunk_id in &record.chunks {
            let mut owners = self.chunks_db.get(&wtxn, chunk_id)?.unwrap_or_default();
            if owners.contains(&record.tx_id) {
                continue;
            }
            owners.push(record.tx_id.clone());
            self.chunks_db.put(&mut wtxn, chunk_id, &owners)?;
        }

        wtxn.commit()?;
        debug!(
            txid = %record.tx_id,
            chunks = record.chunks.len(),
            "Manifest created"
        );
        Ok(())
    }

    fn get(&self, tx_id: &str) -> IndexResult<Option<ManifestRecord>> {
        let rtxn = self.env.read_txn()?;
        Ok(self.manifests_db.get(&rtxn, tx_id)?)
    }

    fn find_by_chunk(&self, chunk_id: &str) -> IndexResult<Vec<ManifestRecord>> {
        let rtxn = self.env.read_txn()?;
        let owners = match self.chunks_db.get(&rtxn, chunk_id)? {
            Some(owners) => owners,
            None => return Ok(Vec::new()),
        };

        let mut found = Vec::with_capacity(owners.len());
        for tx_id in owners {
            if let Some(record) = self.manifests_db.get(&rtxn, &tx_id)? {
                found.push(record);
            }
        }
        Ok(found)
    }
}
