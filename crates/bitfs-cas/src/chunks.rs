//! Buffer of raw BCAT chunk payloads, keyed by chunk txid.
//!
//! Chunks are kept forever so an assembly can be replayed or audited.

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::debug;

use crate::{validate_id, write_atomic, FsLayout, Result};

#[derive(Debug, Clone)]
pub struct ChunkBuffer {
    dir: PathBuf,
}

impl ChunkBuffer {
    pub fn new(layout: &FsLayout) -> Result<Self> {
        let dir = layout.chunks_dir();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, chunk_id: &str) -> Result<PathBuf> {
        Ok(self.dir.join(validate_id(chunk_id)?))
    }

    /// Buffer a chunk. Returns `false` if it was already present, in which
    /// case the stored bytes are left untouched.
    pub fn put(&self, chunk_id: &str, data: &[u8]) -> Result<bool> {
        let path = self.path(chunk_id)?;
        if path.exists() {
            return Ok(false);
        }
        write_atomic(&path, data)?;
        debug!(chunk = chunk_id, len = data.len(), "Chunk buffered");
        Ok(true)
    }

    pub fn contains(&self, chunk_id: &str) -> Result<bool> {
        Ok(self.path(chunk_id)?.exists())
    }

    pub fn read(&self, chunk_id: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path(chunk_id)?) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
