//! # bitfs-cas
//!
//! Content-addressable storage for bitfs.
//!
//! Every payload is named by the SHA-256 of its bytes and written once.
//! Protocol identifiers (transaction ids) reach that content through hard
//! links, so the same bytes are stored a single time no matter how many
//! transactions carry them.
//!
//! ## Directory Layout
//!
//! ```text
//! <root>/
//! ├── chunks/<txid>            # raw BCAT chunk payloads
//! ├── c/<sha256>               # canonical content, write-once
//! ├── b/<txid>                 # alias → c/<sha256>
//! ├── bcat/<txid>              # alias → c/<sha256>
//! ├── bitcom/<owner>/<path>    # owner-scoped writable namespace
//! ├── lmdb/                    # metadata index
//! └── manifests/               # BCAT manifest index
//! ```

mod chunks;
mod layout;
mod link;

pub use chunks::ChunkBuffer;
pub use layout::FsLayout;
pub use link::{validate_id, AliasKind, LinkOutcome, Linker, NAME_MAX};

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors that can occur during CAS operations
#[derive(Error, Debug)]
pub enum CasError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Content not found: {hash}")]
    NotFound { hash: String },

    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("Invalid identifier: {0:?}")]
    InvalidId(String),
}

pub type Result<T> = std::result::Result<T, CasError>;

/// SHA-256 digest naming a canonical content file.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash the given bytes.
    #[inline]
    pub fn compute(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase, 64-char hex form used for file names and index keys.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-char hex string (either case).
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != 64 {
            return None;
        }
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out).ok()?;
        Some(Self(out))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

/// Write-once store of canonical content files under `c/`.
#[derive(Debug, Clone)]
pub struct ContentStore {
    dir: PathBuf,
}

impl ContentStore {
    /// Open the store inside an existing layout.
    pub fn new(layout: &FsLayout) -> Result<Self> {
        let dir = layout.content_dir();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path where content with the given hash lives (whether or not it exists).
    pub fn path_for(&self, hash: &ContentHash) -> PathBuf {
        self.dir.join(hash.to_hex())
    }

    /// Store bytes, returning the content hash.
    ///
    /// If the content already exists this is a no-op. Existing files are
    /// never rewritten; equal hashes are treated as equal content.
    #[instrument(skip(self, data), fields(len = data.len()), level = "debug")]
    pub fn store(&self, data: &[u8]) -> Result<ContentHash> {
        let hash = ContentHash::compute(data);
        let path = self.path_for(&hash);

        if path.exists() {
            debug!(hash = %hash, "Content already stored");
            return Ok(hash);
        }

        write_atomic(&path, data)?;
        debug!(hash = %hash, "Content stored");
        Ok(hash)
    }

    /// Read content back, verifying it still matches its name.
    pub fn read(&self, hash: &ContentHash) -> Result<Vec<u8>> {
        let path = self.path_for(hash);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CasError::NotFound {
                    hash: hash.to_hex(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let actual = ContentHash::compute(&data);
        if actual != *hash {
            return Err(CasError::HashMismatch {
                expected: hash.to_hex(),
                actual: actual.to_hex(),
            });
        }
        Ok(data)
    }

    pub fn exists(&self, hash: &ContentHash) -> bool {
        self.path_for(hash).exists()
    }

    pub fn root(&self) -> &Path {
        &self.dir
    }

    /// Count stored blobs and their total size.
    pub fn stats(&self) -> Result<CasStats> {
        let mut stats = CasStats::default();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            // Skip in-flight temp files
            if entry.path().extension().is_some_and(|ext| ext == "tmp") {
                continue;
            }
            stats.blob_count += 1;
            stats.total_bytes += entry.metadata()?.len();
        }
        Ok(stats)
    }
}

/// Statistics about the content store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CasStats {
    /// Number of unique blobs stored
    pub blob_count: u64,
    /// Total bytes stored (deduplicated)
    pub total_bytes: u64,
}

impl CasStats {
    pub fn avg_blob_size(&self) -> u64 {
        if self.blob_count == 0 {
            0
        } else {
            self.total_bytes / self.blob_count
        }
    }
}

/// Write `data` to `path` via a uniquely named temp file and rename.
///
/// The target path only ever holds a complete file; a reader never
/// observes a partial write under the final name.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        CasError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "target path has no parent directory",
        ))
    })?;
    fs::create_dir_all(parent)?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = parent.join(format!(
        ".{}.{}.{:?}.tmp",
        name,
        std::process::id(),
        std::thread::current().id()
    ));

    write_temp(&temp_path, |file| file.write_all(data))?;

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        if path.exists() {
            return Ok(());
        }
        return Err(CasError::Io(e));
    }
    Ok(())
}

/// Fill a fresh file at `temp_path` and sync it. The file is removed if
/// any step fails.
fn write_temp(
    temp_path: &Path,
    fill: impl FnOnce(&mut File) -> io::Result<()>,
) -> io::Result<()> {
    let mut file = File::create(temp_path)?;
    let result = fill(&mut file).and_then(|()| file.sync_all());
    if result.is_err() {
        let _ = fs::remove_file(temp_path);
    }
    result
}
