//! On-disk layout shared by the store, the indexes and the serving side.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Resolves every subtree of a bitfs root.
#[derive(Debug, Clone)]
pub struct FsLayout {
    root: PathBuf,
}

impl FsLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Create every subtree. Safe to call on an existing root.
    pub fn create_all(&self) -> io::Result<()> {
        for dir in [
            self.chunks_dir(),
            self.content_dir(),
            self.b_dir(),
            self.bcat_dir(),
            self.bitcom_dir(),
            self.metadata_dir(),
            self.manifests_dir(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        debug!(root = %self.root.display(), "Filesystem layout ready");
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chunks_dir(&self) -> PathBuf {
        self.root.join("chunks")
    }

    pub fn content_dir(&self) -> PathBuf {
        self.root.join("c")
    }

    pub fn b_dir(&self) -> PathBuf {
        self.root.join("b")
    }

    pub fn bcat_dir(&self) -> PathBuf {
        self.root.join("bcat")
    }

    pub fn bitcom_dir(&self) -> PathBuf {
        self.root.join("bitcom")
    }

    /// LMDB environment holding id → content-type.
    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join("lmdb")
    }

    /// LMDB environment holding BCAT manifests.
    pub fn manifests_dir(&self) -> PathBuf {
        self.root.join("manifests")
    }
}
