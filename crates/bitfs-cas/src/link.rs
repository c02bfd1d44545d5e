//! Alias linking: durable second names for canonical content.
//!
//! Aliases are hard links into `c/`, so an alias costs no extra disk and
//! can never diverge from the content it names. When the alias tree lives
//! on another device the link degrades to a symlink. Bytes are never
//! copied.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use tracing::{debug, warn};

use crate::{CasError, ContentHash, ContentStore, FsLayout, Result};

/// Namespace an alias id lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AliasKind {
    /// Single-transaction B files, keyed by txid.
    B,
    /// Assembled BCAT files, keyed by the manifest txid.
    Bcat,
}

impl AliasKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AliasKind::B => "b",
            AliasKind::Bcat => "bcat",
        }
    }
}

/// Result of a [`Linker::link`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    AlreadyLinked,
}

/// Longest single path component most filesystems accept, in bytes.
pub const NAME_MAX: usize = 255;

/// Check that `id` is usable as a single path component.
pub fn validate_id(id: &str) -> Result<&str> {
    let bad = id.is_empty()
        || id.len() > NAME_MAX
        || id == "."
        || id == ".."
        || id.contains(['/', '\\', '\0']);
    if bad {
        return Err(CasError::InvalidId(id.to_string()));
    }
    Ok(id)
}

/// Creates and inspects aliases for content held by a [`ContentStore`].
#[derive(Debug, Clone)]
pub struct Linker {
    layout: FsLayout,
    store: ContentStore,
}

impl Linker {
    pub fn new(layout: FsLayout, store: ContentStore) -> Self {
        Self { layout, store }
    }

    fn kind_dir(&self, kind: AliasKind) -> PathBuf {
        match kind {
            AliasKind::B => self.layout.b_dir(),
            AliasKind::Bcat => self.layout.bcat_dir(),
        }
    }

    /// Path an alias occupies once linked.
    pub fn alias_path(&self, kind: AliasKind, id: &str) -> Result<PathBuf> {
        Ok(self.kind_dir(kind).join(validate_id(id)?))
    }

    /// Whether an alias already exists (dangling symlinks count).
    pub fn is_linked(&self, kind: AliasKind, id: &str) -> Result<bool> {
        let path = self.alias_path(kind, id)?;
        Ok(path.symlink_metadata().is_ok())
    }

    /// Point `id` at the content named by `hash`.
    ///
    /// Re-linking an existing alias is a no-op. The content must already be
    /// stored; a missing canonical file is a consistency failure.
    pub fn link(&self, kind: AliasKind, id: &str, hash: &ContentHash) -> Result<LinkOutcome> {
        let target = self.alias_path(kind, id)?;
        let source = self.store.path_for(hash);

        if target.symlink_metadata().is_ok() {
            return Ok(LinkOutcome::AlreadyLinked);
        }
        if !source.exists() {
            return Err(CasError::NotFound {
                hash: hash.to_hex(),
            });
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        match fs::hard_link(&source, &target) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Ok(LinkOutcome::AlreadyLinked)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CasError::NotFound {
                    hash: hash.to_hex(),
                })
            }
            Err(e) if e.raw_os_error() == Some(Errno::EXDEV as i32) => {
                warn!(
                    kind = kind.as_str(),
                    id, "Alias tree on another device, falling back to symlink"
                );
                symlink_alias(&source, &target)?;
            }
            Err(e) => return Err(e.into()),
        }

        debug!(kind = kind.as_str(), id, hash = %hash, "Alias linked");
        Ok(LinkOutcome::Created)
    }
}

fn symlink_alias(source: &Path, target: &Path) -> Result<()> {
    match std::os::unix::fs::symlink(source, target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e.into()),
    }
}
