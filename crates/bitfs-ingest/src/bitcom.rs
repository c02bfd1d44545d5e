//! Bitcom `echo` / `cat` writes into an owner's namespace.
//!
//! Every write lands under `bitcom/<owner>/`. Paths that could leave that
//! subtree, or that the filesystem could not name, are refused before
//! anything touches the filesystem.
//!
//! Appends are not naturally idempotent, so each applied write is recorded
//! by txid in the metadata index and a replay of it is a no-op. The marker
//! is set after the write is synced.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use bitfs_cas::{validate_id, AliasKind, NAME_MAX};
use bitfs_config::{log_ingest_debug, log_ingest_info};

use crate::engine::{Engine, Result};
use crate::outcome::{Outcome, RejectReason, SkipReason};
use crate::record::{BitcomSource, BitcomWrite, ObjectRef, WriteMode};

/// Longest path, in bytes, the target may have including the store root.
const PATH_MAX: usize = 4096;

pub fn save_bitcom(engine: &Engine, write: &BitcomWrite) -> Result<Outcome> {
    if engine.metadata().is_applied(&write.tx_id)? {
        return Ok(Outcome::AlreadyStored {
            id: write.tx_id.clone(),
        });
    }
    if validate_id(&write.owner).is_err() {
        return Ok(reject(write, RejectReason::InvalidOwner));
    }
    let base = engine.layout().bitcom_dir().join(&write.owner);
    let relative = match namespace_path(&write.path) {
        Ok(relative) if base.join(&relative).as_os_str().len() < PATH_MAX => relative,
        Ok(_) => return Ok(reject(write, RejectReason::InvalidPath)),
        Err(reason) => return Ok(reject(write, reason)),
    };
    if has_conflict(&base, &relative) {
        return Ok(reject(write, RejectReason::PathConflict));
    }
    let target = base.join(&relative);

    match &write.source {
        BitcomSource::Literal(data) => {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = open_target(&target, write.mode)?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        BitcomSource::Reference(reference) => {
            let source = source_path(engine, reference)?;
            let mut reader = match File::open(&source) {
                Ok(f) => f,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Ok(Outcome::Skipped(SkipReason::MissingSource));
                }
                Err(e) => return Err(e.into()),
            };
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = open_target(&target, write.mode)?;
            io::copy(&mut reader, &mut file)?;
            file.sync_all()?;
        }
    }

    engine
        .metadata()
        .mark_applied(&write.tx_id, &relative.to_string_lossy())?;

    log_ingest_info!(
        "Bitcom write",
        txid = write.tx_id.as_str(),
        owner = write.owner.as_str(),
        path = write.path.as_str(),
    );
    Ok(Outcome::Written { path: target })
}

fn reject(write: &BitcomWrite, reason: RejectReason) -> Outcome {
    let why = format!("{reason:?}");
    log_ingest_debug!(
        "Bitcom write rejected",
        txid = write.tx_id.as_str(),
        reason = why.as_str(),
    );
    Outcome::Rejected(reason)
}

/// Relative path inside the namespace.
///
/// Empty, absolute and `..` paths are [`RejectReason::PathTraversal`]; a NUL
/// byte or a component longer than [`NAME_MAX`] is
/// [`RejectReason::InvalidPath`].
pub fn namespace_path(path: &str) -> std::result::Result<PathBuf, RejectReason> {
    if path.contains('\0') {
        return Err(RejectReason::InvalidPath);
    }
    let mut out = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) if part.len() > NAME_MAX => {
                return Err(RejectReason::InvalidPath)
            }
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(RejectReason::PathTraversal)
            }
        }
    }
    if out.as_os_str().is_empty() {
        return Err(RejectReason::PathTraversal);
    }
    Ok(out)
}

/// True if the target is an existing directory or any ancestor inside the
/// namespace is an existing non-directory.
fn has_conflict(base: &Path, relative: &Path) -> bool {
    let mut current = base.to_path_buf();
    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        current.push(component);
        let Ok(meta) = fs::symlink_metadata(&current) else {
            return false;
        };
        let is_last = components.peek().is_none();
        if is_last {
            return meta.is_dir();
        }
        if !meta.is_dir() {
            return true;
        }
    }
    false
}

fn open_target(target: &Path, mode: WriteMode) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true);
    match mode {
        WriteMode::Truncate => options.write(true).truncate(true),
        WriteMode::Append => options.append(true),
    };
    options.open(target)
}

fn source_path(engine: &Engine, reference: &ObjectRef) -> Result<PathBuf> {
    Ok(match reference {
        ObjectRef::Content(hash) => engine.store().path_for(hash),
        ObjectRef::BFile(tx_id) => engine.linker().alias_path(AliasKind::B, tx_id)?,
    })
}
