//! Read side: map a 64-hex identifier to a stored file.
//!
//! Content hashes and both alias kinds share one id space, so lookup tries
//! `c/`, then `b/`, then `bcat/`.

use std::fs;
use std::io;
use std::path::PathBuf;

use bitfs_cas::CasError;
use bitfs_index::{IndexError, MetaKind};
use thiserror::Error;

use crate::engine::Engine;
use crate::record::is_txid;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("content store: {0}")]
    Cas(#[from] CasError),

    #[error("index: {0}")]
    Index(#[from] IndexError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub kind: MetaKind,
    pub path: PathBuf,
    pub size: u64,
    /// `None` if the type was neither declared nor sniffed
    pub content_type: Option<String>,
}

pub struct Resolver<'a> {
    engine: &'a Engine,
}

impl<'a> Resolver<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    pub fn resolve(&self, id: &str) -> Result<Option<Resolved>, ResolveError> {
        if !is_txid(id) {
            return Err(ResolveError::InvalidId(id.to_string()));
        }
        let id = id.to_ascii_lowercase();
        let layout = self.engine.layout();

        for kind in MetaKind::LOOKUP_ORDER {
            let dir = match kind {
                MetaKind::C => layout.content_dir(),
                MetaKind::B => layout.b_dir(),
                MetaKind::Bcat => layout.bcat_dir(),
            };
            let path = dir.join(&id);
            // Follows the symlink fallback of cross-device aliases
            let meta = match fs::metadata(&path) {
                Ok(meta) => meta,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let content_type = self.engine.metadata().get(kind, &id)?;
            return Ok(Some(Resolved {
                kind,
                path,
                size: meta.len(),
                content_type,
            }));
        }
        Ok(None)
    }
}
