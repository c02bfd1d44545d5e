//! LMDB-backed content-type index.
//!
//! Keys are bare ids (content hash or txid); the object kind selects the
//! named database. Writes are last-writer-wins.
//!
//! A fourth database, `bitcom`, records which Bitcom write transactions
//! have already been applied, so a replayed append is not applied twice.

use std::path::Path;

use heed::types::Str;
use heed::{Database, Env, EnvOpenOptions};
use tracing::debug;

use crate::{IndexOptions, IndexResult};

/// Object kind, one named database each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaKind {
    /// Canonical content, keyed by hex hash
    C,
    /// B files, keyed by txid
    B,
    /// Assembled BCAT files, keyed by manifest txid
    Bcat,
}

impl MetaKind {
    /// Lookup order used when only the bare id is known.
    pub const LOOKUP_ORDER: [MetaKind; 3] = [MetaKind::C, MetaKind::B, MetaKind::Bcat];

    pub fn db_name(&self) -> &'static str {
        match self {
            MetaKind::C => "c",
            MetaKind::B => "b",
            MetaKind::Bcat => "bcat",
        }
    }
}

pub struct MetadataIndex {
    env: Env,
    c_db: Database<Str, Str>,
    b_db: Database<Str, Str>,
    bcat_db: Database<Str, Str>,
    /// Applied Bitcom txid -> namespace path written
    bitcom_db: Database<Str, Str>,
}

const BITCOM_DB: &str = "bitcom";

impl MetadataIndex {
    /// Open or create the index at `path` (a directory).
    pub fn open<P: AsRef<Path>>(path: P, options: IndexOptions) -> IndexResult<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(options.map_size)
                .max_readers(options.max_readers)
                .max_dbs(4)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let c_db = env.create_database(&mut wtxn, Some(MetaKind::C.db_name()))?;
        let b_db = env.create_database(&mut wtxn, Some(MetaKind::B.db_name()))?;
        let bcat_db = env.create_database(&mut wtxn, Some(MetaKind::Bcat.db_name()))?;
        let bitcom_db = env.create_database(&mut wtxn, Some(BITCOM_DB))?;
        wtxn.commit()?;

        debug!("Opened metadata index at {:?}", path);

        Ok(Self {
            env,
            c_db,
            b_db,
            bcat_db,
            bitcom_db,
        })
    }

    fn db(&self, kind: MetaKind) -> Database<Str, Str> {
        match kind {
            MetaKind::C => self.c_db,
            MetaKind::B => self.b_db,
            MetaKind::Bcat => self.bcat_db,
        }
    }

    /// Record the content type for `id`, replacing any previous value.
    pub fn put(&self, kind: MetaKind, id: &str, content_type: &str) -> IndexResult<()> {
        let mut wtxn = self.env.write_txn()?;
        self.db(kind).put(&mut wtxn, id, content_type)?;
        wtxn.commit()?;
        debug!(kind = kind.db_name(), id, content_type, "Saved metadata");
        Ok(())
    }

    pub fn get(&self, kind: MetaKind, id: &str) -> IndexResult<Option<String>> {
        let rtxn = self.env.read_txn()?;
        Ok(self.db(kind).get(&rtxn, id)?.map(str::to_string))
    }

    /// Content type for a bare id, searching every kind in [`MetaKind::LOOKUP_ORDER`].
    pub fn lookup(&self, id: &str) -> IndexResult<Option<String>> {
        let rtxn = self.env.read_txn()?;
        for kind in MetaKind::LOOKUP_ORDER {
            if let Some(ct) = self.db(kind).get(&rtxn, id)? {
                return Ok(Some(ct.to_string()));
            }
        }
        Ok(None)
    }

    /// Mark the Bitcom write in `tx_id` as applied.
    pub fn mark_applied(&self, tx_id: &str, path: &str) -> IndexResult<()> {
        let mut wtxn = self.env.write_txn()?;
        self.bitcom_db.put(&mut wtxn, tx_id, path)?;
        wtxn.commit()?;
        Ok(())
    }

    pub fn is_applied(&self, tx_id: &str) -> IndexResult<bool> {
        let rtxn = self.env.read_txn()?;
        Ok(self.bitcom_db.get(&rtxn, tx_id)?.is_some())
    }

    pub fn len(&self, kind: MetaKind) -> IndexResult<u64> {
        let rtxn = self.env.read_txn()?;
        Ok(self.db(kind).len(&rtxn)?)
    }

    pub fn is_empty(&self) -> IndexResult<bool> {
        for kind in MetaKind::LOOKUP_ORDER {
            if self.len(kind)? > 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Sync/flush LMDB to disk
    pub fn sync(&self) -> IndexResult<()> {
        self.env.force_sync()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn small() -> IndexOptions {
        IndexOptions {
            map_size: 16 * 1024 * 1024,
            max_readers: 16,
        }
    }

    #[test]
    fn test_put_get_per_kind() {
        let temp = TempDir::new().unwrap();
        let index = MetadataIndex::open(temp.path().join("lmdb"), small()).unwrap();

        index.put(MetaKind::B, "t1", "text/plain").unwrap();

        assert_eq!(
            index.get(MetaKind::B, "t1").unwrap().as_deref(),
            Some("text/plain")
        );
        assert_eq!(index.get(MetaKind::Bcat, "t1").unwrap(), None);
        assert_eq!(index.len(MetaKind::B).unwrap(), 1);
    }

    #[test]
    fn test_last_writer_wins() {
        let temp = TempDir::new().unwrap();
        let index = MetadataIndex::open(temp.path().join("lmdb"), small()).unwrap();

        index.put(MetaKind::C, "h", "text/plain").unwrap();
        index.put(MetaKind::C, "h", "image/png").unwrap();
        assert_eq!(
            index.get(MetaKind::C, "h").unwrap().as_deref(),
            Some("image/png")
        );
        assert_eq!(index.len(MetaKind::C).unwrap(), 1);
    }

    #[test]
    fn test_lookup_prefers_content_kind() {
        let temp = TempDir::new().unwrap();
        let index = MetadataIndex::open(temp.path().join("lmdb"), small()).unwrap();
        assert!(index.is_empty().unwrap());

        index.put(MetaKind::Bcat, "x", "video/mp4").unwrap();
        assert_eq!(index.lookup("x").unwrap().as_deref(), Some("video/mp4"));

        index.put(MetaKind::C, "x", "application/octet-stream").unwrap();
        assert_eq!(
            index.lookup("x").unwrap().as_deref(),
            Some("application/octet-stream")
        );
        assert_eq!(index.lookup("missing").unwrap(), None);
    }

    #[test]
    fn test_applied_bitcom_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("lmdb");
        {
            let index = MetadataIndex::open(&path, small()).unwrap();
            assert!(!index.is_applied("w1").unwrap());
            index.mark_applied("w1", "notes/log.txt").unwrap();
            // Not a content-type entry
            assert!(index.is_empty().unwrap());
        }

        let index = MetadataIndex::open(&path, small()).unwrap();
        assert!(index.is_applied("w1").unwrap());
        assert!(!index.is_applied("w2").unwrap());
    }

    #[test]
    fn test_reopen_persists() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("lmdb");
        {
            let index = MetadataIndex::open(&path, small()).unwrap();
            index.put(MetaKind::B, "t1", "text/html").unwrap();
            index.sync().unwrap();
        }

        let index = MetadataIndex::open(&path, small()).unwrap();
        assert_eq!(
            index.get(MetaKind::B, "t1").unwrap().as_deref(),
            Some("text/html")
        );
    }
}
