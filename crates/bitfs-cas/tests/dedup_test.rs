//! Store + link behaviour across aliases and restarts.

use std::fs;
use std::os::unix::fs::MetadataExt;

use bitfs_cas::{AliasKind, ContentHash, ContentStore, FsLayout, LinkOutcome, Linker};
use tempfile::TempDir;

#[test]
fn test_identical_payloads_share_one_content_entry() {
    let temp = TempDir::new().unwrap();
    let layout = FsLayout::new(temp.path());
    layout.create_all().unwrap();
    let store = ContentStore::new(&layout).unwrap();
    let linker = Linker::new(layout.clone(), store.clone());

    let h1 = store.store(b"same payload").unwrap();
    linker.link(AliasKind::B, "tx-one", &h1).unwrap();
    let h2 = store.store(b"same payload").unwrap();
    linker.link(AliasKind::B, "tx-two", &h2).unwrap();

    assert_eq!(h1, h2);
    assert_eq!(store.stats().unwrap().blob_count, 1);

    // One inode, three names: c/<hash>, b/tx-one, b/tx-two
    let meta = fs::metadata(store.path_for(&h1)).unwrap();
    assert_eq!(meta.nlink(), 3);
}

#[test]
fn test_reopen_keeps_existing_aliases() {
    let temp = TempDir::new().unwrap();
    let hash = {
        let layout = FsLayout::new(temp.path());
        layout.create_all().unwrap();
        let store = ContentStore::new(&layout).unwrap();
        let linker = Linker::new(layout, store.clone());
        let hash = store.store(b"persisted").unwrap();
        linker.link(AliasKind::Bcat, "m1", &hash).unwrap();
        hash
    };

    let layout = FsLayout::new(temp.path());
    layout.create_all().unwrap();
    let store = ContentStore::new(&layout).unwrap();
    let linker = Linker::new(layout, store.clone());

    assert!(store.exists(&hash));
    assert!(linker.is_linked(AliasKind::Bcat, "m1").unwrap());
    assert_eq!(
        linker.link(AliasKind::Bcat, "m1", &hash).unwrap(),
        LinkOutcome::AlreadyLinked
    );
    assert_eq!(hash, ContentHash::compute(b"persisted"));
}
