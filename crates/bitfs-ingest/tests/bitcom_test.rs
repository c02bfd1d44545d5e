//! Bitcom echo/cat writes and namespace confinement.

mod common;

use std::fs;

use bitfs_cas::ContentHash;
use bitfs_config::testing::TestEnvironment;
use bitfs_ingest::record::B_PREFIX;
use bitfs_ingest::{DecodeError, Outcome, RejectReason, SkipReason};
use common::*;

#[test]
fn test_echo_truncate_and_append() {
    let env = TestEnvironment::new().unwrap();
    let mut pipeline = open_pipeline(&env);
    let target = env.root.join("bitcom").join(OWNER).join("log/today.txt");

    let outcome = pipeline
        .process(&bitcom_tx(&id(1), "echo", "first", ">", "log/today.txt"))
        .unwrap();
    assert_eq!(outcome, Outcome::Written { path: target.clone() });

    pipeline
        .process(&bitcom_tx(&id(2), "echo", "+second", ">>", "log/today.txt"))
        .unwrap();
    assert_eq!(fs::read_to_string(&target).unwrap(), "first+second");

    pipeline
        .process(&bitcom_tx(&id(3), "echo", "reset", "to", "log/today.txt"))
        .unwrap();
    assert_eq!(fs::read_to_string(&target).unwrap(), "reset");
}

#[test]
fn test_traversal_is_rejected() {
    let env = TestEnvironment::new().unwrap();
    let mut pipeline = open_pipeline(&env);

    for path in ["../../escape.txt", "/etc/bitfs-escape", "a/../../b"] {
        let outcome = pipeline
            .process(&bitcom_tx(&id(1), "echo", "x", ">", path))
            .unwrap();
        assert_eq!(outcome, Outcome::Rejected(RejectReason::PathTraversal));
    }

    assert!(!env.root.join("escape.txt").exists());
    assert!(!env.root.join("bitcom").join(OWNER).exists());
}

#[test]
fn test_file_in_the_way_is_a_conflict() {
    let env = TestEnvironment::new().unwrap();
    let mut pipeline = open_pipeline(&env);

    pipeline
        .process(&bitcom_tx(&id(1), "echo", "leaf", ">", "a"))
        .unwrap();
    let outcome = pipeline
        .process(&bitcom_tx(&id(2), "echo", "nested", ">", "a/b"))
        .unwrap();
    assert_eq!(outcome, Outcome::Rejected(RejectReason::PathConflict));

    let outcome = pipeline
        .process(&bitcom_tx(&id(3), "echo", "x", ">", "dir/file"))
        .unwrap();
    assert!(matches!(outcome, Outcome::Written { .. }));
    let outcome = pipeline
        .process(&bitcom_tx(&id(4), "echo", "x", ">", "dir"))
        .unwrap();
    assert_eq!(outcome, Outcome::Rejected(RejectReason::PathConflict));
}

#[test]
fn test_cat_copies_stored_content() {
    let env = TestEnvironment::new().unwrap();
    let mut pipeline = open_pipeline(&env);
    let b_id = id(1);
    pipeline.process(&b_tx(&b_id, b"payload", "text/plain")).unwrap();
    let hash = ContentHash::compute(b"payload");
    let owner_dir = env.root.join("bitcom").join(OWNER);

    let refs = [
        (format!("c://{}", hash.to_hex()), "from-c"),
        (format!("b://{b_id}"), "from-b"),
        (format!("bit://{B_PREFIX}/{b_id}"), "from-bit"),
    ];
    for (n, (reference, path)) in refs.iter().enumerate() {
        let outcome = pipeline
            .process(&bitcom_tx(&id(10 + n as u32), "cat", reference, ">", path))
            .unwrap();
        assert!(matches!(outcome, Outcome::Written { .. }), "{reference}: {outcome:?}");
        assert_eq!(fs::read(owner_dir.join(path)).unwrap(), b"payload");
    }
}

#[test]
fn test_cat_missing_or_unknown_source() {
    let env = TestEnvironment::new().unwrap();
    let mut pipeline = open_pipeline(&env);

    let outcome = pipeline
        .process(&bitcom_tx(&id(1), "cat", &format!("b://{}", id(42)), ">", "copy"))
        .unwrap();
    assert_eq!(outcome, Outcome::Skipped(SkipReason::MissingSource));

    let outcome = pipeline
        .process(&bitcom_tx(&id(2), "cat", "https://example.com/x", ">", "copy"))
        .unwrap();
    assert!(matches!(
        outcome,
        Outcome::Skipped(SkipReason::Malformed(DecodeError::UnresolvableReference(_)))
    ));

    let outcome = pipeline
        .process(&bitcom_tx(&id(3), "rm", "", ">", "copy"))
        .unwrap();
    assert!(matches!(
        outcome,
        Outcome::Skipped(SkipReason::Malformed(DecodeError::UnsupportedCommand(_)))
    ));

    assert!(!env.root.join("bitcom").join(OWNER).join("copy").exists());
}

#[test]
fn test_append_seen_twice_is_applied_once() {
    let env = TestEnvironment::new().unwrap();
    let target = env.root.join("bitcom").join(OWNER).join("log.txt");
    let append = bitcom_tx(&id(1), "echo", "line\n", ">>", "log.txt");

    {
        let mut pipeline = open_pipeline(&env);
        assert!(matches!(pipeline.process(&append).unwrap(), Outcome::Written { .. }));
        // Confirmed in a block after being seen in the mempool
        let report = pipeline.process_block(&block(vec![append.clone()])).unwrap();
        assert_eq!(report.already_stored, 1);
        assert_eq!(report.written, 0);
    }
    assert_eq!(fs::read_to_string(&target).unwrap(), "line\n");

    // The applied marker is durable across restarts
    let mut pipeline = open_pipeline(&env);
    assert_eq!(
        pipeline.process(&append).unwrap(),
        Outcome::AlreadyStored { id: id(1) }
    );
    pipeline
        .process(&bitcom_tx(&id(2), "echo", "next\n", ">>", "log.txt"))
        .unwrap();
    assert_eq!(fs::read_to_string(&target).unwrap(), "line\nnext\n");
}

#[test]
fn test_unnameable_paths_are_rejected_not_fatal() {
    let env = TestEnvironment::new().unwrap();
    let mut pipeline = open_pipeline(&env);

    let long_component = "a".repeat(300);
    let deep = vec!["d".repeat(200); 30].join("/");
    for (n, path) in ["a\0b", long_component.as_str(), deep.as_str()]
        .iter()
        .enumerate()
    {
        let outcome = pipeline
            .process(&bitcom_tx(&id(1 + n as u32), "echo", "x", ">", path))
            .unwrap();
        assert_eq!(outcome, Outcome::Rejected(RejectReason::InvalidPath));
    }

    // Ingestion carries on
    let outcome = pipeline
        .process(&bitcom_tx(&id(9), "echo", "ok", ">", "fine.txt"))
        .unwrap();
    assert!(matches!(outcome, Outcome::Written { .. }));
}
