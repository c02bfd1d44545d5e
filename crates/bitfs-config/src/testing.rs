//! Test environment abstraction for isolated testing.
//!
//! # Usage
//!
//! ```ignore
//! use bitfs_config::testing::TestEnvironment;
//!
//! let env = TestEnvironment::new().unwrap();
//! let config = env.config();
//! // config.storage.root points into a private temp dir
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

use crate::Config;

/// Atomic counter for unique test IDs
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Isolated storage root, removed when dropped
pub struct TestEnvironment {
    _temp_dir: TempDir,
    /// Storage root for this test
    pub root: PathBuf,
    /// Unique test ID
    pub test_id: u32,
}

impl TestEnvironment {
    pub fn new() -> anyhow::Result<Self> {
        let test_id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().join(format!("bitfs-{test_id}"));
        std::fs::create_dir_all(&root)?;

        Ok(Self {
            _temp_dir: temp_dir,
            root,
            test_id,
        })
    }

    /// Default config rooted at this environment, with a small LMDB map.
    pub fn config(&self) -> Config {
        let mut cfg = Config::default();
        cfg.storage.root = self.root.clone();
        cfg.index.map_size = 16 * 1024 * 1024;
        cfg.ingest.queue_depth = 16;
        cfg
    }
}
