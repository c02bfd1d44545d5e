//! What processing a transaction did.

use std::path::PathBuf;

use bitfs_cas::ContentHash;

use crate::record::DecodeError;

/// Why a relevant-looking transaction was passed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Malformed(DecodeError),
    /// Bitcom `cat` whose source is not stored
    MissingSource,
}

/// Why a Bitcom write was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Empty, absolute, or containing a `..` segment
    PathTraversal,
    InvalidOwner,
    /// NUL byte, or a component or whole path too long to name
    InvalidPath,
    /// A path component is already a file, or the target is a directory
    PathConflict,
}

/// A BCAT file that became complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    pub manifest_id: String,
    pub hash: ContentHash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No data output, or a protocol this engine does not handle
    Ignored,
    Skipped(SkipReason),
    /// B file stored and aliased
    Stored { id: String, hash: ContentHash },
    /// Alias already existed, or the Bitcom write was already applied;
    /// nothing was done
    AlreadyStored { id: String },
    /// Manifest recorded, still waiting on chunks
    ManifestPending { id: String },
    Assembled(Assembled),
    /// Chunk buffered; lists every manifest it completed
    ChunkBuffered { id: String, assembled: Vec<Assembled> },
    Written { path: PathBuf },
    Rejected(RejectReason),
}

/// Per-batch tally, sent as the completion signal of a block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: u64,
    pub ignored: u64,
    pub skipped: u64,
    pub stored: u64,
    pub already_stored: u64,
    pub pending: u64,
    pub assembled: u64,
    pub chunks: u64,
    pub written: u64,
    pub rejected: u64,
}

impl BatchReport {
    pub fn record(&mut self, outcome: &Outcome) {
        self.processed += 1;
        match outcome {
            Outcome::Ignored => self.ignored += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Stored { .. } => self.stored += 1,
            Outcome::AlreadyStored { .. } => self.already_stored += 1,
            Outcome::ManifestPending { .. } => self.pending += 1,
            Outcome::Assembled(_) => self.assembled += 1,
            Outcome::ChunkBuffered { assembled, .. } => {
                self.chunks += 1;
                self.assembled += assembled.len() as u64;
            }
            Outcome::Written { .. } => self.written += 1,
            Outcome::Rejected(_) => self.rejected += 1,
        }
    }

    pub fn merge(&mut self, other: &BatchReport) {
        self.processed += other.processed;
        self.ignored += other.ignored;
        self.skipped += other.skipped;
        self.stored += other.stored;
        self.already_stored += other.already_stored;
        self.pending += other.pending;
        self.assembled += other.assembled;
        self.chunks += other.chunks;
        self.written += other.written;
        self.rejected += other.rejected;
    }
}
