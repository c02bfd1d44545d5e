//! # bitfs-ingest
//!
//! Turns feed transactions into stored files.
//!
//! Each transaction is decoded once into a [`Record`] and dispatched to
//! its handler:
//!
//! - B: one transaction, one file. Stored in the CAS and aliased under
//!   `b/<txid>`.
//! - BCAT: a manifest listing chunk txids. Chunks are buffered as they
//!   arrive; once all are present they are concatenated in manifest order,
//!   stored, and aliased under `bcat/<manifest txid>`.
//! - Bitcom `echo`/`cat`: writes into `bitcom/<owner>/<path>`.
//!
//! Every handler is idempotent, so replaying a block (or seeing a mempool
//! transaction again when it confirms) leaves state unchanged.
//!
//! ```ignore
//! let engine = Engine::open(&config)?;
//! let (tx, queue) = queue::channel(config.ingest.queue_depth);
//! let consumer = tokio::spawn(run_consumer(queue, Pipeline::new(engine)));
//! tx.send(FeedEvent::Mempool(transaction)).await?;
//! ```

pub mod bcat;
pub mod bfile;
pub mod bitcom;
pub mod engine;
pub mod feed;
pub mod outcome;
pub mod pipeline;
pub mod queue;
pub mod record;
pub mod resolve;
pub mod sniff;

pub use engine::{Engine, IngestError};
pub use feed::{Block, BlockInfo, Transaction};
pub use outcome::{Assembled, BatchReport, Outcome, RejectReason, SkipReason};
pub use pipeline::Pipeline;
pub use queue::{run_consumer, FeedEvent, IngestQueue};
pub use record::{DecodeError, Record};
pub use resolve::{Resolved, ResolveError, Resolver};
