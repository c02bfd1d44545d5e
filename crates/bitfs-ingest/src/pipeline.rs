//! Per-transaction dispatch.
//!
//! Mempool transactions and blocks both funnel through
//! [`Pipeline::process`], so idempotency does not depend on the entry
//! point. Decode failures downgrade to a skip; storage failures propagate
//! and end the batch.

use bitfs_config::{log_ingest_debug, log_ingest_info};

use crate::bcat::{save_chunk, save_manifest};
use crate::bfile::save_b;
use crate::bitcom::save_bitcom;
use crate::engine::{Engine, Result};
use crate::feed::{Block, Transaction};
use crate::outcome::{BatchReport, Outcome, SkipReason};
use crate::record::Record;

/// Sole writer over an [`Engine`].
///
/// Processing takes `&mut self`: the existence checks in the handlers are
/// check-then-act, so callers that share a pipeline must serialize access
/// (see [`crate::queue`]).
pub struct Pipeline {
    engine: Engine,
}

impl Pipeline {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn into_engine(self) -> Engine {
        self.engine
    }

    /// Process one transaction to completion.
    pub fn process(&mut self, tx: &Transaction) -> Result<Outcome> {
        let record = match Record::decode(tx) {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(Outcome::Ignored),
            Err(e) => {
                log_ingest_debug!(
                    "Skipping malformed record",
                    txid = tx.txid(),
                    reason = e.to_string().as_str(),
                );
                return Ok(Outcome::Skipped(SkipReason::Malformed(e)));
            }
        };

        match &record {
            Record::B(file) => save_b(&self.engine, file),
            Record::Manifest(manifest) => save_manifest(&self.engine, manifest),
            Record::Chunk(chunk) => save_chunk(&self.engine, chunk),
            Record::Bitcom(write) => save_bitcom(&self.engine, write),
        }
    }

    /// Block transactions, then the residual mempool, strictly in order.
    pub fn process_block(&mut self, block: &Block) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        for tx in block.items.iter().chain(block.mempool.iter()) {
            let outcome = self.process(tx)?;
            report.record(&outcome);
        }

        let height = block.info.as_ref().map(|i| i.height).unwrap_or_default();
        log_ingest_info!(
            "Block processed",
            height = height,
            txs = block.items.len(),
            mempool = block.mempool.len(),
            stored = report.stored,
            assembled = report.assembled,
        );
        Ok(report)
    }
}
