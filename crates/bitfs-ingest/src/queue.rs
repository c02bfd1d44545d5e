//! Single-consumer ingest queue.
//!
//! Mempool and block producers only hold an [`mpsc::Sender`]. One consumer
//! task owns the [`Pipeline`], so every handler runs serialized and the
//! check-then-act sequences inside it never race.

use std::sync::atomic::{AtomicU8, Ordering};

use bitfs_config::{log_daemon_error, log_ingest_debug, log_ingest_info};
use tokio::sync::{mpsc, oneshot};

use crate::engine::{IngestError, Result};
use crate::feed::{Block, Transaction};
use crate::outcome::BatchReport;
use crate::pipeline::Pipeline;

/// Unit of work delivered by a producer
#[derive(Debug)]
pub enum FeedEvent {
    Mempool(Transaction),
    /// `done` receives the block's report once every transaction in it has
    /// been handled. It is dropped unsent if the block failed.
    Block {
        block: Block,
        done: Option<oneshot::Sender<BatchReport>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum QueueState {
    /// Created, consumer not started
    Idle = 0,
    Running = 1,
    /// All senders gone, or a fatal error
    Stopped = 2,
}

impl From<u8> for QueueState {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Running,
            2 => Self::Stopped,
            _ => Self::Idle,
        }
    }
}

pub struct IngestQueue {
    rx: mpsc::Receiver<FeedEvent>,
    state: AtomicU8,
}

/// Bounded channel; `depth` applies backpressure to producers.
pub fn channel(depth: usize) -> (mpsc::Sender<FeedEvent>, IngestQueue) {
    let (tx, rx) = mpsc::channel(depth.max(1));
    (tx, IngestQueue::new(rx))
}

impl IngestQueue {
    pub fn new(rx: mpsc::Receiver<FeedEvent>) -> Self {
        Self {
            rx,
            state: AtomicU8::new(QueueState::Idle as u8),
        }
    }

    pub fn state(&self) -> QueueState {
        QueueState::from(self.state.load(Ordering::Acquire))
    }

    /// Move forward only: Idle -> Running -> Stopped, or Idle -> Stopped.
    pub fn transition(&self, next: QueueState) -> bool {
        let current = self.state();
        let valid = matches!(
            (current, next),
            (QueueState::Idle, QueueState::Running)
                | (QueueState::Running, QueueState::Stopped)
                | (QueueState::Idle, QueueState::Stopped)
        );
        if valid {
            self.state.store(next as u8, Ordering::Release);
        }
        valid
    }

    pub async fn next(&mut self) -> Option<FeedEvent> {
        self.rx.recv().await
    }
}

/// Drain the queue until every sender is dropped.
///
/// Returns the running total over all events. A storage failure stops the
/// consumer immediately and is returned; events still queued are discarded.
pub async fn run_consumer(mut queue: IngestQueue, mut pipeline: Pipeline) -> Result<BatchReport> {
    queue.transition(QueueState::Running);
    log_ingest_info!("Ingest consumer started");

    let mut total = BatchReport::default();
    while let Some(event) = queue.next().await {
        if let Err(e) = handle_event(&mut pipeline, event, &mut total) {
            queue.transition(QueueState::Stopped);
            log_daemon_error!("Ingest stopped on storage failure", error = e.to_string().as_str());
            return Err(e);
        }
    }

    queue.transition(QueueState::Stopped);
    log_ingest_info!(
        "Ingest consumer stopped",
        processed = total.processed,
        stored = total.stored,
        assembled = total.assembled,
    );
    Ok(total)
}

fn handle_event(
    pipeline: &mut Pipeline,
    event: FeedEvent,
    total: &mut BatchReport,
) -> std::result::Result<(), IngestError> {
    match event {
        FeedEvent::Mempool(tx) => {
            log_ingest_debug!("Mempool transaction", txid = tx.txid());
            let outcome = pipeline.process(&tx)?;
            total.record(&outcome);
        }
        FeedEvent::Block { block, done } => {
            let report = pipeline.process_block(&block)?;
            total.merge(&report);
            if let Some(done) = done {
                // Receiver may have stopped waiting
                let _ = done.send(report);
            }
        }
    }
    Ok(())
}
