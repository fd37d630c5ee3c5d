//! Multi-chain catch-up
//!
//! Each chain is followed by exactly one worker thread at a time, which walks
//! it from the block after its recorded height up to the source's head.
//! Up to `max_parallel_chains` chains are followed concurrently.

use crate::block::BlockSource;
use crate::errors::ProcessError;
use crate::processor::{BlockOutcome, BlockProcessor};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use tally_core::ChainId;
use tracing::{debug, warn};

/// Progress made on one chain during a catch-up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainProgress {
    /// Recorded height after the catch-up
    pub height: Option<u32>,
    /// Blocks fetched and handed to the processor
    pub blocks: usize,
    /// Entries accepted
    pub applied: usize,
    /// Entries rejected
    pub rejected: usize,
}

/// Outcome per chain of a catch-up
pub type CatchUpReport = BTreeMap<ChainId, Result<ChainProgress, ProcessError>>;

/// Drives the block processor across many chains
pub struct Follower {
    processor: Arc<BlockProcessor>,
    max_parallel_chains: usize,
}

impl Follower {
    /// Create a follower running at most `max_parallel_chains` workers
    pub fn new(processor: Arc<BlockProcessor>, max_parallel_chains: usize) -> Self {
        Self {
            processor,
            max_parallel_chains: max_parallel_chains.max(1),
        }
    }

    /// The processor blocks are applied with
    pub fn processor(&self) -> &Arc<BlockProcessor> {
        &self.processor
    }

    /// Bring every chain in `targets` up to its source head.
    ///
    /// A failing chain stops at the failing block; other chains continue.
    pub fn catch_up(&self, targets: &[ChainId]) -> CatchUpReport {
        let queue: Mutex<VecDeque<ChainId>> = Mutex::new(
            targets
                .iter()
                .copied()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        );
        let workers = self.max_parallel_chains.min(queue.lock().len());
        let report = Mutex::new(CatchUpReport::new());

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let Some(chain_id) = queue.lock().pop_front() else {
                        break;
                    };
                    let result = self.follow_chain(&chain_id);
                    if let Err(err) = &result {
                        warn!(chain = %chain_id, error = %err, "catch-up stopped");
                    }
                    report.lock().insert(chain_id, result);
                });
            }
        });

        report.into_inner()
    }

    /// Walk one chain up to the source head
    pub fn follow_chain(&self, chain_id: &ChainId) -> Result<ChainProgress, ProcessError> {
        let source: &dyn BlockSource = self.processor.source().as_ref();
        let mut progress = ChainProgress {
            height: self.processor.chain_metadata(chain_id)?.height,
            ..ChainProgress::default()
        };
        let Some(head) = source.chain_head(chain_id)? else {
            return Ok(progress);
        };
        let start = match progress.height {
            None => 0,
            Some(height) if height >= head => return Ok(progress),
            Some(height) => height + 1,
        };

        for height in start..=head {
            let Some(block) = source.get_block(chain_id, height)? else {
                continue;
            };
            match self.processor.process_block(chain_id, &block)? {
                BlockOutcome::Processed { applied, rejected } => {
                    progress.applied += applied;
                    progress.rejected += rejected;
                }
                BlockOutcome::Ignored | BlockOutcome::Skipped => {}
            }
            progress.blocks += 1;
        }
        progress.height = self.processor.chain_metadata(chain_id)?.height;
        debug!(chain = %chain_id, height = ?progress.height, blocks = progress.blocks, "caught up");
        Ok(progress)
    }
}
