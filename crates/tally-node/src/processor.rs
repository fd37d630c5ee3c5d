//! Block processor
//!
//! Applies one block of one chain: skip decisions against the recorded
//! height, first-block classification, then issuance or transaction
//! handling for each entry. Entry failures reject only that entry; the
//! block's height is recorded once every entry has been attempted.
//!
//! A chain's blocks are serialized by a per-chain lock, so different chains
//! may be processed from different threads at the same time.

use crate::block::{Block, BlockSource};
use crate::config::NodeConfig;
use crate::errors::ProcessError;
use crate::ledgers::{LedgerLocation, LedgerSet};
use crate::tracking::{classify_chain, TrackingPolicy};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tally_core::{ChainId, Entry};
use tally_ledger::{
    BlockWriter, ChainMetadata, ChainStatus, ChainStore, EntryRecord, Ledger, LedgerError,
    MemoryChainStore, SqliteChainStore, TrackedChain,
};
use tally_token::{validate_issuance, validate_transaction};
use tracing::{debug, error, info, warn};

/// What processing a block did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// The block's height was already covered
    Skipped,
    /// The chain is ignored; only its height moved
    Ignored,
    /// Entries of a tracked chain were attempted
    Processed {
        /// Entries accepted
        applied: usize,
        /// Entries rejected
        rejected: usize,
    },
}

enum EntryOutcome {
    Applied,
    Rejected(String),
}

/// Applies blocks to chain ledgers
pub struct BlockProcessor {
    store: Arc<dyn ChainStore>,
    source: Arc<dyn BlockSource>,
    ledgers: LedgerSet,
    policy: TrackingPolicy,
    locks: Mutex<HashMap<ChainId, Arc<Mutex<()>>>>,
    halted: Mutex<BTreeSet<ChainId>>,
}

impl BlockProcessor {
    /// Create a processor over the given collaborators
    pub fn new(
        store: Arc<dyn ChainStore>,
        source: Arc<dyn BlockSource>,
        ledgers: LedgerSet,
        policy: TrackingPolicy,
    ) -> Self {
        Self {
            store,
            source,
            ledgers,
            policy,
            locks: Mutex::new(HashMap::new()),
            halted: Mutex::new(BTreeSet::new()),
        }
    }

    /// Processor with in-memory chain store and ledgers
    pub fn in_memory(source: Arc<dyn BlockSource>) -> Self {
        Self::new(
            Arc::new(MemoryChainStore::new()),
            source,
            LedgerSet::new(LedgerLocation::Memory),
            TrackingPolicy::default(),
        )
    }

    /// Processor laid out as `config` describes
    pub fn from_config(
        config: &NodeConfig,
        source: Arc<dyn BlockSource>,
    ) -> Result<Self, ProcessError> {
        let store: Arc<dyn ChainStore> = match config.chain_store_path() {
            Some(path) => {
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir).map_err(LedgerError::from)?;
                }
                Arc::new(SqliteChainStore::open(path).map_err(ProcessError::Store)?)
            }
            None => Arc::new(MemoryChainStore::new()),
        };
        Ok(Self::new(
            store,
            source,
            LedgerSet::new(config.ledger_location()),
            config.tracking_policy(),
        ))
    }

    /// Replace the tracking policy
    pub fn with_policy(mut self, policy: TrackingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The block source used for issuer lookups
    pub fn source(&self) -> &Arc<dyn BlockSource> {
        &self.source
    }

    /// Whether `chain_id` stopped after ledger corruption, in this process or
    /// an earlier one
    pub fn is_halted(&self, chain_id: &ChainId) -> Result<bool, ProcessError> {
        if self.halted.lock().contains(chain_id) {
            return Ok(true);
        }
        Ok(self.chain_metadata(chain_id)?.halted)
    }

    /// Ledger of a chain that has been tracked, if any
    pub fn ledger(&self, chain_id: &ChainId) -> Result<Option<Arc<Ledger>>, ProcessError> {
        Ok(self.ledgers.existing(chain_id)?)
    }

    /// Current metadata of `chain_id`
    pub fn chain_metadata(&self, chain_id: &ChainId) -> Result<ChainMetadata, ProcessError> {
        self.with_chain_lock(chain_id, || self.resolve(chain_id))
    }

    /// Apply `block` to `chain_id`.
    ///
    /// Returns [`ProcessError::IncompleteData`] without recording anything if
    /// the block is not populated, and [`ProcessError::ChainHalted`] for a
    /// chain stopped by an earlier corruption.
    pub fn process_block(
        &self,
        chain_id: &ChainId,
        block: &Block,
    ) -> Result<BlockOutcome, ProcessError> {
        self.with_chain_lock(chain_id, || -> Result<BlockOutcome, ProcessError> {
            let meta = self.resolve(chain_id)?;
            if meta.halted || self.halted.lock().contains(chain_id) {
                return Err(ProcessError::ChainHalted(*chain_id));
            }

            let result = self.process_locked(chain_id, block, meta.clone());
            if let Err(ProcessError::Ledger(err)) = &result {
                if err.is_corruption() {
                    error!(chain = %chain_id, height = block.height, error = %err, "halting chain");
                    self.halt(meta);
                }
            }
            result
        })
    }

    /// Stop `meta`'s chain for good. The halt is saved to the chain store so
    /// it outlives the process.
    fn halt(&self, mut meta: ChainMetadata) {
        self.halted.lock().insert(meta.chain_id);
        meta.halted = true;
        if let Err(err) = self.store.save(&meta) {
            error!(chain = %meta.chain_id, error = %err, "failed to record halt");
        }
    }

    fn process_locked(
        &self,
        chain_id: &ChainId,
        block: &Block,
        mut meta: ChainMetadata,
    ) -> Result<BlockOutcome, ProcessError> {
        if meta.has_processed(block.height) {
            debug!(chain = %chain_id, height = block.height, "skipping block");
            return Ok(BlockOutcome::Skipped);
        }
        if meta.is_ignored() {
            return self.record_ignored(meta, block.height);
        }
        if !block.is_populated() {
            return Err(ProcessError::IncompleteData {
                chain_id: *chain_id,
                height: block.height,
            });
        }

        let mut entries = block.entries.as_slice();
        if matches!(meta.status, ChainStatus::Unknown) {
            if block.is_first {
                meta.status = match entries.first() {
                    Some(first) => {
                        classify_chain(chain_id, first, &self.policy, self.source.as_ref())?
                    }
                    None => ChainStatus::Ignored,
                };
                match &meta.status {
                    ChainStatus::Tracked(tracked) => info!(
                        chain = %chain_id,
                        token = %tracked.name_ids.token_id,
                        issuer = %tracked.issuer,
                        "tracking chain"
                    ),
                    _ => info!(chain = %chain_id, "ignoring chain"),
                }
                entries = entries.get(1..).unwrap_or_default();
            } else {
                warn!(
                    chain = %chain_id,
                    height = block.height,
                    "unclassified chain without first block"
                );
                meta.status = ChainStatus::Ignored;
            }
        }

        if !matches!(meta.status, ChainStatus::Tracked(_)) {
            return self.record_ignored(meta, block.height);
        }

        let ledger = self.ledgers.open(chain_id)?;
        let outcome = ledger.write_block(|writer| {
            let (mut applied, mut rejected) = (0, 0);
            if let ChainStatus::Tracked(tracked) = &mut meta.status {
                for entry in entries {
                    let record = EntryRecord {
                        hash: entry.hash(),
                        timestamp: entry.timestamp,
                    };
                    match apply_entry(writer, tracked, chain_id, entry, &record)? {
                        EntryOutcome::Applied => applied += 1,
                        EntryOutcome::Rejected(reason) => {
                            warn!(
                                chain = %chain_id,
                                entry = %record.hash,
                                %reason,
                                "rejected entry"
                            );
                            writer.reject(&record)?;
                            rejected += 1;
                        }
                    }
                }
            }
            meta.advance(block.height);
            writer.set_metadata(&meta)?;
            Ok::<_, ProcessError>(BlockOutcome::Processed { applied, rejected })
        })?;
        self.store.save(&meta).map_err(ProcessError::Store)?;
        debug!(chain = %chain_id, height = block.height, ?outcome, "processed block");
        Ok(outcome)
    }

    fn record_ignored(
        &self,
        mut meta: ChainMetadata,
        height: u32,
    ) -> Result<BlockOutcome, ProcessError> {
        meta.advance(height);
        self.store.save(&meta).map_err(ProcessError::Store)?;
        Ok(BlockOutcome::Ignored)
    }

    /// Load chain metadata, preferring whichever of the chain store and the
    /// chain's own ledger is further along
    fn resolve(&self, chain_id: &ChainId) -> Result<ChainMetadata, ProcessError> {
        let stored = self
            .store
            .load(chain_id)
            .map_err(ProcessError::Store)?
            .unwrap_or_else(|| ChainMetadata::new(*chain_id));
        let committed = match self.ledgers.existing(chain_id)? {
            Some(ledger) => ledger.metadata()?,
            None => None,
        };
        Ok(match committed {
            Some(committed) => stored.newest(committed),
            None => stored,
        })
    }

    /// Run `f` holding the lock of `chain_id`. The lock is dropped from the
    /// map once no other caller holds or waits on it.
    fn with_chain_lock<T>(&self, chain_id: &ChainId, f: impl FnOnce() -> T) -> T {
        let lock = Arc::clone(self.locks.lock().entry(*chain_id).or_default());
        let result = {
            let _guard = lock.lock();
            f()
        };
        let mut locks = self.locks.lock();
        // New holders clone under the map lock, so a count of two is final
        if Arc::strong_count(&lock) == 2 {
            locks.remove(chain_id);
        }
        result
    }
}

/// Validate and apply one entry of a tracked chain.
///
/// Until an issuance is accepted every entry is treated as a candidate
/// issuance; afterwards every entry is a transaction.
fn apply_entry(
    writer: &mut BlockWriter<'_>,
    tracked: &mut TrackedChain,
    chain_id: &ChainId,
    entry: &Entry,
    record: &EntryRecord,
) -> Result<EntryOutcome, ProcessError> {
    if entry.chain_id != *chain_id {
        return Ok(EntryOutcome::Rejected(format!(
            "entry belongs to chain {}",
            entry.chain_id
        )));
    }

    if tracked.issuance.is_none() {
        let issuance = match validate_issuance(entry, &tracked.issuer) {
            Ok(issuance) => issuance,
            Err(err) => return Ok(EntryOutcome::Rejected(err.to_string())),
        };
        if let Err(err) = ledger_step(writer.apply_entry(record))? {
            return Ok(err);
        }
        info!(chain = %chain_id, supply = issuance.supply, "accepted issuance");
        tracked.issuance = Some(issuance);
        return Ok(EntryOutcome::Applied);
    }

    let tx = match validate_transaction(entry, &tracked.issuer) {
        Ok(tx) => tx,
        Err(err) => return Ok(EntryOutcome::Rejected(err.to_string())),
    };

    if tx.is_coinbase() {
        let amount = match tx.total() {
            Ok(amount) => amount,
            Err(err) => return Ok(EntryOutcome::Rejected(err.to_string())),
        };
        if !tracked.can_mint(amount) {
            return Ok(EntryOutcome::Rejected(format!(
                "coinbase of {amount} exceeds remaining supply"
            )));
        }
        if let Err(err) = ledger_step(writer.apply_mint(record, &tx.outputs))? {
            return Ok(err);
        }
        tracked.issued += amount;
    } else if let Err(err) =
        ledger_step(writer.apply_transfer(record, &tx.inputs, &tx.outputs))?
    {
        return Ok(err);
    }
    debug!(chain = %chain_id, entry = %record.hash, "applied transaction");
    Ok(EntryOutcome::Applied)
}

/// Split a ledger result into an entry rejection or a block failure
fn ledger_step<T>(
    result: Result<T, LedgerError>,
) -> Result<Result<T, EntryOutcome>, ProcessError> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(err) if err.is_entry_rejection() => Ok(Err(EntryOutcome::Rejected(err.to_string()))),
        Err(err) => Err(err.into()),
    }
}
