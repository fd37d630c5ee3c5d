//! Blocks and the block source collaborator
//!
//! A block lists the hashes of its entries; it is populated once every entry
//! body has been fetched and hashes to the listed value. Fetching is outside
//! this crate: callers implement [`BlockSource`] for their network client.

use crate::errors::SourceError;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tally_core::{Address, ChainId, Entry, EntryHash};

/// One block of a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Block height
    pub height: u32,
    /// Hashes of the block's entries, in order
    pub entry_hashes: Vec<EntryHash>,
    /// Fetched entry bodies, in order
    pub entries: Vec<Entry>,
    /// Whether this is the first block of its chain
    pub is_first: bool,
}

impl Block {
    /// A populated block built from its entries
    pub fn new(height: u32, entries: Vec<Entry>, is_first: bool) -> Self {
        Self {
            height,
            entry_hashes: entries.iter().map(Entry::hash).collect(),
            entries,
            is_first,
        }
    }

    /// A block whose entry bodies have not been fetched yet
    pub fn unpopulated(height: u32, entry_hashes: Vec<EntryHash>, is_first: bool) -> Self {
        Self {
            height,
            entry_hashes,
            entries: Vec::new(),
            is_first,
        }
    }

    /// Whether every listed entry is present, well formed, and matches its
    /// hash
    pub fn is_populated(&self) -> bool {
        self.entries.len() == self.entry_hashes.len()
            && self
                .entries
                .iter()
                .zip(&self.entry_hashes)
                .all(|(entry, hash)| entry.is_well_formed() && entry.hash() == *hash)
    }
}

/// Source of blocks and issuer identities
pub trait BlockSource: Send + Sync {
    /// Fetch the block of `chain_id` at `height`, `None` if the chain has no
    /// block there
    fn get_block(&self, chain_id: &ChainId, height: u32) -> Result<Option<Block>, SourceError>;

    /// Height of the newest block of `chain_id`, `None` for an unknown chain
    fn chain_head(&self, chain_id: &ChainId) -> Result<Option<u32>, SourceError>;

    /// Address of the key registered on an issuer identity chain
    fn issuer_key(&self, identity_chain: &ChainId) -> Result<Address, SourceError>;
}

/// Block source held in memory
#[derive(Debug, Default)]
pub struct MemoryBlockSource {
    blocks: RwLock<BTreeMap<ChainId, BTreeMap<u32, Block>>>,
    identities: RwLock<BTreeMap<ChainId, Address>>,
}

impl MemoryBlockSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a block
    pub fn insert_block(&self, chain_id: ChainId, block: Block) {
        self.blocks
            .write()
            .entry(chain_id)
            .or_default()
            .insert(block.height, block);
    }

    /// Register the key address of an identity chain
    pub fn insert_identity(&self, identity_chain: ChainId, address: Address) {
        self.identities.write().insert(identity_chain, address);
    }
}

impl BlockSource for MemoryBlockSource {
    fn get_block(&self, chain_id: &ChainId, height: u32) -> Result<Option<Block>, SourceError> {
        Ok(self
            .blocks
            .read()
            .get(chain_id)
            .and_then(|blocks| blocks.get(&height))
            .cloned())
    }

    fn chain_head(&self, chain_id: &ChainId) -> Result<Option<u32>, SourceError> {
        Ok(self
            .blocks
            .read()
            .get(chain_id)
            .and_then(|blocks| blocks.keys().next_back().copied()))
    }

    fn issuer_key(&self, identity_chain: &ChainId) -> Result<Address, SourceError> {
        self.identities
            .read()
            .get(identity_chain)
            .copied()
            .ok_or(SourceError::UnknownIdentity(*identity_chain))
    }
}
