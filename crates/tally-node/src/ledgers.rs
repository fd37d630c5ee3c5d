//! Open ledgers of tracked chains

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tally_core::ChainId;
use tally_ledger::{ledger_file_name, Ledger, LedgerResult};

/// Where chain ledgers live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerLocation {
    /// One SQLite file per chain inside a directory
    Dir(PathBuf),
    /// In-memory databases, lost on exit
    Memory,
}

/// Cache of per-chain ledgers
#[derive(Debug)]
pub struct LedgerSet {
    location: LedgerLocation,
    open: Mutex<HashMap<ChainId, Arc<Ledger>>>,
}

impl LedgerSet {
    /// Ledgers stored at `location`
    pub fn new(location: LedgerLocation) -> Self {
        Self {
            location,
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Storage location
    pub fn location(&self) -> &LedgerLocation {
        &self.location
    }

    /// Ledger of `chain_id`, created if it does not exist
    pub fn open(&self, chain_id: &ChainId) -> LedgerResult<Arc<Ledger>> {
        let mut open = self.open.lock();
        if let Some(ledger) = open.get(chain_id) {
            return Ok(Arc::clone(ledger));
        }
        let ledger = Arc::new(match &self.location {
            LedgerLocation::Dir(dir) => Ledger::open_in_dir(dir, chain_id)?,
            LedgerLocation::Memory => Ledger::open_in_memory()?,
        });
        open.insert(*chain_id, Arc::clone(&ledger));
        Ok(ledger)
    }

    /// Ledger of `chain_id` if one was ever created
    pub fn existing(&self, chain_id: &ChainId) -> LedgerResult<Option<Arc<Ledger>>> {
        if let Some(ledger) = self.open.lock().get(chain_id) {
            return Ok(Some(Arc::clone(ledger)));
        }
        match &self.location {
            LedgerLocation::Dir(dir) if dir.join(ledger_file_name(chain_id)).exists() => {
                self.open(chain_id).map(Some)
            }
            _ => Ok(None),
        }
    }
}
