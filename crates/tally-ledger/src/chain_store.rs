//! Chain metadata stores
//!
//! The block processor reads and writes per-chain state through
//! [`ChainStore`] instead of holding a global registry. Two backends are
//! provided: SQLite for a running node and an in-memory map for tests.

use crate::chain::ChainMetadata;
use crate::errors::{LedgerError, LedgerResult};
use crate::schema::init_chain_store;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use tally_core::ChainId;

/// Keyed storage of chain metadata
pub trait ChainStore: Send + Sync {
    /// Load the metadata of `chain_id`, if it has been saved
    fn load(&self, chain_id: &ChainId) -> LedgerResult<Option<ChainMetadata>>;

    /// Save `metadata`, replacing any previous record for its chain
    fn save(&self, metadata: &ChainMetadata) -> LedgerResult<()>;

    /// All saved chains, ordered by chain id
    fn chains(&self) -> LedgerResult<Vec<ChainMetadata>>;
}

/// Chain store backed by a SQLite database
pub struct SqliteChainStore {
    conn: Mutex<Connection>,
}

impl SqliteChainStore {
    /// Open or create a chain store at `path`
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let conn = Connection::open(path)?;
        init_chain_store(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory chain store
    pub fn open_in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_chain_store(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl ChainStore for SqliteChainStore {
    fn load(&self, chain_id: &ChainId) -> LedgerResult<Option<ChainMetadata>> {
        let conn = self.conn.lock();
        let json: Option<String> = conn
            .query_row(
                r#"SELECT "state" FROM "chains" WHERE "chain_id" = ?1"#,
                [chain_id.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|json| serde_json::from_str(&json).map_err(LedgerError::from))
            .transpose()
    }

    fn save(&self, metadata: &ChainMetadata) -> LedgerResult<()> {
        let json = serde_json::to_string(metadata)?;
        self.conn.lock().execute(
            r#"INSERT INTO "chains" ("chain_id", "height", "state") VALUES (?1, ?2, ?3)
               ON CONFLICT("chain_id") DO UPDATE
               SET "height" = "excluded"."height", "state" = "excluded"."state""#,
            params![metadata.chain_id.as_bytes().as_slice(), metadata.height, json],
        )?;
        Ok(())
    }

    fn chains(&self) -> LedgerResult<Vec<ChainMetadata>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(r#"SELECT "state" FROM "chains" ORDER BY "chain_id""#)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let chains = rows
            .map(|json| -> LedgerResult<ChainMetadata> { Ok(serde_json::from_str(&json?)?) })
            .collect();
        chains
    }
}

/// Chain store held in memory
#[derive(Debug, Default)]
pub struct MemoryChainStore {
    chains: Mutex<BTreeMap<ChainId, ChainMetadata>>,
}

impl MemoryChainStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChainStore for MemoryChainStore {
    fn load(&self, chain_id: &ChainId) -> LedgerResult<Option<ChainMetadata>> {
        Ok(self.chains.lock().get(chain_id).cloned())
    }

    fn save(&self, metadata: &ChainMetadata) -> LedgerResult<()> {
        self.chains
            .lock()
            .insert(metadata.chain_id, metadata.clone());
        Ok(())
    }

    fn chains(&self) -> LedgerResult<Vec<ChainMetadata>> {
        Ok(self.chains.lock().values().cloned().collect())
    }
}
