//! SQLite schema for a per-chain ledger and for the chain store

use rusqlite::{params, Connection};
use tally_core::Address;

/// Reserved row id of the coinbase address
pub const COINBASE_ADDRESS_ID: i64 = 1;

/// Schema of one chain's ledger database
const LEDGER_SCHEMA_SQL: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS "addresses" (
    "id"      INTEGER PRIMARY KEY,
    "address" BLOB NOT NULL UNIQUE,
    "balance" INTEGER NOT NULL CHECK ("balance" >= 0)
);

CREATE TABLE IF NOT EXISTS "entries" (
    "id"        INTEGER PRIMARY KEY,
    "hash"      BLOB NOT NULL,
    "timestamp" INTEGER NOT NULL,
    "valid"     INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS "idx_entries_hash" ON "entries"("hash");

CREATE TABLE IF NOT EXISTS "address_transactions" (
    "id"         INTEGER PRIMARY KEY,
    "address_id" INTEGER NOT NULL REFERENCES "addresses"("id"),
    "entry_id"   INTEGER NOT NULL REFERENCES "entries"("id"),
    "to"         INTEGER NOT NULL,
    UNIQUE ("address_id", "entry_id", "to")
);
CREATE INDEX IF NOT EXISTS "idx_address_transactions_address"
    ON "address_transactions"("address_id");

CREATE TABLE IF NOT EXISTS "metadata" (
    "id"    INTEGER PRIMARY KEY CHECK ("id" = 1),
    "chain" TEXT NOT NULL
);
"#;

/// Schema of the chain store database
const CHAIN_STORE_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS "chains" (
    "chain_id" BLOB PRIMARY KEY,
    "height"   INTEGER,
    "state"    TEXT NOT NULL
);
"#;

/// Create ledger tables and the reserved coinbase row
pub(crate) fn init_ledger(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(LEDGER_SCHEMA_SQL)?;
    conn.execute(
        r#"INSERT OR IGNORE INTO "addresses" ("id", "address", "balance") VALUES (?1, ?2, 0)"#,
        params![COINBASE_ADDRESS_ID, Address::coinbase().as_bytes().as_slice()],
    )?;
    Ok(())
}

/// Create chain store tables
pub(crate) fn init_chain_store(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CHAIN_STORE_SCHEMA_SQL)
}
