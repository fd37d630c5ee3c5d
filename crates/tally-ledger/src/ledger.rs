//! Per-chain balance ledger
//!
//! Each tracked chain owns one SQLite database holding its address balances,
//! the entries it has attempted, and the audit edges between the two. Balances
//! are a materialized running total guarded by a `CHECK (balance >= 0)`
//! constraint; the audit trail is never read to compute them.
//!
//! All writes for one block happen inside [`Ledger::write_block`]. Every
//! entry applied there runs in its own savepoint, so a rejected entry leaves
//! no trace except its `entries` row marked invalid.

use crate::chain::ChainMetadata;
use crate::errors::{LedgerError, LedgerResult};
use crate::schema::{init_ledger, COINBASE_ADDRESS_ID};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Transaction};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tally_core::{Address, ChainId, EntryHash};
use tracing::trace;

/// Row id of an address
pub type AddressId = i64;

/// Row id of an attempted entry
pub type EntryId = i64;

/// Identity of an entry as stored in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRecord {
    /// Content-addressed entry hash
    pub hash: EntryHash,
    /// Commit time in Unix seconds
    pub timestamp: i64,
}

/// One audit edge between an address and an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressTransaction {
    /// Entry row id
    pub entry_id: EntryId,
    /// Entry hash
    pub entry_hash: EntryHash,
    /// `true` when the entry credited the address, `false` when it debited it
    pub to: bool,
}

/// File name of a chain's ledger inside the ledger directory
pub fn ledger_file_name(chain_id: &ChainId) -> String {
    format!("{chain_id}.sqlite3")
}

/// SQLite-backed balance ledger for one chain
pub struct Ledger {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger").field("path", &self.path).finish()
    }
}

impl Ledger {
    /// Open or create a ledger at `path`
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        init_ledger(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open or create the ledger for `chain_id` inside `dir`
    pub fn open_in_dir(dir: impl AsRef<Path>, chain_id: &ChainId) -> LedgerResult<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        let ledger = Self::open(dir.as_ref().join(ledger_file_name(chain_id)))?;
        if let Some(metadata) = ledger.metadata()? {
            if metadata.chain_id != *chain_id {
                return Err(LedgerError::ChainMismatch {
                    expected: *chain_id,
                    found: metadata.chain_id,
                });
            }
        }
        Ok(ledger)
    }

    /// Create an in-memory ledger
    pub fn open_in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_ledger(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Database path, `None` for in-memory ledgers
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Balance of `address`; unknown addresses hold zero
    pub fn balance(&self, address: &Address) -> LedgerResult<u64> {
        let conn = self.conn.lock();
        let balance: Option<i64> = conn
            .query_row(
                r#"SELECT "balance" FROM "addresses" WHERE "address" = ?1"#,
                [address.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()?;
        balance.map_or(Ok(0), to_amount)
    }

    /// Row id of `address`, if it has one
    pub fn address_id(&self, address: &Address) -> LedgerResult<Option<AddressId>> {
        select_address_id(&self.conn.lock(), address)
    }

    /// Number of addresses, excluding the coinbase row.
    ///
    /// With `non_zero_only` set, only addresses holding a balance are counted.
    pub fn address_count(&self, non_zero_only: bool) -> LedgerResult<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            r#"SELECT count(*) FROM "addresses" WHERE "id" != ?1 AND (?2 OR "balance" > 0)"#,
            params![COINBASE_ADDRESS_ID, !non_zero_only],
            |row| row.get(0),
        )?;
        to_amount(count)
    }

    /// Audit edges of `address` in insertion order
    pub fn address_transactions(
        &self,
        address: &Address,
    ) -> LedgerResult<Vec<AddressTransaction>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"SELECT "entries"."id", "entries"."hash", "address_transactions"."to"
               FROM "address_transactions"
               JOIN "addresses" ON "addresses"."id" = "address_transactions"."address_id"
               JOIN "entries" ON "entries"."id" = "address_transactions"."entry_id"
               WHERE "addresses"."address" = ?1
               ORDER BY "address_transactions"."id""#,
        )?;
        let rows = stmt.query_map([address.as_bytes().as_slice()], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?, row.get::<_, bool>(2)?))
        })?;
        let edges = rows
            .map(|row| -> LedgerResult<AddressTransaction> {
                let (entry_id, hash, to) = row?;
                Ok(AddressTransaction {
                    entry_id,
                    entry_hash: entry_hash_from_blob(&hash)?,
                    to,
                })
            })
            .collect();
        edges
    }

    /// Whether an entry with `hash` was applied (`Some(true)`), only ever
    /// rejected (`Some(false)`), or never attempted (`None`)
    pub fn entry_status(&self, hash: &EntryHash) -> LedgerResult<Option<bool>> {
        let conn = self.conn.lock();
        let valid: Option<bool> = conn.query_row(
            r#"SELECT max("valid") FROM "entries" WHERE "hash" = ?1"#,
            [hash.as_bytes().as_slice()],
            |row| row.get(0),
        )?;
        Ok(valid)
    }

    /// Chain metadata committed with the last block, if any
    pub fn metadata(&self) -> LedgerResult<Option<ChainMetadata>> {
        let conn = self.conn.lock();
        let json: Option<String> = conn
            .query_row(r#"SELECT "chain" FROM "metadata" WHERE "id" = 1"#, [], |row| {
                row.get(0)
            })
            .optional()?;
        json.map(|json| serde_json::from_str(&json).map_err(LedgerError::from))
            .transpose()
    }

    /// Run `f` against one block's writes and commit them together.
    ///
    /// If `f` fails nothing is persisted.
    pub fn write_block<T, E>(
        &self,
        f: impl FnOnce(&mut BlockWriter<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<LedgerError>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(LedgerError::from)?;
        let mut writer = BlockWriter { tx };
        let out = f(&mut writer)?;
        writer.tx.commit().map_err(LedgerError::from)?;
        Ok(out)
    }
}

/// Write access to a ledger for the duration of one block
pub struct BlockWriter<'c> {
    tx: Transaction<'c>,
}

impl BlockWriter<'_> {
    /// Record an attempted entry. Recording a valid entry whose hash was
    /// already applied fails with [`LedgerError::Replay`].
    pub fn record_entry(&mut self, entry: &EntryRecord, valid: bool) -> LedgerResult<EntryId> {
        insert_entry(&self.tx, entry, valid)
    }

    /// Add `amount` to `address`, creating its row if needed. A failed
    /// credit leaves neither the balance nor the audit trail changed.
    pub fn credit(
        &mut self,
        entry_id: EntryId,
        address: &Address,
        amount: u64,
    ) -> LedgerResult<AddressId> {
        let sp = self.tx.savepoint()?;
        let address_id = credit(&sp, entry_id, address, amount)?;
        sp.commit()?;
        Ok(address_id)
    }

    /// Subtract `amount` from `address`, with the same all-or-nothing
    /// behavior as [`BlockWriter::credit`]
    pub fn debit(
        &mut self,
        entry_id: EntryId,
        address: &Address,
        amount: u64,
    ) -> LedgerResult<AddressId> {
        let sp = self.tx.savepoint()?;
        let address_id = debit(&sp, entry_id, address, amount)?;
        sp.commit()?;
        Ok(address_id)
    }

    /// Record an accepted entry that moves no balance, such as an issuance
    pub fn apply_entry(&mut self, entry: &EntryRecord) -> LedgerResult<EntryId> {
        let sp = self.tx.savepoint()?;
        let entry_id = insert_entry(&sp, entry, true)?;
        sp.commit()?;
        Ok(entry_id)
    }

    /// Apply a transfer: every debit, then every credit.
    ///
    /// Runs in a savepoint; on any error no part of the entry is kept.
    pub fn apply_transfer(
        &mut self,
        entry: &EntryRecord,
        inputs: &BTreeMap<Address, u64>,
        outputs: &BTreeMap<Address, u64>,
    ) -> LedgerResult<EntryId> {
        let sp = self.tx.savepoint()?;
        let entry_id = insert_entry(&sp, entry, true)?;
        for (address, amount) in inputs {
            debit(&sp, entry_id, address, *amount)?;
        }
        for (address, amount) in outputs {
            credit(&sp, entry_id, address, *amount)?;
        }
        sp.commit()?;
        Ok(entry_id)
    }

    /// Apply a coinbase mint: credit `outputs` and link the coinbase row
    /// as the debited side without changing its balance
    pub fn apply_mint(
        &mut self,
        entry: &EntryRecord,
        outputs: &BTreeMap<Address, u64>,
    ) -> LedgerResult<EntryId> {
        let sp = self.tx.savepoint()?;
        let entry_id = insert_entry(&sp, entry, true)?;
        insert_address_transaction(&sp, COINBASE_ADDRESS_ID, entry_id, false)?;
        for (address, amount) in outputs {
            credit(&sp, entry_id, address, *amount)?;
        }
        sp.commit()?;
        Ok(entry_id)
    }

    /// Record a rejected entry
    pub fn reject(&mut self, entry: &EntryRecord) -> LedgerResult<EntryId> {
        insert_entry(&self.tx, entry, false)
    }

    /// Store the chain metadata alongside this block's writes
    pub fn set_metadata(&mut self, metadata: &ChainMetadata) -> LedgerResult<()> {
        let json = serde_json::to_string(metadata)?;
        self.tx.execute(
            r#"INSERT INTO "metadata" ("id", "chain") VALUES (1, ?1)
               ON CONFLICT("id") DO UPDATE SET "chain" = "excluded"."chain""#,
            [json],
        )?;
        Ok(())
    }
}

fn credit(
    conn: &Connection,
    entry_id: EntryId,
    address: &Address,
    amount: u64,
) -> LedgerResult<AddressId> {
    let id = add_balance(conn, address, amount)?;
    insert_address_transaction(conn, id, entry_id, true)?;
    trace!(%address, amount, "credit");
    Ok(id)
}

fn debit(
    conn: &Connection,
    entry_id: EntryId,
    address: &Address,
    amount: u64,
) -> LedgerResult<AddressId> {
    let id = if amount == 0 {
        add_balance(conn, address, 0)?
    } else {
        sub_balance(conn, address, amount)?
    };
    insert_address_transaction(conn, id, entry_id, false)?;
    trace!(%address, amount, "debit");
    Ok(id)
}

fn add_balance(conn: &Connection, address: &Address, amount: u64) -> LedgerResult<AddressId> {
    let add = to_column(amount)?;
    let current: Option<i64> = conn
        .query_row(
            r#"SELECT "balance" FROM "addresses" WHERE "address" = ?1"#,
            [address.as_bytes().as_slice()],
            |row| row.get(0),
        )
        .optional()?;
    if current.unwrap_or(0).checked_add(add).is_none() {
        return Err(LedgerError::BalanceOverflow(*address));
    }
    conn.execute(
        r#"INSERT INTO "addresses" ("address", "balance") VALUES (?1, ?2)
           ON CONFLICT("address") DO
           UPDATE SET "balance" = "balance" + "excluded"."balance""#,
        params![address.as_bytes().as_slice(), add],
    )?;
    select_address_id(conn, address)?
        .ok_or_else(|| LedgerError::Corrupted(format!("address {address} missing after upsert")))
}

fn sub_balance(conn: &Connection, address: &Address, amount: u64) -> LedgerResult<AddressId> {
    let sub = to_column(amount)?;
    let Some(id) = select_address_id(conn, address)? else {
        return Err(LedgerError::InsufficientBalance(*address));
    };
    let updated = conn.execute(
        r#"UPDATE "addresses" SET "balance" = "balance" - ?1 WHERE "id" = ?2"#,
        params![sub, id],
    );
    match updated {
        Ok(0) => Err(LedgerError::Corrupted(format!(
            "no balance updated for {address}"
        ))),
        Ok(_) => Ok(id),
        Err(err)
            if err.sqlite_error().map(|e| e.extended_code)
                == Some(rusqlite::ffi::SQLITE_CONSTRAINT_CHECK) =>
        {
            Err(LedgerError::InsufficientBalance(*address))
        }
        Err(err) => Err(err.into()),
    }
}

fn insert_entry(conn: &Connection, entry: &EntryRecord, valid: bool) -> LedgerResult<EntryId> {
    if valid {
        let applied: bool = conn.query_row(
            r#"SELECT EXISTS(SELECT 1 FROM "entries" WHERE "hash" = ?1 AND "valid")"#,
            [entry.hash.as_bytes().as_slice()],
            |row| row.get(0),
        )?;
        if applied {
            return Err(LedgerError::Replay(entry.hash));
        }
    }
    conn.execute(
        r#"INSERT INTO "entries" ("hash", "timestamp", "valid") VALUES (?1, ?2, ?3)"#,
        params![entry.hash.as_bytes().as_slice(), entry.timestamp, valid],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_address_transaction(
    conn: &Connection,
    address_id: AddressId,
    entry_id: EntryId,
    to: bool,
) -> LedgerResult<()> {
    conn.execute(
        r#"INSERT INTO "address_transactions" ("address_id", "entry_id", "to") VALUES (?1, ?2, ?3)"#,
        params![address_id, entry_id, to],
    )?;
    Ok(())
}

fn select_address_id(conn: &Connection, address: &Address) -> LedgerResult<Option<AddressId>> {
    Ok(conn
        .query_row(
            r#"SELECT "id" FROM "addresses" WHERE "address" = ?1"#,
            [address.as_bytes().as_slice()],
            |row| row.get(0),
        )
        .optional()?)
}

fn to_column(amount: u64) -> LedgerResult<i64> {
    i64::try_from(amount).map_err(|_| LedgerError::AmountOutOfRange(amount))
}

fn to_amount(value: i64) -> LedgerResult<u64> {
    u64::try_from(value).map_err(|_| LedgerError::Corrupted(format!("negative value {value}")))
}

fn entry_hash_from_blob(blob: &[u8]) -> LedgerResult<EntryHash> {
    <[u8; 32]>::try_from(blob)
        .map(EntryHash::from)
        .map_err(|_| LedgerError::Corrupted(format!("entry hash of {} bytes", blob.len())))
}
