//! Block processing across the life of a token chain

#![allow(clippy::expect_used, clippy::unwrap_used, missing_docs)]

mod common;

use assert_matches::assert_matches;
use common::{address_of, keys, shared_source, TokenChain, NOW};
use tally_core::{Bytes32, Entry};
use tally_ledger::{ledger_file_name, ChainMetadata, ChainStatus, ChainStore, SqliteChainStore};
use tally_node::{
    Block, BlockOutcome, BlockProcessor, NodeConfig, ProcessError, TrackingPolicy,
    CHAIN_STORE_FILE,
};
use tally_token::Issuance;

// ============================================================================
// Classification
// ============================================================================

#[test]
fn chain_with_foreign_first_entry_is_ignored_for_good() {
    let source = shared_source();
    let mut token = TokenChain::new(&source, "test", 1);
    let processor = BlockProcessor::in_memory(source.clone());
    let chain = token.chain_id;

    let first = Entry::new(chain, vec![b"not".to_vec(), b"a token".to_vec()], vec![], NOW);
    assert_eq!(
        processor
            .process_block(&chain, &Block::new(0, vec![first], true))
            .unwrap(),
        BlockOutcome::Ignored
    );

    // Later blocks only move the height, whatever they carry
    let issuance = token.issuance(-1);
    assert_eq!(
        processor
            .process_block(&chain, &Block::new(1, vec![issuance], false))
            .unwrap(),
        BlockOutcome::Ignored
    );

    let meta = processor.chain_metadata(&chain).unwrap();
    assert!(meta.is_ignored());
    assert_eq!(meta.height, Some(1));
    assert!(processor.ledger(&chain).unwrap().is_none());
}

#[test]
fn name_ids_for_a_different_chain_are_ignored() {
    let source = shared_source();
    let token = TokenChain::new(&source, "test", 2);
    let processor = BlockProcessor::in_memory(source.clone());
    let elsewhere = Bytes32([0x42; 32]);

    let first = Entry::new(elsewhere, token.tags.to_ext_ids(), vec![], NOW);
    let outcome = processor
        .process_block(&elsewhere, &Block::new(0, vec![first], true))
        .unwrap();
    assert_eq!(outcome, BlockOutcome::Ignored);
}

#[test]
fn unclassified_chain_seen_mid_stream_is_ignored() {
    let source = shared_source();
    let mut token = TokenChain::new(&source, "test", 3);
    let processor = BlockProcessor::in_memory(source.clone());
    let chain = token.chain_id;

    let block = token.genesis(-1);
    let late = Block::new(9, block.entries, false);
    assert_eq!(
        processor.process_block(&chain, &late).unwrap(),
        BlockOutcome::Ignored
    );
    assert!(processor.chain_metadata(&chain).unwrap().is_ignored());
}

#[test]
fn policy_lists_gate_tracking() {
    let source = shared_source();
    let mut listed = TokenChain::new(&source, "listed", 4);
    let mut other = TokenChain::new(&source, "other", 5);

    let whitelist_only = BlockProcessor::in_memory(source.clone())
        .with_policy(TrackingPolicy::new([listed.chain_id], []));
    let block = listed.genesis(-1);
    let outcome = whitelist_only
        .process_block(&listed.chain_id, &block)
        .unwrap();
    assert_matches!(outcome, BlockOutcome::Processed { applied: 1, rejected: 0 });
    let block = other.genesis(-1);
    assert_eq!(
        whitelist_only
            .process_block(&other.chain_id, &block)
            .unwrap(),
        BlockOutcome::Ignored
    );

    let blacklisted = BlockProcessor::in_memory(source.clone())
        .with_policy(TrackingPolicy::new([listed.chain_id], [listed.chain_id]));
    let block = listed.genesis(-1);
    assert_eq!(
        blacklisted
            .process_block(&listed.chain_id, &block)
            .unwrap(),
        BlockOutcome::Ignored
    );
}

#[test]
fn unknown_issuer_identity_fails_the_block() {
    let source = shared_source();
    let processor = BlockProcessor::in_memory(source.clone());
    let tags = tally_token::TokenNameIds::new("orphan", Bytes32([0xee; 32]));
    let chain = tags.chain_id();

    let first = Entry::new(chain, tags.to_ext_ids(), vec![], NOW);
    let err = processor
        .process_block(&chain, &Block::new(0, vec![first], true))
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(processor.chain_metadata(&chain).unwrap().height, None);
}

// ============================================================================
// Token lifecycle
// ============================================================================

#[test]
fn issuance_mint_and_transfer() {
    let source = shared_source();
    let mut token = TokenChain::new(&source, "test", 10);
    let processor = BlockProcessor::in_memory(source.clone());
    let chain = token.chain_id;
    let holders = keys(2, 99);
    let (alice, bob) = (address_of(&holders[0]), address_of(&holders[1]));

    assert_matches!(
        processor.process_block(&chain, &token.genesis(1_000)).unwrap(),
        BlockOutcome::Processed { applied: 1, rejected: 0 }
    );
    let meta = processor.chain_metadata(&chain).unwrap();
    let tracked = meta.tracked().unwrap();
    assert_eq!(tracked.issuance.as_ref().map(|i| i.supply), Some(1_000));
    assert_eq!(tracked.issued, 0);

    let mint = token.mint(alice, 100);
    processor
        .process_block(&chain, &Block::new(1, vec![mint], false))
        .unwrap();
    let transfer = token.transfer(&holders[0], bob, 40);
    assert_matches!(
        processor
            .process_block(&chain, &Block::new(2, vec![transfer], false))
            .unwrap(),
        BlockOutcome::Processed { applied: 1, rejected: 0 }
    );

    let ledger = processor.ledger(&chain).unwrap().unwrap();
    assert_eq!(ledger.balance(&alice).unwrap(), 60);
    assert_eq!(ledger.balance(&bob).unwrap(), 40);
    assert_eq!(ledger.address_count(false).unwrap(), 2);

    let meta = processor.chain_metadata(&chain).unwrap();
    assert_eq!(meta.height, Some(2));
    assert_eq!(meta.tracked().unwrap().issued, 100);
}

#[test]
fn bad_issuances_are_rejected_until_a_valid_one() {
    let source = shared_source();
    let mut token = TokenChain::new(&source, "test", 11);
    let processor = BlockProcessor::in_memory(source.clone());
    let chain = token.chain_id;
    let impostor = keys(1, 12).remove(0);

    let forged = token.signed(Issuance::new(-1).encode().unwrap(), &[impostor]);
    let issuer = token.issuer.clone();
    let zero_supply = token.signed(br#"{"type":"FAT-0","supply":0}"#.to_vec(), &[issuer]);
    let valid = token.issuance(500);
    let block = Block::new(0, vec![token.name_entry(), forged, zero_supply, valid], true);

    assert_matches!(
        processor.process_block(&chain, &block).unwrap(),
        BlockOutcome::Processed { applied: 1, rejected: 2 }
    );
    let meta = processor.chain_metadata(&chain).unwrap();
    assert_eq!(meta.tracked().unwrap().issuance.as_ref().unwrap().supply, 500);
}

#[test]
fn rejected_entries_still_advance_the_height() {
    let source = shared_source();
    let mut token = TokenChain::new(&source, "test", 20);
    let processor = BlockProcessor::in_memory(source.clone());
    let chain = token.chain_id;
    let holders = keys(2, 21);
    let (alice, bob) = (address_of(&holders[0]), address_of(&holders[1]));

    processor.process_block(&chain, &token.genesis(150)).unwrap();

    let mint = token.mint(alice, 100);
    let overspend = token.transfer(&holders[0], bob, 150);
    let spend = token.transfer(&holders[0], bob, 100);
    let over_supply = token.mint(bob, 51);
    let block = Block::new(1, vec![mint, overspend.clone(), spend, over_supply], false);
    assert_matches!(
        processor.process_block(&chain, &block).unwrap(),
        BlockOutcome::Processed { applied: 2, rejected: 2 }
    );

    let ledger = processor.ledger(&chain).unwrap().unwrap();
    assert_eq!(ledger.balance(&alice).unwrap(), 0);
    assert_eq!(ledger.balance(&bob).unwrap(), 100);
    assert_eq!(ledger.entry_status(&overspend.hash()).unwrap(), Some(false));

    let meta = processor.chain_metadata(&chain).unwrap();
    assert_eq!(meta.height, Some(1));
    assert_eq!(meta.tracked().unwrap().issued, 100);
}

#[test]
fn unsigned_and_cross_chain_entries_are_rejected() {
    let source = shared_source();
    let mut token = TokenChain::new(&source, "test", 30);
    let mut sibling = TokenChain::new(&source, "sibling", 31);
    let processor = BlockProcessor::in_memory(source.clone());
    let chain = token.chain_id;
    let holder = keys(1, 32).remove(0);

    processor.process_block(&chain, &token.genesis(-1)).unwrap();

    let mut unsigned = token.mint(address_of(&holder), 10);
    unsigned.ext_ids.truncate(1);
    let foreign = sibling.mint(address_of(&holder), 10);
    let block = Block::new(1, vec![unsigned, foreign], false);
    assert_matches!(
        processor.process_block(&chain, &block).unwrap(),
        BlockOutcome::Processed { applied: 0, rejected: 2 }
    );
    let ledger = processor.ledger(&chain).unwrap().unwrap();
    assert_eq!(ledger.balance(&address_of(&holder)).unwrap(), 0);
}

#[test]
fn replayed_entry_is_rejected() {
    let source = shared_source();
    let mut token = TokenChain::new(&source, "test", 40);
    let processor = BlockProcessor::in_memory(source.clone());
    let chain = token.chain_id;
    let holder = address_of(&keys(1, 41).remove(0));

    processor.process_block(&chain, &token.genesis(-1)).unwrap();
    let mint = token.mint(holder, 25);
    processor
        .process_block(&chain, &Block::new(1, vec![mint.clone()], false))
        .unwrap();
    assert_matches!(
        processor
            .process_block(&chain, &Block::new(2, vec![mint], false))
            .unwrap(),
        BlockOutcome::Processed { applied: 0, rejected: 1 }
    );

    let ledger = processor.ledger(&chain).unwrap().unwrap();
    assert_eq!(ledger.balance(&holder).unwrap(), 25);
}

// ============================================================================
// Sequencing
// ============================================================================

#[test]
fn covered_heights_are_skipped() {
    let source = shared_source();
    let mut token = TokenChain::new(&source, "test", 50);
    let processor = BlockProcessor::in_memory(source.clone());
    let chain = token.chain_id;
    let holder = address_of(&keys(1, 51).remove(0));

    processor.process_block(&chain, &token.genesis(-1)).unwrap();
    let mint = token.mint(holder, 5);
    let block = Block::new(5, vec![mint], false);
    processor.process_block(&chain, &block).unwrap();

    assert_eq!(
        processor.process_block(&chain, &block).unwrap(),
        BlockOutcome::Skipped
    );
    let older = Block::new(3, vec![token.mint(holder, 5)], false);
    assert_eq!(
        processor.process_block(&chain, &older).unwrap(),
        BlockOutcome::Skipped
    );

    let ledger = processor.ledger(&chain).unwrap().unwrap();
    assert_eq!(ledger.balance(&holder).unwrap(), 5);
    assert_eq!(processor.chain_metadata(&chain).unwrap().height, Some(5));
}

#[test]
fn unpopulated_block_records_nothing() {
    let source = shared_source();
    let mut token = TokenChain::new(&source, "test", 60);
    let processor = BlockProcessor::in_memory(source.clone());
    let chain = token.chain_id;
    let holder = address_of(&keys(1, 61).remove(0));

    processor.process_block(&chain, &token.genesis(-1)).unwrap();
    let mint = token.mint(holder, 7);
    let pending = Block::unpopulated(1, vec![mint.hash()], false);

    let err = processor.process_block(&chain, &pending).unwrap_err();
    assert_matches!(err, ProcessError::IncompleteData { height: 1, .. });
    assert!(err.is_retryable());
    assert_eq!(processor.chain_metadata(&chain).unwrap().height, Some(0));

    let fetched = Block::new(1, vec![mint], false);
    processor.process_block(&chain, &fetched).unwrap();
    let ledger = processor.ledger(&chain).unwrap().unwrap();
    assert_eq!(ledger.balance(&holder).unwrap(), 7);
}

#[test]
fn entry_with_oversized_ext_ids_is_never_applied() {
    let source = shared_source();
    let mut token = TokenChain::new(&source, "test", 62);
    let processor = BlockProcessor::in_memory(source.clone());
    let chain = token.chain_id;
    let holder = address_of(&keys(1, 63).remove(0));

    processor.process_block(&chain, &token.genesis(-1)).unwrap();
    let mut mint = token.mint(holder, 7);
    mint.ext_ids.push(vec![0u8; tally_core::MAX_EXT_IDS_SIZE]);

    let err = processor
        .process_block(&chain, &Block::new(1, vec![mint], false))
        .unwrap_err();
    assert_matches!(err, ProcessError::IncompleteData { height: 1, .. });
    assert_eq!(processor.chain_metadata(&chain).unwrap().height, Some(0));
    let ledger = processor.ledger(&chain).unwrap().unwrap();
    assert_eq!(ledger.balance(&holder).unwrap(), 0);
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn state_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = NodeConfig {
        db_dir: Some(dir.path().join("db")),
        ..NodeConfig::default()
    };
    let source = shared_source();
    let mut token = TokenChain::new(&source, "test", 70);
    let chain = token.chain_id;
    let holder = address_of(&keys(1, 71).remove(0));

    {
        let processor = BlockProcessor::from_config(&config, source.clone()).unwrap();
        processor.process_block(&chain, &token.genesis(-1)).unwrap();
        let mint = token.mint(holder, 9);
        processor
            .process_block(&chain, &Block::new(1, vec![mint], false))
            .unwrap();
    }

    let processor = BlockProcessor::from_config(&config, source.clone()).unwrap();
    let meta = processor.chain_metadata(&chain).unwrap();
    assert_eq!(meta.height, Some(1));
    assert_matches!(meta.status, ChainStatus::Tracked(_));
    let ledger = processor.ledger(&chain).unwrap().unwrap();
    assert_eq!(ledger.balance(&holder).unwrap(), 9);
}

#[test]
fn ledger_commit_wins_over_a_lagging_chain_store() {
    let dir = tempfile::tempdir().unwrap();
    let db_dir = dir.path().join("db");
    let config = NodeConfig {
        db_dir: Some(db_dir.clone()),
        ..NodeConfig::default()
    };
    let source = shared_source();
    let mut token = TokenChain::new(&source, "test", 80);
    let chain = token.chain_id;
    let holder = address_of(&keys(1, 81).remove(0));

    {
        let processor = BlockProcessor::from_config(&config, source.clone()).unwrap();
        processor.process_block(&chain, &token.genesis(-1)).unwrap();
        let mint = token.mint(holder, 3);
        processor
            .process_block(&chain, &Block::new(1, vec![mint], false))
            .unwrap();
    }

    // Simulate a crash between the ledger commit and the chain store write
    let store = SqliteChainStore::open(db_dir.join(CHAIN_STORE_FILE)).unwrap();
    let mut stale = store.load(&chain).unwrap().unwrap();
    stale.height = Some(0);
    store.save(&stale).unwrap();
    drop(store);

    let processor = BlockProcessor::from_config(&config, source.clone()).unwrap();
    assert_eq!(processor.chain_metadata(&chain).unwrap().height, Some(1));

    let redelivered = Block::new(1, vec![token.mint(holder, 3)], false);
    assert_eq!(
        processor.process_block(&chain, &redelivered).unwrap(),
        BlockOutcome::Skipped
    );
    let ledger = processor.ledger(&chain).unwrap().unwrap();
    assert_eq!(ledger.balance(&holder).unwrap(), 3);
}

#[test]
fn corrupted_ledger_halts_the_chain_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let db_dir = dir.path().join("db");
    let config = NodeConfig {
        db_dir: Some(db_dir.clone()),
        ..NodeConfig::default()
    };
    let source = shared_source();
    let mut token = TokenChain::new(&source, "test", 90);
    let chain = token.chain_id;
    let holders = keys(2, 91);
    let (alice, bob) = (address_of(&holders[0]), address_of(&holders[1]));

    {
        let processor = BlockProcessor::from_config(&config, source.clone()).unwrap();
        processor.process_block(&chain, &token.genesis(-1)).unwrap();
        let mint = token.mint(alice, 9);
        processor
            .process_block(&chain, &Block::new(1, vec![mint], false))
            .unwrap();
    }

    // Balance updates silently stop taking effect
    let conn = rusqlite::Connection::open(db_dir.join(ledger_file_name(&chain))).unwrap();
    conn.execute_batch(
        r#"CREATE TRIGGER "freeze" BEFORE UPDATE ON "addresses"
           BEGIN SELECT RAISE(IGNORE); END;"#,
    )
    .unwrap();
    drop(conn);

    {
        let processor = BlockProcessor::from_config(&config, source.clone()).unwrap();
        let transfer = token.transfer(&holders[0], bob, 4);
        let err = processor
            .process_block(&chain, &Block::new(2, vec![transfer], false))
            .unwrap_err();
        assert_matches!(err, ProcessError::Ledger(ref e) if e.is_corruption());
        assert!(processor.is_halted(&chain).unwrap());

        let mint = token.mint(bob, 1);
        assert_matches!(
            processor.process_block(&chain, &Block::new(3, vec![mint], false)),
            Err(ProcessError::ChainHalted(id)) if id == chain
        );
    }

    let processor = BlockProcessor::from_config(&config, source.clone()).unwrap();
    assert!(processor.is_halted(&chain).unwrap());
    let mint = token.mint(bob, 1);
    assert_matches!(
        processor.process_block(&chain, &Block::new(3, vec![mint], false)),
        Err(ProcessError::ChainHalted(_))
    );
    let meta = processor.chain_metadata(&chain).unwrap();
    assert!(meta.halted);
    assert_eq!(meta.height, Some(1));
    let ledger = processor.ledger(&chain).unwrap().unwrap();
    assert_eq!(ledger.balance(&alice).unwrap(), 9);
    assert_eq!(ledger.balance(&bob).unwrap(), 0);
}

#[test]
fn ignored_chains_are_remembered_without_a_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let config = NodeConfig {
        db_dir: Some(dir.path().to_path_buf()),
        ..NodeConfig::default()
    };
    let source = shared_source();
    let chain = Bytes32([0x17; 32]);

    {
        let processor = BlockProcessor::from_config(&config, source.clone()).unwrap();
        let first = Entry::new(chain, vec![b"plain".to_vec()], vec![], NOW);
        processor
            .process_block(&chain, &Block::new(0, vec![first], true))
            .unwrap();
    }

    let store = SqliteChainStore::open(dir.path().join(CHAIN_STORE_FILE)).unwrap();
    let expected = ChainMetadata {
        height: Some(0),
        status: ChainStatus::Ignored,
        ..ChainMetadata::new(chain)
    };
    assert_eq!(store.load(&chain).unwrap(), Some(expected));
    assert!(!dir.path().join(ledger_file_name(&chain)).exists());
}
