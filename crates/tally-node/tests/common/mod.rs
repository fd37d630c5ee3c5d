//! Shared fixtures for node integration tests

#![allow(clippy::expect_used, clippy::unwrap_used, missing_docs, dead_code)]

use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;
use std::sync::Arc;
use tally_core::{Address, Bytes32, ChainId, Entry, SigningKey};
use tally_node::{Block, MemoryBlockSource};
use tally_token::{Issuance, TokenNameIds, Transaction};

pub const NOW: i64 = 1_700_000_000;

pub fn keys(count: usize, seed: u64) -> Vec<SigningKey> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    (0..count).map(|_| SigningKey::generate(&mut rng)).collect()
}

pub fn address_of(key: &SigningKey) -> Address {
    Address::from_public_key(&key.verifying_key().to_bytes())
}

/// A token chain with its issuer registered in a shared source
pub struct TokenChain {
    pub tags: TokenNameIds,
    pub chain_id: ChainId,
    pub issuer: SigningKey,
    clock: i64,
}

impl TokenChain {
    pub fn new(source: &MemoryBlockSource, token_id: &str, seed: u64) -> Self {
        let issuer = keys(1, seed).remove(0);
        let identity = Bytes32([u8::try_from(seed % 256).unwrap(); 32]);
        source.insert_identity(identity, address_of(&issuer));
        let tags = TokenNameIds::new(token_id, identity);
        Self {
            chain_id: tags.chain_id(),
            tags,
            issuer,
            clock: NOW,
        }
    }

    fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    pub fn name_entry(&self) -> Entry {
        Entry::new(self.chain_id, self.tags.to_ext_ids(), vec![], NOW)
    }

    pub fn signed(&mut self, content: Vec<u8>, signers: &[SigningKey]) -> Entry {
        let mut entry = Entry::new(self.chain_id, vec![], content, self.tick());
        entry.sign(signers);
        entry
    }

    pub fn issuance(&mut self, supply: i64) -> Entry {
        let content = Issuance::new(supply).with_symbol("TT").encode().unwrap();
        let issuer = self.issuer.clone();
        self.signed(content, &[issuer])
    }

    pub fn mint(&mut self, to: Address, amount: u64) -> Entry {
        let content = Transaction::coinbase([(to, amount)]).encode().unwrap();
        let issuer = self.issuer.clone();
        self.signed(content, &[issuer])
    }

    pub fn transfer(&mut self, from: &SigningKey, to: Address, amount: u64) -> Entry {
        let content = Transaction::new([(address_of(from), amount)], [(to, amount)])
            .encode()
            .unwrap();
        self.signed(content, &[from.clone()])
    }

    /// First block: name entry followed by the issuance
    pub fn genesis(&mut self, supply: i64) -> Block {
        let issuance = self.issuance(supply);
        Block::new(0, vec![self.name_entry(), issuance], true)
    }
}

pub fn shared_source() -> Arc<MemoryBlockSource> {
    Arc::new(MemoryBlockSource::new())
}
