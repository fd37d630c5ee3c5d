//! Signed ledger entries
//!
//! An entry is an immutable record received from the external ledger: a chain
//! identifier, ordered ExtIDs, opaque content, and the commit timestamp the
//! ledger assigned to it. For authorized entries the ExtIDs are laid out as
//!
//! ```text
//! [ timestamp salt, RCD 0, signature 0, RCD 1, signature 1, ... ]
//! ```
//!
//! and signature `i` covers the message returned by [`Entry::signing_message`].

use crate::bytes::{ChainId, EntryHash};
use crate::hash::{entry_hash, sha512_concat};
use crate::rcd::Rcd;
use ed25519_dalek::{Signer, SigningKey};

/// Version byte prefixed to the marshaled entry
const ENTRY_VERSION: u8 = 0;

/// Largest encoded ExtIDs section, length prefixes included. Every length in
/// the marshaled entry is a `u16`.
pub const MAX_EXT_IDS_SIZE: usize = u16::MAX as usize;

/// An entry as delivered by the block source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Chain the entry belongs to
    pub chain_id: ChainId,
    /// External identifiers
    pub ext_ids: Vec<Vec<u8>>,
    /// Opaque payload
    pub content: Vec<u8>,
    /// Commit time in Unix seconds, assigned by the external ledger
    pub timestamp: i64,
}

impl Entry {
    /// Create an entry
    pub fn new(chain_id: ChainId, ext_ids: Vec<Vec<u8>>, content: Vec<u8>, timestamp: i64) -> Self {
        Self {
            chain_id,
            ext_ids,
            content,
            timestamp,
        }
    }

    /// Whether the ExtIDs fit the marshaled layout. Entries that fail this
    /// have no faithful binary encoding and must be treated as malformed.
    pub fn is_well_formed(&self) -> bool {
        self.ext_ids_size() <= MAX_EXT_IDS_SIZE
    }

    /// Binary encoding of the entry used for content addressing.
    ///
    /// `version ‖ chain_id ‖ u16be(ext_ids_size) ‖ (u16be(len) ‖ ext_id)* ‖ content`
    ///
    /// Lengths of an entry that is not [well formed](Entry::is_well_formed)
    /// saturate at `u16::MAX`, so such an entry does not round-trip and its
    /// hash identifies nothing.
    pub fn marshal(&self) -> Vec<u8> {
        let ext_ids_size = self.ext_ids_size();
        let mut data = Vec::with_capacity(1 + 32 + 2 + ext_ids_size + self.content.len());
        data.push(ENTRY_VERSION);
        data.extend_from_slice(self.chain_id.as_bytes());
        data.extend_from_slice(&length_prefix(ext_ids_size));
        for ext_id in &self.ext_ids {
            data.extend_from_slice(&length_prefix(ext_id.len()));
            data.extend_from_slice(ext_id);
        }
        data.extend_from_slice(&self.content);
        data
    }

    fn ext_ids_size(&self) -> usize {
        self.ext_ids.iter().map(|id| 2 + id.len()).sum()
    }

    /// Content-addressed identifier of this entry
    pub fn hash(&self) -> EntryHash {
        EntryHash::new(entry_hash(&self.marshal()))
    }

    /// Message signed by the RCD/signature pair at `index` (0-based).
    ///
    /// `SHA-512(ascii_decimal(index) ‖ salt ‖ chain_id ‖ content)`. The pair
    /// index is part of the message so a signature only verifies at the
    /// position it was produced for.
    pub fn signing_message(&self, index: usize, salt: &[u8]) -> [u8; 64] {
        let index = index.to_string();
        sha512_concat(&[
            index.as_bytes(),
            salt,
            self.chain_id.as_bytes(),
            &self.content,
        ])
    }

    /// Replace the ExtIDs with a timestamp salt and one RCD/signature pair per
    /// key, in order. The salt is the entry's own timestamp.
    pub fn sign(&mut self, keys: &[SigningKey]) {
        let salt = self.timestamp.to_string().into_bytes();
        let mut ext_ids = Vec::with_capacity(1 + 2 * keys.len());
        ext_ids.push(salt.clone());
        for (index, key) in keys.iter().enumerate() {
            let rcd = Rcd::from_public_key(&key.verifying_key().to_bytes());
            let message = self.signing_message(index, &salt);
            ext_ids.push(rcd.as_bytes().to_vec());
            ext_ids.push(key.sign(&message).to_bytes().to_vec());
        }
        self.ext_ids = ext_ids;
    }
}

fn length_prefix(len: usize) -> [u8; 2] {
    u16::try_from(len).unwrap_or(u16::MAX).to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::Bytes32;

    fn entry() -> Entry {
        Entry::new(
            Bytes32([3u8; 32]),
            vec![b"a".to_vec(), b"bc".to_vec()],
            b"content".to_vec(),
            1_600_000_000,
        )
    }

    #[test]
    fn marshal_layout() {
        let data = entry().marshal();
        assert_eq!(data[0], 0);
        assert_eq!(&data[1..33], &[3u8; 32]);
        // two ExtIDs: 2 + 1 and 2 + 2 bytes
        assert_eq!(&data[33..35], &7u16.to_be_bytes());
        assert_eq!(&data[35..37], &1u16.to_be_bytes());
        assert_eq!(data[37], b'a');
        assert!(data.ends_with(b"content"));
    }

    #[test]
    fn oversized_ext_ids_are_not_well_formed() {
        assert!(entry().is_well_formed());

        let mut largest = entry();
        largest.ext_ids = vec![vec![0u8; MAX_EXT_IDS_SIZE - 2]];
        assert!(largest.is_well_formed());

        let mut single = entry();
        single.ext_ids = vec![vec![0u8; MAX_EXT_IDS_SIZE + 1]];
        assert!(!single.is_well_formed());

        let mut total = entry();
        total.ext_ids = vec![vec![0u8; 40_000], vec![0u8; 40_000]];
        assert!(!total.is_well_formed());
    }

    #[test]
    fn hash_changes_with_content() {
        let a = entry();
        let mut b = entry();
        b.content.push(0);
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.hash(), entry().hash());
    }

    #[test]
    fn sign_lays_out_ext_ids() {
        let mut e = entry();
        let keys = [SigningKey::from_bytes(&[1u8; 32]), SigningKey::from_bytes(&[2u8; 32])];
        e.sign(&keys);
        assert_eq!(e.ext_ids.len(), 5);
        assert_eq!(e.ext_ids[0], b"1600000000".to_vec());
        assert_eq!(e.ext_ids[1].len(), 33);
        assert_eq!(e.ext_ids[2].len(), 64);
    }

    #[test]
    fn signing_message_binds_index() {
        let e = entry();
        assert_ne!(e.signing_message(0, b"1"), e.signing_message(1, b"1"));
    }
}
