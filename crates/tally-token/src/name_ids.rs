//! Token chain naming
//!
//! A token chain is recognized by the ExtIDs of its first entry:
//!
//! ```text
//! [ "token", <token id>, "issuer", <issuer identity chain id (32 bytes)> ]
//! ```
//!
//! The chain id itself is derived from those tags, so the pattern fixes both
//! the token's name and the identity that may issue it.

use serde::{Deserialize, Serialize};
use tally_core::hash::sha256;
use tally_core::{Bytes32, ChainId};

const TOKEN_TAG: &[u8] = b"token";
const ISSUER_TAG: &[u8] = b"issuer";

/// Decoded name tags of a token chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenNameIds {
    /// Token identifier chosen by the issuer
    pub token_id: String,
    /// Identity chain whose key authorizes issuance and minting
    pub issuer_chain: ChainId,
}

impl TokenNameIds {
    /// Create name tags
    pub fn new(token_id: impl Into<String>, issuer_chain: ChainId) -> Self {
        Self {
            token_id: token_id.into(),
            issuer_chain,
        }
    }

    /// Match first-entry ExtIDs against the token naming pattern
    pub fn parse(ext_ids: &[Vec<u8>]) -> Option<Self> {
        let [token, token_id, issuer, issuer_chain] = ext_ids else {
            return None;
        };
        if token.as_slice() != TOKEN_TAG || issuer.as_slice() != ISSUER_TAG {
            return None;
        }
        if token_id.is_empty() || issuer_chain.len() != 32 {
            return None;
        }
        let token_id = String::from_utf8(token_id.clone()).ok()?;
        Some(Self {
            token_id,
            issuer_chain: Bytes32::from_slice_padded(issuer_chain),
        })
    }

    /// Encode back into ExtIDs
    pub fn to_ext_ids(&self) -> Vec<Vec<u8>> {
        vec![
            TOKEN_TAG.to_vec(),
            self.token_id.as_bytes().to_vec(),
            ISSUER_TAG.to_vec(),
            self.issuer_chain.as_bytes().to_vec(),
        ]
    }

    /// Chain id these tags name
    pub fn chain_id(&self) -> ChainId {
        chain_id_from_name_ids(&self.to_ext_ids())
    }
}

/// Whether first-entry ExtIDs match the token naming pattern
pub fn is_token_name_ids(ext_ids: &[Vec<u8>]) -> bool {
    TokenNameIds::parse(ext_ids).is_some()
}

/// Chain id named by ExtIDs: SHA-256 over the SHA-256 of each tag
pub fn chain_id_from_name_ids(ext_ids: &[Vec<u8>]) -> ChainId {
    let mut concat = Vec::with_capacity(32 * ext_ids.len());
    for ext_id in ext_ids {
        concat.extend_from_slice(&sha256(ext_id));
    }
    Bytes32::new(sha256(&concat))
}
