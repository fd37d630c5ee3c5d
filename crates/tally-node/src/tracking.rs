//! First-block chain classification
//!
//! A chain is classified once, from the ExtIDs of its first entry, and the
//! result never changes. Operator lists are consulted before the tags:
//! a blacklisted chain is always ignored, and once a whitelist is set every
//! chain outside it is ignored too.

use crate::block::BlockSource;
use crate::errors::SourceError;
use std::collections::BTreeSet;
use tally_core::{ChainId, Entry};
use tally_ledger::{ChainStatus, TrackedChain};
use tally_token::TokenNameIds;
use tracing::debug;

/// Operator allow and deny lists
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackingPolicy {
    whitelist: BTreeSet<ChainId>,
    blacklist: BTreeSet<ChainId>,
}

impl TrackingPolicy {
    /// Policy from the two lists; an empty whitelist allows every chain
    pub fn new(
        whitelist: impl IntoIterator<Item = ChainId>,
        blacklist: impl IntoIterator<Item = ChainId>,
    ) -> Self {
        Self {
            whitelist: whitelist.into_iter().collect(),
            blacklist: blacklist.into_iter().collect(),
        }
    }

    /// Whether `chain_id` may be tracked at all
    pub fn allows(&self, chain_id: &ChainId) -> bool {
        if self.blacklist.contains(chain_id) {
            return false;
        }
        self.whitelist.is_empty() || self.whitelist.contains(chain_id)
    }
}

/// Decide the fate of a chain from its first entry.
///
/// Returns `Ignored` unless the policy allows the chain, the ExtIDs match the
/// token naming pattern, and they name this chain. For a tracked chain the
/// issuer address is resolved from the identity chain in the tags.
pub fn classify_chain(
    chain_id: &ChainId,
    first_entry: &Entry,
    policy: &TrackingPolicy,
    source: &dyn BlockSource,
) -> Result<ChainStatus, SourceError> {
    if !policy.allows(chain_id) {
        debug!(chain = %chain_id, "chain excluded by tracking policy");
        return Ok(ChainStatus::Ignored);
    }
    let Some(name_ids) = TokenNameIds::parse(&first_entry.ext_ids) else {
        return Ok(ChainStatus::Ignored);
    };
    if name_ids.chain_id() != *chain_id {
        debug!(chain = %chain_id, "name tags name a different chain");
        return Ok(ChainStatus::Ignored);
    }
    let issuer = source.issuer_key(&name_ids.issuer_chain)?;
    Ok(ChainStatus::Tracked(TrackedChain::new(name_ids, issuer)))
}
