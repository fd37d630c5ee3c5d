//! Generic ExtIDs authorization for signed entries
//!
//! An entry authorized by `n` signers carries exactly `1 + 2n` ExtIDs: the
//! timestamp salt followed by `n` RCD/signature pairs. Validation is
//! all-or-nothing and has no side effects.

use crate::errors::ExtIdsError;
use tally_core::{validate_rcd, Address, Entry};

/// Maximum distance in seconds between the salt and the entry's commit time
pub const SALT_WINDOW_SECS: u64 = 12 * 60 * 60;

/// Parse an ASCII decimal timestamp salt
pub fn parse_salt(salt: &[u8]) -> Result<i64, ExtIdsError> {
    String::from_utf8_lossy(salt)
        .parse::<i64>()
        .map_err(ExtIdsError::SaltFormat)
}

/// Validate the ExtIDs of `entry` for `signers` required authorizers.
///
/// Returns the derived signer addresses in pair order.
pub fn validate_ext_ids(entry: &Entry, signers: usize) -> Result<Vec<Address>, ExtIdsError> {
    let expected = 1 + 2 * signers;
    if entry.ext_ids.len() != expected {
        return Err(ExtIdsError::InvalidCount {
            expected,
            actual: entry.ext_ids.len(),
        });
    }

    let salt_bytes = &entry.ext_ids[0];
    let salt = parse_salt(salt_bytes)?;
    if salt.abs_diff(entry.timestamp) > SALT_WINDOW_SECS {
        return Err(ExtIdsError::SaltExpired {
            salt,
            timestamp: entry.timestamp,
        });
    }

    let mut addresses = Vec::with_capacity(signers);
    for index in 0..signers {
        let rcd_position = 1 + 2 * index;
        let rcd = &entry.ext_ids[rcd_position];
        let sig = &entry.ext_ids[rcd_position + 1];
        let message = entry.signing_message(index, salt_bytes);
        let address = validate_rcd(rcd, sig, &message).map_err(|kind| {
            // Format errors point at the pair's RCD, verification failures at its signature.
            let position = match kind {
                tally_core::RcdError::InvalidSignature => rcd_position + 1,
                _ => rcd_position,
            };
            ExtIdsError::Authorization { position, kind }
        })?;
        addresses.push(address);
    }

    tracing::trace!(
        chain = %entry.chain_id,
        signers,
        "entry ExtIDs authorized"
    );
    Ok(addresses)
}
