//! Hash functions used for addressing and signing
//!
//! Every digest in the protocol goes through this module so the algorithm
//! choice lives in one place:
//!
//! - **SHA-256d**: address derivation from an RCD
//! - **SHA-512**: signature message digests
//! - **SHA-256(SHA-512(m) ‖ m)**: content-addressed entry hashes
//! - **SHA-256**: chain identifiers from name tags

use sha2::{Digest, Sha256, Sha512};

/// Hash bytes with SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut output = [0u8; 32];
    output.copy_from_slice(&Sha256::digest(data));
    output
}

/// Hash bytes with SHA-256 applied twice.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Hash the concatenation of several byte strings with SHA-512.
pub fn sha512_concat(parts: &[&[u8]]) -> [u8; 64] {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part);
    }
    let mut output = [0u8; 64];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// Content-addressed hash of a marshaled entry: `SHA-256(SHA-512(m) ‖ m)`.
pub fn entry_hash(marshaled: &[u8]) -> [u8; 32] {
    let inner = Sha512::digest(marshaled);
    let mut hasher = Sha256::new();
    hasher.update(inner);
    hasher.update(marshaled);
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}
