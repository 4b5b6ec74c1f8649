//! Hashing primitives for batch identifiers
//!
//! The registry contract keys records by the keccak-256 digest of the
//! canonical batch identifier string, so the same digest is reproduced here.

use sha3::{Digest, Keccak256};
use constant_time_eq::constant_time_eq;

/// Compute the keccak-256 digest of `data`
///
/// # Arguments
///
/// * `data` - Bytes to hash
///
/// # Returns
///
/// A 32-byte digest, identical to Solidity's `keccak256(bytes(data))`
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);

    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compare two digests in constant time
pub fn digests_equal(a: &[u8; 32], b: &[u8; 32]) -> bool {
    constant_time_eq(a, b)
}
