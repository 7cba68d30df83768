//! # Hashing Utilities
//!
//! Two hash functions, two jobs:
//!
//! - **double SHA-256** names transactions. The id of a transaction is
//!   `hex(SHA-256(SHA-256(canonical bytes)))` and doubles as the digest
//!   every required signer signs.
//! - **BLAKE3** derives party ids from owning keys.

use sha2::{Digest, Sha256};

/// SHA-256 of `data` as a fixed-size array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// `SHA-256(SHA-256(data))`.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// BLAKE3 of `data`.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // SHA-256("abc")
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn double_sha256_differs_from_single() {
        assert_ne!(sha256(b"goody"), double_sha256(b"goody"));
        assert_eq!(double_sha256(b"goody"), sha256(&sha256(b"goody")));
    }

    #[test]
    fn blake3_is_deterministic() {
        assert_eq!(blake3_hash(b"nougat"), blake3_hash(b"nougat"));
        assert_ne!(blake3_hash(b"nougat"), blake3_hash(b"toffee"));
    }
}
