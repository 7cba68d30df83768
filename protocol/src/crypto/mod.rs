//! # Cryptographic Primitives
//!
//! Thin, typed wrappers over audited implementations:
//!
//! - **Ed25519** (`ed25519-dalek`) for party keys and transaction signatures.
//! - **SHA-256** (`sha2`) for transaction ids.
//! - **BLAKE3** for party id derivation.
//!
//! Nothing here is hand-rolled.

pub mod hash;
pub mod keys;

pub use hash::{blake3_hash, double_sha256, sha256};
pub use keys::{KeyError, Keypair, PublicKey, Signature};
