//! # Transaction Module
//!
//! Construction, signing, and verification of goody state transitions.
//!
//! ## Architecture
//!
//! ```text
//! types.rs - TxId
//! builder.rs - Transaction and the fluent TransactionBuilder
//! signing.rs - TransactionSignature, SignedTransaction
//! verification.rs - structural + signature + contract checks for notaries
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Build**: [`TransactionBuilder`] assembles notary, command, inputs, outputs.
//! 2. **Verify**: the orchestrator runs the contract with the required signer set.
//! 3. **Sign**: each required party signs the [`TxId`].
//! 4. **Finalise**: the notary runs [`verify_transaction`] and commits.
//!
//! Transaction ids are `double_sha256` of the canonical bytes, excluding
//! signatures, so the id is known before anyone signs.

pub mod builder;
pub mod signing;
pub mod types;
pub mod verification;

pub use builder::{Transaction, TransactionBuilder};
pub use signing::{sign_transaction, SignatureError, SignedTransaction, TransactionSignature};
pub use types::TxId;
pub use verification::{verify_transaction, TransactionError};
