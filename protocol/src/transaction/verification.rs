//! Full verification of a signed transaction.
//!
//! [`verify_transaction`] is what a notary runs before committing. The
//! checks go from cheapest to most expensive so clearly malformed
//! transactions fail before any signature is checked.

use std::collections::BTreeSet;
use thiserror::Error;

use super::signing::{SignatureError, SignedTransaction};
use super::types::TxId;
use crate::config::{TRANSACTION_VERSION, MAX_TX_INPUTS, MAX_TX_OUTPUTS};
use crate::contract::{Rejection, StateRef};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("transaction ID mismatch: expected {expected}, got {actual}")]
    IdMismatch { expected: TxId, actual: TxId },

    #[error("unsupported transaction version {0}")]
    UnsupportedVersion(u16),

    #[error("too many inputs: {count} (max {max})")]
    TooManyInputs { count: usize, max: usize },

    #[error("too many outputs: {count} (max {max})")]
    TooManyOutputs { count: usize, max: usize },

    #[error("input {0} appears more than once")]
    DuplicateInput(StateRef),

    #[error("input {state_ref} is guarded by notary {input_notary}, transaction names {tx_notary}")]
    NotaryMismatch {
        state_ref: StateRef,
        input_notary: String,
        tx_notary: String,
    },

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("contract rejected transaction: {0}")]
    Contract(#[from] Rejection),
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Verifies a signed transaction:
///
/// 1. **Version** is the current one.
/// 2. **Limits** on input and output counts.
/// 3. **No duplicate inputs.**
/// 4. **Single notary**: every input is guarded by the transaction's notary.
/// 5. **Id integrity**: `id == double_sha256(signable_bytes)`.
/// 6. **Signatures** all verify and cover every required key.
/// 7. **Contract**: the conservation verifier, with the actual signer set.
pub fn verify_transaction(stx: &SignedTransaction) -> Result<(), TransactionError> {
    let tx = &stx.tx;

    if tx.version != TRANSACTION_VERSION {
        return Err(TransactionError::UnsupportedVersion(tx.version));
    }

    if tx.inputs.len() > MAX_TX_INPUTS {
        return Err(TransactionError::TooManyInputs {
            count: tx.inputs.len(),
            max: MAX_TX_INPUTS,
        });
    }
    if tx.outputs.len() > MAX_TX_OUTPUTS {
        return Err(TransactionError::TooManyOutputs {
            count: tx.outputs.len(),
            max: MAX_TX_OUTPUTS,
        });
    }

    let mut seen = BTreeSet::new();
    for input in &tx.inputs {
        if !seen.insert(input.state_ref) {
            return Err(TransactionError::DuplicateInput(input.state_ref));
        }
        if input.notary != tx.notary {
            return Err(TransactionError::NotaryMismatch {
                state_ref: input.state_ref,
                input_notary: input.notary.to_string(),
                tx_notary: tx.notary.to_string(),
            });
        }
    }

    let expected = tx.compute_id();
    if tx.id != expected {
        return Err(TransactionError::IdMismatch {
            expected,
            actual: tx.id,
        });
    }

    stx.verify_required_signatures()?;
    tx.verify(&stx.signers())?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
