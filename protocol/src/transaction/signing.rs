//! Transaction signatures.
//!
//! Signers sign the 32-byte [`TxId`], never the transaction body: the id
//! already commits to every field, and a remote signer only needs the
//! digest. A [`SignedTransaction`] is the transaction plus whatever
//! signatures have been gathered so far.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use super::builder::Transaction;
use super::types::TxId;
use crate::crypto::{Keypair, PublicKey, Signature};

/// A signature by `by` over a transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub by: PublicKey,
    pub signature: Signature,
}

impl TransactionSignature {
    pub fn is_valid_for(&self, tx_id: &TxId) -> bool {
        self.by.verify(tx_id.as_bytes(), &self.signature)
    }
}

/// Signs `tx_id` with `keypair`.
pub fn sign_transaction(tx_id: &TxId, keypair: &Keypair) -> TransactionSignature {
    TransactionSignature {
        by: keypair.public_key(),
        signature: keypair.sign(tx_id.as_bytes()),
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature by {key} does not verify against transaction {tx_id}")]
    InvalidSignature { key: PublicKey, tx_id: TxId },

    #[error("missing signatures from {0:?}")]
    Missing(Vec<PublicKey>),
}

// ---------------------------------------------------------------------------
// SignedTransaction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub tx: Transaction,
    pub signatures: Vec<TransactionSignature>,
}

impl SignedTransaction {
    pub fn new(tx: Transaction) -> Self {
        Self {
            tx,
            signatures: Vec::new(),
        }
    }

    pub fn id(&self) -> TxId {
        self.tx.id
    }

    /// Adds a signature, replacing any earlier one by the same key.
    pub fn with_signature(mut self, signature: TransactionSignature) -> Self {
        self.signatures.retain(|s| s.by != signature.by);
        self.signatures.push(signature);
        self
    }

    /// Keys whose signatures verify against this transaction's id.
    pub fn signers(&self) -> BTreeSet<PublicKey> {
        self.signatures
            .iter()
            .filter(|s| s.is_valid_for(&self.tx.id))
            .map(|s| s.by)
            .collect()
    }

    /// Every attached signature must verify.
    pub fn verify_signatures(&self) -> Result<(), SignatureError> {
        match self.signatures.iter().find(|s| !s.is_valid_for(&self.tx.id)) {
            Some(bad) => Err(SignatureError::InvalidSignature {
                key: bad.by,
                tx_id: self.tx.id,
            }),
            None => Ok(()),
        }
    }

    /// Required keys that have not yet signed.
    pub fn missing_signatures(&self) -> BTreeSet<PublicKey> {
        let have = self.signers();
        self.tx
            .required_signers()
            .into_iter()
            .filter(|k| !have.contains(k))
            .collect()
    }

    /// Every signature verifies and every required key has signed.
    pub fn verify_required_signatures(&self) -> Result<(), SignatureError> {
        self.verify_signatures()?;
        let missing = self.missing_signatures();
        if !missing.is_empty() {
            return Err(SignatureError::Missing(missing.into_iter().collect()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{Amount, Token};
    use crate::contract::{Command, GoodyState};
    use crate::identity::{OpaqueBytes, Party};
    use crate::transaction::TransactionBuilder;

    fn issue_tx(bank: &Party, notary: &Party) -> Transaction {
        let amount = Amount::new(100, Token::new("Nougat"))
            .issued_by(bank.reference(OpaqueBytes::new(vec![1]).unwrap()));
        TransactionBuilder::new(notary.clone(), Command::Issue { amount: amount.clone() })
            .output(GoodyState::new(amount, bank.clone()))
            .timestamp(1_700_000_000_000)
            .build()
    }

    #[test]
    fn signature_verifies_against_id() {
        let bank_kp = Keypair::generate();
        let bank = Party::new("Bank", bank_kp.public_key());
        let (notary, _) = Party::generate("Notary");
        let tx = issue_tx(&bank, &notary);

        let sig = sign_transaction(&tx.id, &bank_kp);
        assert!(sig.is_valid_for(&tx.id));
        assert!(!sig.is_valid_for(&TxId::from_bytes([0u8; 32])));
    }

    #[test]
    fn signing_does_not_change_id() {
        let bank_kp = Keypair::generate();
        let bank = Party::new("Bank", bank_kp.public_key());
        let (notary, _) = Party::generate("Notary");
        let tx = issue_tx(&bank, &notary);
        let id = tx.id;

        let stx = SignedTransaction::new(tx).with_signature(sign_transaction(&id, &bank_kp));
        assert_eq!(stx.id(), id);
        assert_eq!(stx.tx.compute_id(), id);
    }

    #[test]
    fn missing_signatures_until_required_key_signs() {
        let bank_kp = Keypair::generate();
        let bank = Party::new("Bank", bank_kp.public_key());
        let (notary, _) = Party::generate("Notary");
        let tx = issue_tx(&bank, &notary);

        let stx = SignedTransaction::new(tx);
        assert_eq!(
            stx.verify_required_signatures(),
            Err(SignatureError::Missing(vec![bank_kp.public_key()]))
        );

        let id = stx.id();
        let stx = stx.with_signature(sign_transaction(&id, &bank_kp));
        assert!(stx.missing_signatures().is_empty());
        assert!(stx.verify_required_signatures().is_ok());
    }

    #[test]
    fn forged_signature_is_rejected() {
        let bank_kp = Keypair::generate();
        let mallory = Keypair::generate();
        let bank = Party::new("Bank", bank_kp.public_key());
        let (notary, _) = Party::generate("Notary");
        let tx = issue_tx(&bank, &notary);
        let id = tx.id;

        let forged = TransactionSignature {
            by: bank_kp.public_key(),
            signature: mallory.sign(id.as_bytes()),
        };
        let stx = SignedTransaction::new(tx).with_signature(forged);
        assert!(stx.signers().is_empty());
        assert!(matches!(
            stx.verify_signatures(),
            Err(SignatureError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn resigning_replaces_previous_signature() {
        let bank_kp = Keypair::generate();
        let bank = Party::new("Bank", bank_kp.public_key());
        let (notary, _) = Party::generate("Notary");
        let tx = issue_tx(&bank, &notary);
        let id = tx.id;

        let stx = SignedTransaction::new(tx)
            .with_signature(sign_transaction(&id, &bank_kp))
            .with_signature(sign_transaction(&id, &bank_kp));
        assert_eq!(stx.signatures.len(), 1);
    }
}
