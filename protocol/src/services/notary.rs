//! Finality: the authoritative commit-or-reject step.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::contract::StateRef;
use crate::identity::Party;
use crate::transaction::{verify_transaction, SignedTransaction, TxId};
use crate::vault::{StateIndex, VaultError};

/// The three possible answers from a finality service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalityOutcome {
    /// Committed. The outputs now exist in the state index.
    Finalized(TxId),
    /// Refused. Nothing was committed.
    Rejected(String),
    /// The service could not say. The transaction may or may not be committed.
    Indeterminate(String),
}

/// Commits signed transactions and prevents double spends.
#[async_trait]
pub trait FinalityService: Send + Sync {
    async fn submit(&self, stx: SignedTransaction) -> FinalityOutcome;
}

/// Single-node notary over a shared [`StateIndex`].
///
/// Re-verifies every transaction in full, tracks which transaction spent
/// each input, and records accepted transactions into the index while
/// still holding its own lock, so two conflicting submissions can never
/// both commit. Inputs are checked against the states the index holds
/// under their refs, so the verifier's view of what is consumed is the
/// ledger's view. Resubmitting an already-finalised transaction is answered
/// with `Finalized` again.
pub struct LocalNotary {
    identity: Party,
    index: Arc<dyn StateIndex>,
    spent_by: Mutex<HashMap<StateRef, TxId>>,
}

impl LocalNotary {
    pub fn new(identity: Party, index: Arc<dyn StateIndex>) -> Self {
        Self {
            identity,
            index,
            spent_by: Mutex::new(HashMap::new()),
        }
    }

    pub fn identity(&self) -> &Party {
        &self.identity
    }

    fn commit(&self, stx: &SignedTransaction) -> FinalityOutcome {
        let tx = &stx.tx;

        if tx.notary != self.identity {
            return FinalityOutcome::Rejected(format!(
                "addressed to notary {}, not {}",
                tx.notary, self.identity
            ));
        }

        if let Err(e) = verify_transaction(stx) {
            return FinalityOutcome::Rejected(e.to_string());
        }

        let mut spent_by = self.spent_by.lock();

        if let Some(input) = tx.inputs.first() {
            if spent_by.get(&input.state_ref) == Some(&tx.id) {
                return FinalityOutcome::Finalized(tx.id);
            }
        }
        if let Some((state_ref, other)) = tx
            .inputs
            .iter()
            .find_map(|i| spent_by.get(&i.state_ref).map(|other| (i.state_ref, *other)))
        {
            return FinalityOutcome::Rejected(format!(
                "double spend: {} already consumed by {}",
                state_ref, other
            ));
        }

        match self.index.record(stx) {
            Ok(()) => {}
            Err(VaultError::AlreadyRecorded(id)) => return FinalityOutcome::Finalized(id),
            Err(e) => return FinalityOutcome::Rejected(e.to_string()),
        }
        for input in &tx.inputs {
            spent_by.insert(input.state_ref, tx.id);
        }
        FinalityOutcome::Finalized(tx.id)
    }
}

#[async_trait]
impl FinalityService for LocalNotary {
    async fn submit(&self, stx: SignedTransaction) -> FinalityOutcome {
        let outcome = self.commit(&stx);
        match &outcome {
            FinalityOutcome::Finalized(id) => info!(tx_id = %id, notary = %self.identity, "notarised"),
            FinalityOutcome::Rejected(reason) => {
                warn!(tx_id = %stx.id(), notary = %self.identity, %reason, "notarisation rejected")
            }
            FinalityOutcome::Indeterminate(_) => {}
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{Amount, IssuedToken, Token};
    use crate::contract::{Command, GoodyState, StateAndRef};
    use crate::crypto::Keypair;
    use crate::identity::OpaqueBytes;
    use crate::transaction::{sign_transaction, Transaction, TransactionBuilder};
    use crate::vault::InMemoryVault;

    struct World {
        vault: Arc<InMemoryVault>,
        notary: LocalNotary,
        bank_kp: Keypair,
        bank: Party,
        alice: Party,
        bob: Party,
    }

    fn world() -> World {
        let vault = Arc::new(InMemoryVault::new());
        let bank_kp = Keypair::generate();
        World {
            notary: LocalNotary::new(Party::generate("Notary").0, vault.clone()),
            vault,
            bank: Party::new("Bank", bank_kp.public_key()),
            bank_kp,
            alice: Party::generate("Alice").0,
            bob: Party::generate("Bob").0,
        }
    }

    fn nougat(issuer: &Party, q: u64) -> Amount<IssuedToken> {
        Amount::new(q, Token::new("Nougat")).issued_by(issuer.reference(OpaqueBytes::new(vec![1]).unwrap()))
    }

    fn signed(tx: Transaction, kp: &Keypair) -> SignedTransaction {
        let id = tx.id;
        SignedTransaction::new(tx).with_signature(sign_transaction(&id, kp))
    }

    async fn issue(w: &World, q: u64) -> StateAndRef {
        let amount = nougat(&w.bank, q);
        let tx = TransactionBuilder::new(w.notary.identity().clone(), Command::Issue { amount: amount.clone() })
            .output(GoodyState::new(amount, w.bank.clone()))
            .build();
        let outcome = w.notary.submit(signed(tx.clone(), &w.bank_kp)).await;
        assert_eq!(outcome, FinalityOutcome::Finalized(tx.id));
        tx.output_states().remove(0)
    }

    fn pay(w: &World, input: &StateAndRef, to: &Party) -> SignedTransaction {
        let tx = TransactionBuilder::new(w.notary.identity().clone(), Command::Move)
            .input(input.clone())
            .output(input.state.with_new_owner(to.clone()))
            .build();
        signed(tx, &w.bank_kp)
    }

    #[tokio::test]
    async fn finalises_and_records() {
        let w = world();
        let state = issue(&w, 100).await;
        assert!(w.vault.is_unspent(&state.state_ref));
    }

    #[tokio::test]
    async fn rejects_double_spend() {
        let w = world();
        let state = issue(&w, 100).await;

        let first = pay(&w, &state, &w.alice);
        assert_eq!(w.notary.submit(first.clone()).await, FinalityOutcome::Finalized(first.id()));

        let second = pay(&w, &state, &w.bob);
        assert!(matches!(
            w.notary.submit(second).await,
            FinalityOutcome::Rejected(reason) if reason.contains("double spend")
        ));
        assert!(w.vault.unspent_owned_by(&w.bob).is_empty());
    }

    #[tokio::test]
    async fn resubmission_is_idempotent() {
        let w = world();
        let state = issue(&w, 100).await;
        let stx = pay(&w, &state, &w.alice);

        assert_eq!(w.notary.submit(stx.clone()).await, FinalityOutcome::Finalized(stx.id()));
        assert_eq!(w.notary.submit(stx.clone()).await, FinalityOutcome::Finalized(stx.id()));
        assert_eq!(w.vault.unspent_owned_by(&w.alice).len(), 1);
    }

    #[tokio::test]
    async fn rejects_inputs_rewritten_by_the_submitter() {
        let w = world();
        let state = issue(&w, 100).await;
        let (mallory, mallory_kp) = Party::generate("Mallory");

        let mut claimed = state.clone();
        claimed.state.owner = mallory.clone();
        claimed.state.amount.quantity = 1_000_000;
        let tx = TransactionBuilder::new(w.notary.identity().clone(), Command::Move)
            .input(claimed.clone())
            .output(claimed.state.clone())
            .build();

        assert!(matches!(
            w.notary.submit(signed(tx, &mallory_kp)).await,
            FinalityOutcome::Rejected(reason) if reason.contains("does not match")
        ));
        assert!(w.vault.is_unspent(&state.state_ref));
        assert_eq!(w.vault.holdings(&w.bank), vec![state.clone()]);
        assert!(w.vault.holdings(&mallory).is_empty());

        let honest = pay(&w, &state, &w.alice);
        assert_eq!(w.notary.submit(honest.clone()).await, FinalityOutcome::Finalized(honest.id()));
    }

    #[tokio::test]
    async fn rejects_other_notarys_transactions() {
        let w = world();
        let (elsewhere, _) = Party::generate("Elsewhere");
        let amount = nougat(&w.bank, 5);
        let tx = TransactionBuilder::new(elsewhere, Command::Issue { amount: amount.clone() })
            .output(GoodyState::new(amount, w.bank.clone()))
            .build();
        assert!(matches!(
            w.notary.submit(signed(tx, &w.bank_kp)).await,
            FinalityOutcome::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn rejects_unsigned_transactions() {
        let w = world();
        let amount = nougat(&w.bank, 5);
        let tx = TransactionBuilder::new(w.notary.identity().clone(), Command::Issue { amount: amount.clone() })
            .output(GoodyState::new(amount, w.bank.clone()))
            .build();
        assert!(matches!(
            w.notary.submit(SignedTransaction::new(tx)).await,
            FinalityOutcome::Rejected(reason) if reason.contains("missing signatures")
        ));
        assert_eq!(w.vault.unspent_count(), 0);
    }
}
