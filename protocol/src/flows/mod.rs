//! # Flows: Issue / Transfer / Exit
//!
//! [`GoodyFlows`] drives one party's requests to a finalised transition.
//! Every protocol runs the same linear pipeline:
//!
//! ```text
//! query + select (reserve) -> build -> verify -> sign -> finalise
//! ```
//!
//! Each step short-circuits on failure with a [`FlowError`]. The only
//! suspension points are signature requests and the finality submission.
//! The reservation taken during selection is held by a
//! [`ReservationGuard`], so any early return releases it. The one
//! exception is an indeterminate finality outcome: the reservation is
//! kept and returned inside the error for [`GoodyFlows::reconcile`].

mod error;
mod exit;
mod issue;
mod transfer;

pub use error::{FlowError, PendingTransition};

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::asset::{Amount, Token};
use crate::config::FlowConfig;
use crate::contract::StateAndRef;
use crate::crypto::PublicKey;
use crate::identity::Party;
use crate::services::{FinalityOutcome, FinalityService, SignatureAuthority, SignatureResponse};
use crate::transaction::{SignedTransaction, Transaction, TransactionSignature, TxId};
use crate::vault::{ReservationGuard, StateIndex};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A committed transition and the states it created.
#[derive(Debug, Clone, Serialize)]
pub struct FinalizedTransition {
    pub tx_id: TxId,
    pub transaction: SignedTransaction,
    pub outputs: Vec<StateAndRef>,
    pub finalized_at: DateTime<Utc>,
}

/// What reconciliation found for a pending transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The transition was committed after all.
    Committed(Vec<StateAndRef>),
    /// It was not. Its reservation has been released; retrying is safe.
    NotCommitted,
}

// ---------------------------------------------------------------------------
// GoodyFlows
// ---------------------------------------------------------------------------

pub struct GoodyFlows {
    me: Party,
    index: Arc<dyn StateIndex>,
    signer: Arc<dyn SignatureAuthority>,
    finality: Arc<dyn FinalityService>,
    config: FlowConfig,
}

impl GoodyFlows {
    pub fn new(
        me: Party,
        index: Arc<dyn StateIndex>,
        signer: Arc<dyn SignatureAuthority>,
        finality: Arc<dyn FinalityService>,
        config: FlowConfig,
    ) -> Self {
        Self {
            me,
            index,
            signer,
            finality,
            config,
        }
    }

    pub fn whoami(&self) -> &Party {
        &self.me
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Current holdings per product, summed across issuers. Reserved
    /// states still count: they belong to us until a transition commits.
    pub fn balances(&self, product: Option<&Token>) -> BTreeMap<Token, Amount<Token>> {
        let mut totals: BTreeMap<Token, Amount<Token>> = BTreeMap::new();
        for held in self.index.holdings(&self.me) {
            let token = &held.state.amount.token.product;
            if product.map_or(false, |p| p != token) {
                continue;
            }
            let entry = totals
                .entry(token.clone())
                .or_insert_with(|| Amount::zero(token.clone()));
            entry.quantity = entry.quantity.saturating_add(held.state.amount.quantity);
        }
        totals
    }

    /// Settles a transition whose finality came back indeterminate.
    pub fn reconcile(&self, pending: &PendingTransition) -> Reconciliation {
        let committed = self.index.transaction_outputs(&pending.tx_id);
        if let Some(lock_id) = pending.lock_id {
            self.index.release(lock_id);
        }
        match committed {
            Some(outputs) => {
                info!(tx_id = %pending.tx_id, "reconciled: committed");
                Reconciliation::Committed(outputs)
            }
            None => {
                info!(tx_id = %pending.tx_id, "reconciled: not committed");
                Reconciliation::NotCommitted
            }
        }
    }

    // -----------------------------------------------------------------------
    // Shared pipeline
    // -----------------------------------------------------------------------

    /// Verify, sign and finalise `tx`. `reservation` covers its inputs.
    async fn drive(
        &self,
        tx: Transaction,
        reservation: Option<ReservationGuard>,
    ) -> Result<FinalizedTransition, FlowError> {
        let started = Instant::now();
        let tx_id = tx.id;
        let flow = tx.command.name();

        if tx.inputs.len() > self.config.max_inputs {
            return Err(FlowError::InvalidRequest(format!(
                "transition consumes {} states, limit is {}",
                tx.inputs.len(),
                self.config.max_inputs
            )));
        }
        if tx.outputs.len() > self.config.max_outputs {
            return Err(FlowError::InvalidRequest(format!(
                "transition produces {} states, limit is {}",
                tx.outputs.len(),
                self.config.max_outputs
            )));
        }

        debug!(%tx_id, flow, "VERIFYING");
        let required = tx.required_signers();
        if let Err(rejection) = tx.verify(&required) {
            error!(%tx_id, flow, %rejection, "built an invalid transition");
            return Err(rejection.into());
        }

        debug!(%tx_id, flow, signers = required.len(), "SIGNING");
        let signatures = try_join_all(required.iter().map(|key| self.collect_signature(key, tx_id))).await?;
        let stx = signatures
            .into_iter()
            .fold(SignedTransaction::new(tx), SignedTransaction::with_signature);

        debug!(%tx_id, flow, notary = %stx.tx.notary, "FINALISING");
        let outcome = match tokio::time::timeout(
            self.config.finality_timeout,
            self.finality.submit(stx.clone()),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => FinalityOutcome::Indeterminate(format!(
                "no answer within {:?}",
                self.config.finality_timeout
            )),
        };

        match outcome {
            FinalityOutcome::Finalized(id) => {
                info!(
                    tx_id = %id,
                    flow,
                    outputs = stx.tx.outputs.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "FINALISED"
                );
                Ok(FinalizedTransition {
                    tx_id: id,
                    outputs: stx.tx.output_states(),
                    transaction: stx,
                    finalized_at: Utc::now(),
                })
            }
            FinalityOutcome::Rejected(reason) => {
                warn!(%tx_id, flow, %reason, "finality rejected");
                Err(FlowError::FinalityRejected { tx_id, reason })
            }
            FinalityOutcome::Indeterminate(reason) => {
                let lock_id = reservation.map(ReservationGuard::keep);
                warn!(%tx_id, flow, ?lock_id, %reason, "finality indeterminate, reservation kept");
                Err(FlowError::FinalityIndeterminate(PendingTransition {
                    tx_id,
                    lock_id,
                    reason,
                }))
            }
        }
    }

    async fn collect_signature(
        &self,
        key: &PublicKey,
        tx_id: TxId,
    ) -> Result<TransactionSignature, FlowError> {
        match self.signer.request_signature(key, &tx_id).await {
            SignatureResponse::Signed(sig) if sig.by == *key && sig.is_valid_for(&tx_id) => Ok(sig),
            SignatureResponse::Signed(_) => Err(FlowError::SignatureDeclined {
                signer: *key,
                reason: "returned signature does not verify".into(),
            }),
            SignatureResponse::Declined(reason) => {
                info!(%tx_id, signer = %key, %reason, "signature declined");
                Err(FlowError::SignatureDeclined {
                    signer: *key,
                    reason,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::identity::OpaqueBytes;
    use crate::services::{LocalKeyStore, LocalNotary};
    use crate::vault::InMemoryVault;

    fn setup() -> (GoodyFlows, Arc<InMemoryVault>, Party) {
        let vault = Arc::new(InMemoryVault::new());
        let keys = Arc::new(LocalKeyStore::new());
        let me_kp = Keypair::generate();
        let me = Party::new("Bank", me_kp.public_key());
        keys.insert(me_kp);
        let notary_party = Party::generate("Notary").0;
        let notary = Arc::new(LocalNotary::new(notary_party.clone(), vault.clone()));
        let flows = GoodyFlows::new(me, vault.clone(), keys, notary, FlowConfig::default());
        (flows, vault, notary_party)
    }

    #[tokio::test]
    async fn balances_sum_across_issues() {
        let (flows, _vault, notary) = setup();
        let r = OpaqueBytes::new(vec![1]).unwrap();
        flows.issue(Amount::new(10000, Token::new("Nougat")), r.clone(), notary.clone()).await.unwrap();
        flows.issue(Amount::new(7684, Token::new("Nougat")), r, notary.clone()).await.unwrap();
        flows
            .issue(Amount::new(5, Token::new("Toffee")), OpaqueBytes::new(vec![2]).unwrap(), notary)
            .await
            .unwrap();

        let all = flows.balances(None);
        assert_eq!(all.len(), 2);
        assert_eq!(all[&Token::new("Nougat")].quantity, 17684);

        let only = flows.balances(Some(&Token::new("toffee")));
        assert_eq!(only.len(), 1);
        assert_eq!(only[&Token::new("Toffee")].quantity, 5);
    }

    #[tokio::test]
    async fn reconcile_of_unknown_transaction_is_not_committed() {
        let (flows, _vault, _) = setup();
        let pending = PendingTransition {
            tx_id: TxId::from_bytes([4u8; 32]),
            lock_id: None,
            reason: "test".into(),
        };
        assert_eq!(flows.reconcile(&pending), Reconciliation::NotCommitted);
    }

    #[tokio::test]
    async fn reconcile_finds_committed_outputs() {
        let (flows, _vault, notary) = setup();
        let done = flows
            .issue(Amount::new(3, Token::new("Nougat")), OpaqueBytes::new(vec![1]).unwrap(), notary)
            .await
            .unwrap();
        let pending = PendingTransition {
            tx_id: done.tx_id,
            lock_id: None,
            reason: "test".into(),
        };
        assert_eq!(flows.reconcile(&pending), Reconciliation::Committed(done.outputs));
    }
}
