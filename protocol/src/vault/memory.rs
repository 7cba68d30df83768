//! In-process [`StateIndex`] backed by a single mutex.
//!
//! Every operation takes the same lock, so reserve-after-select is atomic
//! and `record` moves inputs to spent and outputs to unspent in one step.
//! Unspent states are kept in insertion order; the selector relies on that
//! order within each issuer group.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use super::index::{LockId, StateIndex, UnspentQuery, VaultError};
use crate::contract::{StateAndRef, StateRef};
use crate::identity::Party;
use crate::selection::{self, InsufficientFunds, SelectionPlan, SelectionRequest};
use crate::transaction::{SignedTransaction, TxId};

#[derive(Default)]
struct VaultInner {
    /// Insertion sequence -> unspent state.
    unspent: BTreeMap<u64, StateAndRef>,
    positions: HashMap<StateRef, u64>,
    next_seq: u64,
    reservations: HashMap<StateRef, LockId>,
    transactions: HashMap<TxId, Vec<StateAndRef>>,
}

impl VaultInner {
    fn insert(&mut self, state: StateAndRef) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.positions.insert(state.state_ref, seq);
        self.unspent.insert(seq, state);
    }

    fn remove(&mut self, state_ref: &StateRef) -> Option<StateAndRef> {
        let seq = self.positions.remove(state_ref)?;
        self.reservations.remove(state_ref);
        self.unspent.remove(&seq)
    }

    fn unreserved(&self) -> impl Iterator<Item = &StateAndRef> + '_ {
        self.unspent
            .values()
            .filter(|s| !self.reservations.contains_key(&s.state_ref))
    }
}

/// Shared in-memory ledger view. Cheap to wrap in an `Arc` and hand to
/// every party's flows and to the notary.
#[derive(Default)]
pub struct InMemoryVault {
    inner: Mutex<VaultInner>,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unspent states, reserved or not.
    pub fn unspent_count(&self) -> usize {
        self.inner.lock().unspent.len()
    }

    /// Number of states currently reserved.
    pub fn reserved_count(&self) -> usize {
        self.inner.lock().reservations.len()
    }

    pub fn is_unspent(&self, state_ref: &StateRef) -> bool {
        self.inner.lock().positions.contains_key(state_ref)
    }
}

impl StateIndex for InMemoryVault {
    fn unspent_owned_by(&self, owner: &Party) -> Vec<StateAndRef> {
        let inner = self.inner.lock();
        inner
            .unreserved()
            .filter(|s| &s.state.owner == owner)
            .cloned()
            .collect()
    }

    fn unspent_issued_by(&self, issuer: &Party) -> Vec<StateAndRef> {
        let inner = self.inner.lock();
        inner
            .unreserved()
            .filter(|s| s.state.is_issued_by(issuer))
            .cloned()
            .collect()
    }

    fn holdings(&self, owner: &Party) -> Vec<StateAndRef> {
        let inner = self.inner.lock();
        inner
            .unspent
            .values()
            .filter(|s| &s.state.owner == owner)
            .cloned()
            .collect()
    }

    fn reserve(
        &self,
        lock_id: LockId,
        query: &UnspentQuery,
        request: &SelectionRequest,
    ) -> Result<SelectionPlan, InsufficientFunds> {
        let mut inner = self.inner.lock();

        let mut eligible: Vec<StateAndRef> = inner
            .unreserved()
            .filter(|s| query.matches(s) && request.accepts(&s.state.amount.token))
            .cloned()
            .collect();

        if query.notary.is_none() {
            if let Some(notary) = eligible.first().map(|s| s.notary.clone()) {
                eligible.retain(|s| s.notary == notary);
            }
        }

        let plan = selection::select(&eligible, request)?;
        for input in plan.inputs() {
            inner.reservations.insert(input.state_ref, lock_id);
        }

        debug!(
            %lock_id,
            owner = %query.owner,
            request = %request,
            inputs = plan.input_count(),
            "reserved states"
        );
        Ok(plan)
    }

    fn release(&self, lock_id: LockId) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.reservations.len();
        inner.reservations.retain(|_, held_by| *held_by != lock_id);
        before - inner.reservations.len()
    }

    fn record(&self, stx: &SignedTransaction) -> Result<(), VaultError> {
        let tx = &stx.tx;
        let mut inner = self.inner.lock();

        if inner.transactions.contains_key(&tx.id) {
            return Err(VaultError::AlreadyRecorded(tx.id));
        }
        for input in &tx.inputs {
            let recorded = inner
                .positions
                .get(&input.state_ref)
                .and_then(|seq| inner.unspent.get(seq))
                .ok_or(VaultError::UnknownInput(input.state_ref))?;
            if recorded != input {
                return Err(VaultError::InputMismatch(input.state_ref));
            }
        }

        for input in &tx.inputs {
            inner.remove(&input.state_ref);
        }
        let outputs = tx.output_states();
        for output in &outputs {
            inner.insert(output.clone());
        }
        inner.transactions.insert(tx.id, outputs);

        info!(
            tx_id = %tx.id,
            command = tx.command.name(),
            consumed = tx.inputs.len(),
            produced = tx.outputs.len(),
            "recorded transaction"
        );
        Ok(())
    }

    fn transaction_outputs(&self, tx_id: &TxId) -> Option<Vec<StateAndRef>> {
        self.inner.lock().transactions.get(tx_id).cloned()
    }
}
