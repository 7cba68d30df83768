//! The state index interface and its reservation primitives.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::contract::{StateAndRef, StateRef};
use crate::identity::Party;
use crate::selection::{InsufficientFunds, SelectionPlan, SelectionRequest};
use crate::transaction::{SignedTransaction, TxId};

// ---------------------------------------------------------------------------
// LockId
// ---------------------------------------------------------------------------

/// Identifies one soft-lock reservation: the set of states a single
/// in-flight transition has claimed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LockId(Uuid);

impl LockId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LockId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LockId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Query & errors
// ---------------------------------------------------------------------------

/// Which unspent states a selection may draw from.
#[derive(Debug, Clone)]
pub struct UnspentQuery {
    pub owner: Party,
    /// Restrict to states minted by this party (any reference).
    pub issued_by: Option<Party>,
    /// Restrict to states guarded by this notary. When `None`, the notary
    /// of the first eligible state is used, so a plan never spans notaries.
    pub notary: Option<Party>,
}

impl UnspentQuery {
    pub fn owned_by(owner: Party) -> Self {
        Self {
            owner,
            issued_by: None,
            notary: None,
        }
    }

    pub fn issued_by(mut self, issuer: Party) -> Self {
        self.issued_by = Some(issuer);
        self
    }

    pub fn notary(mut self, notary: Party) -> Self {
        self.notary = Some(notary);
        self
    }

    pub fn matches(&self, candidate: &StateAndRef) -> bool {
        candidate.state.owner == self.owner
            && self
                .issued_by
                .as_ref()
                .map_or(true, |issuer| candidate.state.is_issued_by(issuer))
            && self
                .notary
                .as_ref()
                .map_or(true, |notary| &candidate.notary == notary)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VaultError {
    #[error("transaction {0} is already recorded")]
    AlreadyRecorded(TxId),

    #[error("input {0} is not an unspent state")]
    UnknownInput(StateRef),

    #[error("input {0} does not match the recorded state")]
    InputMismatch(StateRef),
}

// ---------------------------------------------------------------------------
// StateIndex
// ---------------------------------------------------------------------------

/// The unspent-state index the flows query and reserve against.
///
/// Implementations must make [`StateIndex::reserve`] atomic: the states it
/// selects are invisible to every other `reserve` and to
/// [`StateIndex::unspent_owned_by`] until released or consumed.
pub trait StateIndex: Send + Sync {
    /// Unreserved unspent states owned by `owner`.
    fn unspent_owned_by(&self, owner: &Party) -> Vec<StateAndRef>;

    /// Unreserved unspent states minted by `issuer`, whoever owns them.
    fn unspent_issued_by(&self, issuer: &Party) -> Vec<StateAndRef>;

    /// Every unspent state owned by `owner`, reserved or not.
    fn holdings(&self, owner: &Party) -> Vec<StateAndRef>;

    /// Selects from the states matching `query` to cover `request` and
    /// reserves the chosen inputs under `lock_id`, in one atomic step.
    fn reserve(
        &self,
        lock_id: LockId,
        query: &UnspentQuery,
        request: &SelectionRequest,
    ) -> Result<SelectionPlan, InsufficientFunds>;

    /// Drops every reservation held by `lock_id`. Returns how many states
    /// became available again.
    fn release(&self, lock_id: LockId) -> usize;

    /// Records a finalised transaction: its inputs are spent, its outputs
    /// become unspent, and any reservations on its inputs are dropped.
    ///
    /// Every input must be unspent and carry exactly the state and notary
    /// recorded under its ref; otherwise nothing changes.
    fn record(&self, stx: &SignedTransaction) -> Result<(), VaultError>;

    /// The outputs of a recorded transaction, or `None` if it was never
    /// recorded.
    fn transaction_outputs(&self, tx_id: &TxId) -> Option<Vec<StateAndRef>>;
}

// ---------------------------------------------------------------------------
// ReservationGuard
// ---------------------------------------------------------------------------

/// Holds a reservation for the duration of one transition attempt and
/// releases it when dropped, unless the attempt hands it off with
/// [`ReservationGuard::keep`].
pub struct ReservationGuard {
    index: Arc<dyn StateIndex>,
    lock_id: LockId,
    armed: bool,
}

impl ReservationGuard {
    pub fn new(index: Arc<dyn StateIndex>, lock_id: LockId) -> Self {
        Self {
            index,
            lock_id,
            armed: true,
        }
    }

    pub fn lock_id(&self) -> LockId {
        self.lock_id
    }

    /// Keeps the reservation alive past this guard and returns its id.
    /// The caller becomes responsible for releasing it.
    pub fn keep(mut self) -> LockId {
        self.armed = false;
        self.lock_id
    }

    /// Releases now, returning how many states were freed.
    pub fn release(mut self) -> usize {
        self.armed = false;
        self.index.release(self.lock_id)
    }
}

impl Drop for ReservationGuard {
    fn drop(&mut self) {
        if self.armed {
            let freed = self.index.release(self.lock_id);
            if freed > 0 {
                tracing::debug!(lock_id = %self.lock_id, freed, "released reservation");
            }
        }
    }
}

impl fmt::Debug for ReservationGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReservationGuard")
            .field("lock_id", &self.lock_id)
            .field("armed", &self.armed)
            .finish()
    }
}
