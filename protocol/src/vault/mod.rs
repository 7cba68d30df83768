//! # Vault Module: Unspent-State Index & Soft Locks
//!
//! The vault is where goodies live between transitions. It answers "what
//! can this party spend?" and makes sure two concurrent flows never get
//! the same answer.
//!
//! ## Architecture
//!
//! ```text
//! index.rs - StateIndex trait, UnspentQuery, LockId, ReservationGuard
//! memory.rs - InMemoryVault: the in-process StateIndex
//! ```
//!
//! ## Reservation lifecycle
//!
//! 1. **Reserve**: [`StateIndex::reserve`] selects and locks inputs under a
//!    fresh [`LockId`] in one atomic step.
//! 2. **Release**: on any failure before finality, the flow's
//!    [`ReservationGuard`] drops and the states become available again.
//! 3. **Consume**: on finality, [`StateIndex::record`] spends the inputs,
//!    which also clears their reservations.
//!
//! An indeterminate finality outcome keeps the reservation. The caller
//! reconciles against [`StateIndex::transaction_outputs`] before anything
//! is released.

pub mod index;
pub mod memory;

pub use index::{LockId, ReservationGuard, StateIndex, UnspentQuery, VaultError};
pub use memory::InMemoryVault;
