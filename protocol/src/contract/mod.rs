//! # Contract Module
//!
//! What a goody is on the ledger and what counts as a valid change to the
//! set of goodies.
//!
//! ```text
//! state.rs - GoodyState, StateRef, StateAndRef
//! command.rs - Command: Issue / Move / Exit
//! verify.rs - the conservation verifier and required-signer set
//! ```

pub mod command;
pub mod state;
pub mod verify;

pub use command::Command;
pub use state::{GoodyState, StateAndRef, StateRef};
pub use verify::{required_signers, verify, Rejection};
