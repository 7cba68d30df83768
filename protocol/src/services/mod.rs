//! # Services: External Collaborators
//!
//! The orchestrator crosses two boundaries besides the state index, and
//! both are traits so deployments can swap in remote implementations:
//!
//! - [`SignatureAuthority`]: gets a required party to sign a transition
//!   digest, or learns that it declined.
//! - [`FinalityService`]: commits a fully signed transaction, answering
//!   finalized, rejected, or indeterminate.
//!
//! [`LocalKeyStore`] and [`LocalNotary`] are the in-process versions used
//! by the node and the tests.

pub mod notary;
pub mod signer;

pub use notary::{FinalityOutcome, FinalityService, LocalNotary};
pub use signer::{LocalKeyStore, SignatureAuthority, SignatureResponse};
