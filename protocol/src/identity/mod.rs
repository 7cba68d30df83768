//! # Identity Module
//!
//! Who can own, issue, and sign for goodies.
//!
//! 1. **Party**: a display name bound to an Ed25519 owning key. Equality
//!    and ordering follow the key.
//! 2. **PartyId**: bech32 `goody1...` address derived from the owning key,
//!    the form people paste into transfer requests.
//! 3. **PartyAndReference**: an issuer: a party plus the opaque reference
//!    bytes it minted a batch under.

pub mod party;
pub mod party_id;

pub use party::{OpaqueBytes, Party, PartyAndReference, ReferenceTooLarge};
pub use party_id::{PartyId, PartyIdError};
