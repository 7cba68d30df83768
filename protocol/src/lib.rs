// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Goody Ledger: Core Library
//!
//! A ledger of fungible "goodies": claims of a given product (NOUGAT,
//! TOFFEE...) minted by an issuer and owned by a party. Goodies of the same
//! product from different issuers are *not* interchangeable; the ledger
//! keeps them in separate states forever.
//!
//! ## Architecture
//!
//! ```text
//!             issue / transfer / exit
//!                       |
//!                 +-----v-----+      reserve      +-------------+
//!                 |   flows   |------------------>|    vault    |
//!                 +-----+-----+   (selection)     +------^------+
//!        verify   |     |  sign        finalise          | record
//!   +----------+  |  +--v-------+   +------------+       |
//!   | contract |<-+  | services |   |  services  |-------+
//!   +----------+     |  signer  |   |   notary   |
//!                    +----------+   +------------+
//! ```
//!
//! - **asset**: Tokens, issued tokens and amounts.
//! - **contract**: Goody states, commands and the conservation verifier.
//! - **selection**: The fungible selector, deciding which states pay for a request.
//! - **transaction**: Building, identifying and signing transitions.
//! - **vault**: The unspent-state index with soft-lock reservations.
//! - **services**: Signature and finality collaborators.
//! - **flows**: The orchestrator tying the above together.
//! - **identity** / **crypto** / **config**: The supporting cast.
//!
//! ## Ground Rules
//!
//! 1. Value is conserved per issued token, on every transition.
//! 2. A state is spent at most once.
//! 3. Nothing is committed unless every required party signed.

pub mod asset;
pub mod config;
pub mod contract;
pub mod crypto;
pub mod flows;
pub mod identity;
pub mod selection;
pub mod services;
pub mod transaction;
pub mod vault;
