//! # Asset Module
//!
//! The value types every other module trades in:
//!
//! ```text
//! token.rs - Token (product) and IssuedToken (product + issuer)
//! amount.rs - Amount<T>: quantity arithmetic, splitting, text/JSON forms
//! ```
//!
//! All quantities are `u64` in whole goodies. There are no decimals and
//! no negative amounts.

pub mod amount;
pub mod token;

pub use amount::{amount_string, Amount, AmountError, AmountParseError};
pub use token::{IssuedToken, Token};
