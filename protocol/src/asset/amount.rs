//! # Amounts
//!
//! `Amount<T>` is a non-negative quantity of some token `T`. The two
//! instantiations that matter are:
//!
//! - `Amount<Token>`: "500 NOUGAT", issuer-agnostic. Used in requests.
//! - `Amount<IssuedToken>`: "500 NOUGAT issued by X/01". Carried by states.
//!
//! Arithmetic is only defined between amounts of the same token. The
//! operator impls (`+`, `-`) panic on a token mismatch or an underflow
//! because both are bugs in the caller; `checked_add` / `checked_sub`
//! report the same conditions as [`AmountError`] instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Sub};
use std::str::FromStr;
use thiserror::Error;

use super::token::{IssuedToken, Token};
use crate::identity::PartyAndReference;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Arithmetic errors between amounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("token mismatch: {left} vs {right}")]
    TokenMismatch { left: String, right: String },

    #[error("amount overflow: {left} + {right}")]
    Overflow { left: u64, right: u64 },

    #[error("amount underflow: {left} - {right}")]
    Underflow { left: u64, right: u64 },
}

/// The text form of an amount could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountParseError {
    #[error("expected '<quantity> <token>', got '{0}'")]
    Malformed(String),

    #[error("invalid quantity '{0}'")]
    InvalidQuantity(String),
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount<T> {
    pub quantity: u64,
    pub token: T,
}

impl<T> Amount<T> {
    pub fn new(quantity: u64, token: T) -> Self {
        Self { quantity, token }
    }

    pub fn zero(token: T) -> Self {
        Self { quantity: 0, token }
    }

    pub fn is_zero(&self) -> bool {
        self.quantity == 0
    }
}

impl<T: Clone + PartialEq + fmt::Display> Amount<T> {
    pub fn checked_add(&self, other: &Amount<T>) -> Result<Amount<T>, AmountError> {
        self.require_same_token(other)?;
        let quantity =
            self.quantity
                .checked_add(other.quantity)
                .ok_or(AmountError::Overflow {
                    left: self.quantity,
                    right: other.quantity,
                })?;
        Ok(Amount::new(quantity, self.token.clone()))
    }

    pub fn checked_sub(&self, other: &Amount<T>) -> Result<Amount<T>, AmountError> {
        self.require_same_token(other)?;
        let quantity =
            self.quantity
                .checked_sub(other.quantity)
                .ok_or(AmountError::Underflow {
                    left: self.quantity,
                    right: other.quantity,
                })?;
        Ok(Amount::new(quantity, self.token.clone()))
    }

    /// Splits into `parts` amounts that sum back to exactly `self`. The
    /// remainder of the division goes one unit at a time to the leading
    /// parts, so `10 / 3` becomes `[4, 3, 3]`.
    ///
    /// # Panics
    ///
    /// If `parts` is zero.
    pub fn split_evenly(&self, parts: usize) -> Vec<Amount<T>> {
        assert!(parts > 0, "cannot split an amount into zero parts");
        let parts_u64 = parts as u64;
        let base = self.quantity / parts_u64;
        let remainder = self.quantity % parts_u64;
        (0..parts_u64)
            .map(|i| {
                let extra = if i < remainder { 1 } else { 0 };
                Amount::new(base + extra, self.token.clone())
            })
            .collect()
    }

    /// Sums `amounts`, returning `None` for an empty iterator. All amounts
    /// must share one token.
    pub fn sum_or_none<'a, I>(amounts: I) -> Option<Result<Amount<T>, AmountError>>
    where
        I: IntoIterator<Item = &'a Amount<T>>,
        T: 'a,
    {
        let mut iter = amounts.into_iter();
        let first = iter.next()?.clone();
        Some(iter.try_fold(first, |acc, next| acc.checked_add(next)))
    }

    /// Sums `amounts`, returning zero of `token` for an empty iterator.
    pub fn sum_or_zero<'a, I>(amounts: I, token: T) -> Result<Amount<T>, AmountError>
    where
        I: IntoIterator<Item = &'a Amount<T>>,
        T: 'a,
    {
        amounts
            .into_iter()
            .try_fold(Amount::zero(token), |acc, next| acc.checked_add(next))
    }

    fn require_same_token(&self, other: &Amount<T>) -> Result<(), AmountError> {
        if self.token != other.token {
            return Err(AmountError::TokenMismatch {
                left: self.token.to_string(),
                right: other.token.to_string(),
            });
        }
        Ok(())
    }
}

impl Amount<Token> {
    /// Attaches an issuer, producing the amount a state would carry.
    pub fn issued_by(&self, issuer: PartyAndReference) -> Amount<IssuedToken> {
        Amount::new(self.quantity, self.token.issued_by(issuer))
    }
}

impl Amount<IssuedToken> {
    /// Drops the issuer, keeping only the product.
    pub fn without_issuer(&self) -> Amount<Token> {
        Amount::new(self.quantity, self.token.product.clone())
    }
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

impl<T: Clone + PartialEq + fmt::Display> Add for Amount<T> {
    type Output = Amount<T>;

    fn add(self, other: Amount<T>) -> Amount<T> {
        match self.checked_add(&other) {
            Ok(sum) => sum,
            Err(e) => panic!("{}", e),
        }
    }
}

impl<T: Clone + PartialEq + fmt::Display> Sub for Amount<T> {
    type Output = Amount<T>;

    fn sub(self, other: Amount<T>) -> Amount<T> {
        match self.checked_sub(&other) {
            Ok(diff) => diff,
            Err(e) => panic!("{}", e),
        }
    }
}

impl<T> Add<u64> for Amount<T> {
    type Output = Amount<T>;

    fn add(self, other: u64) -> Amount<T> {
        let quantity = self
            .quantity
            .checked_add(other)
            .unwrap_or_else(|| panic!("amount overflow: {} + {}", self.quantity, other));
        Amount::new(quantity, self.token)
    }
}

impl<T> Sub<u64> for Amount<T> {
    type Output = Amount<T>;

    fn sub(self, other: u64) -> Amount<T> {
        let quantity = self
            .quantity
            .checked_sub(other)
            .unwrap_or_else(|| panic!("amount underflow: {} - {}", self.quantity, other));
        Amount::new(quantity, self.token)
    }
}

/// Truncating division.
impl<T> Div<u64> for Amount<T> {
    type Output = Amount<T>;

    fn div(self, divisor: u64) -> Amount<T> {
        Amount::new(self.quantity / divisor, self.token)
    }
}

// ---------------------------------------------------------------------------
// Formatting & parsing
// ---------------------------------------------------------------------------

impl<T: fmt::Display> fmt::Display for Amount<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.quantity, self.token)
    }
}

impl<T: fmt::Display> fmt::Debug for Amount<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({} {})", self.quantity, self.token)
    }
}

impl FromStr for Amount<Token> {
    type Err = AmountParseError;

    /// Parses `"12345 Nougat"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (quantity, token) = s
            .trim()
            .split_once(char::is_whitespace)
            .ok_or_else(|| AmountParseError::Malformed(s.to_string()))?;
        let token = token.trim();
        if token.is_empty() {
            return Err(AmountParseError::Malformed(s.to_string()));
        }
        let quantity = quantity
            .parse::<u64>()
            .map_err(|_| AmountParseError::InvalidQuantity(quantity.to_string()))?;
        Ok(Amount::new(quantity, Token::new(token)))
    }
}

/// Serde adapter for `Amount<Token>` fields in request/response bodies.
///
/// Serialises as `"12345 NOUGAT"`; deserialises from that string or from
/// the object form `{"quantity": 12345, "token": {"type": "Nougat"}}`.
///
/// ```ignore
/// #[derive(Deserialize)]
/// struct IssueRequest {
///     #[serde(with = "goody_protocol::asset::amount_string")]
///     candy: Amount<Token>,
/// }
/// ```
pub mod amount_string {
    use super::{Amount, Token};
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum AmountForm {
        Text(String),
        Object { quantity: u64, token: Token },
    }

    pub fn serialize<S: Serializer>(amount: &Amount<Token>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(amount)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount<Token>, D::Error> {
        match AmountForm::deserialize(deserializer)? {
            AmountForm::Text(s) => s.parse().map_err(serde::de::Error::custom),
            AmountForm::Object { quantity, token } => Ok(Amount::new(quantity, token)),
        }
    }
}
