//! The intent declared by a transition.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::state::write_amount;
use crate::asset::{Amount, IssuedToken};

/// What a transition claims to do. The verifier holds it to that claim.
///
/// - `Issue` mints exactly `amount` from nothing.
/// - `Move` only changes ownership; every group balances.
/// - `Exit` burns exactly `amount` from the states it consumes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    Issue { amount: Amount<IssuedToken> },
    Move,
    Exit { amount: Amount<IssuedToken> },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Issue { .. } => "issue",
            Self::Move => "move",
            Self::Exit { .. } => "exit",
        }
    }

    /// The issuer-qualified amount minted or burned, if any.
    pub fn amount(&self) -> Option<&Amount<IssuedToken>> {
        match self {
            Self::Issue { amount } | Self::Exit { amount } => Some(amount),
            Self::Move => None,
        }
    }

    pub(crate) fn write_canonical(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Issue { amount } => {
                buf.push(0x01);
                write_amount(buf, amount);
            }
            Self::Move => buf.push(0x02),
            Self::Exit { amount } => {
                buf.push(0x03);
                write_amount(buf, amount);
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Issue { amount } => write!(f, "Issue({})", amount),
            Self::Move => write!(f, "Move"),
            Self::Exit { amount } => write!(f, "Exit({})", amount),
        }
    }
}
