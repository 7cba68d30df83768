//! # Conservation Verifier
//!
//! A pure function over a proposed transition. No I/O, no clocks, no
//! suspension: the same inputs always give the same verdict.
//!
//! States are grouped by [`IssuedToken`] across both sides of the
//! transition, and each group is checked against the command:
//!
//! | group                         | rule                                                    |
//! |-------------------------------|---------------------------------------------------------|
//! | the token of `Issue(amount)`  | issuer signs, nothing consumed, produced == amount      |
//! | the token of `Exit(amount)`   | issuer signs, owners sign, consumed - produced == amount |
//! | every other group             | owners sign, consumed == produced                       |
//!
//! On top of the per-group rules the verifier checks global conservation,
//! `consumed + issued == produced + exited`, summed over all groups. The
//! per-group rules imply it; the global check catches a selector that
//! leaks value between groups through some path the per-group rules miss.

use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use super::command::Command;
use super::state::GoodyState;
use crate::asset::IssuedToken;
use crate::crypto::PublicKey;

// ---------------------------------------------------------------------------
// Rejection
// ---------------------------------------------------------------------------

/// Why a transition was refused.
///
/// Rejections are never business outcomes: a correct selector and
/// orchestrator never build a transition that earns one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// A key the transition requires is not among the signers.
    #[error("missing signature from {key}")]
    MissingSignature { key: PublicKey },

    /// A group's consumed and produced totals do not match the command.
    #[error("unbalanced group {token}: consumed {consumed}, produced {produced}, expected difference {expected_delta}")]
    UnbalancedGroup {
        token: String,
        consumed: u64,
        produced: u64,
        expected_delta: i128,
    },

    /// A state or command amount has quantity zero.
    #[error("non-positive amount in {context}")]
    NegativeOrZeroAmount { context: String },

    /// The issuer of an exited group did not sign.
    #[error("exit of {token} not authorised by its issuer")]
    UnauthorizedExit { token: String },

    /// The issuer of an issued group did not sign.
    #[error("issue of {token} not authorised by its issuer")]
    UnauthorizedIssue { token: String },

    /// An issue transition consumes states of the group it mints.
    #[error("issue of {token} must not consume existing states")]
    IssueConsumesStates { token: String },

    /// Totals across all groups do not conserve value.
    #[error("global imbalance: consumed {consumed} + issued {issued} != produced {produced} + exited {exited}")]
    GlobalImbalance {
        consumed: u128,
        produced: u128,
        issued: u128,
        exited: u128,
    },

    /// The transition consumes and produces nothing.
    #[error("transition has no states")]
    EmptyTransition,

    /// Summing a group overflowed `u64`.
    #[error("quantity overflow in group {token}")]
    QuantityOverflow { token: String },
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

#[derive(Default)]
struct GroupTotals<'a> {
    consumed: u64,
    produced: u64,
    owners: BTreeSet<&'a PublicKey>,
}

/// Accepts or rejects a transition consuming `consumed`, producing
/// `produced`, under `command`, signed by `signers`.
pub fn verify(
    consumed: &[GoodyState],
    produced: &[GoodyState],
    command: &Command,
    signers: &BTreeSet<PublicKey>,
) -> Result<(), Rejection> {
    if consumed.is_empty() && produced.is_empty() {
        return Err(Rejection::EmptyTransition);
    }

    if let Some(amount) = command.amount() {
        if amount.is_zero() {
            return Err(Rejection::NegativeOrZeroAmount {
                context: format!("{} command", command.name()),
            });
        }
    }

    let mut groups: BTreeMap<&IssuedToken, GroupTotals<'_>> = BTreeMap::new();

    // The command's own group is always checked, even if no state touches it.
    if let Some(amount) = command.amount() {
        groups.entry(&amount.token).or_default();
    }

    for (side, states) in [("input", consumed), ("output", produced)] {
        for (i, state) in states.iter().enumerate() {
            if state.amount.is_zero() {
                return Err(Rejection::NegativeOrZeroAmount {
                    context: format!("{} {}", side, i),
                });
            }
            let group = groups.entry(&state.amount.token).or_default();
            let total = if side == "input" {
                group.owners.insert(state.owner.owning_key());
                &mut group.consumed
            } else {
                &mut group.produced
            };
            *total = total
                .checked_add(state.amount.quantity)
                .ok_or_else(|| Rejection::QuantityOverflow {
                    token: state.amount.token.to_string(),
                })?;
        }
    }

    for (token, totals) in &groups {
        match command {
            Command::Issue { amount } if &amount.token == *token => {
                verify_issue_group(token, totals, amount.quantity, signers)?
            }
            Command::Exit { amount } if &amount.token == *token => {
                verify_exit_group(token, totals, amount.quantity, signers)?
            }
            _ => verify_move_group(token, totals, signers)?,
        }
    }

    verify_global(&groups, command)
}

fn verify_issue_group(
    token: &IssuedToken,
    totals: &GroupTotals<'_>,
    amount: u64,
    signers: &BTreeSet<PublicKey>,
) -> Result<(), Rejection> {
    if !signers.contains(token.issuer_party().owning_key()) {
        return Err(Rejection::UnauthorizedIssue {
            token: token.to_string(),
        });
    }
    if totals.consumed != 0 {
        return Err(Rejection::IssueConsumesStates {
            token: token.to_string(),
        });
    }
    if totals.produced != amount {
        return Err(unbalanced(token, totals, -(amount as i128)));
    }
    Ok(())
}

fn verify_exit_group(
    token: &IssuedToken,
    totals: &GroupTotals<'_>,
    amount: u64,
    signers: &BTreeSet<PublicKey>,
) -> Result<(), Rejection> {
    if !signers.contains(token.issuer_party().owning_key()) {
        return Err(Rejection::UnauthorizedExit {
            token: token.to_string(),
        });
    }
    require_owner_signatures(totals, signers)?;
    if totals.consumed as i128 - totals.produced as i128 != amount as i128 {
        return Err(unbalanced(token, totals, amount as i128));
    }
    Ok(())
}

fn verify_move_group(
    token: &IssuedToken,
    totals: &GroupTotals<'_>,
    signers: &BTreeSet<PublicKey>,
) -> Result<(), Rejection> {
    require_owner_signatures(totals, signers)?;
    // Both sides must be present; with zero-quantity states already
    // rejected, equal totals guarantee that.
    if totals.consumed != totals.produced {
        return Err(unbalanced(token, totals, 0));
    }
    Ok(())
}

fn verify_global(
    groups: &BTreeMap<&IssuedToken, GroupTotals<'_>>,
    command: &Command,
) -> Result<(), Rejection> {
    let consumed: u128 = groups.values().map(|g| g.consumed as u128).sum();
    let produced: u128 = groups.values().map(|g| g.produced as u128).sum();
    let (issued, exited) = match command {
        Command::Issue { amount } => (amount.quantity as u128, 0),
        Command::Exit { amount } => (0, amount.quantity as u128),
        Command::Move => (0, 0),
    };
    if consumed + issued != produced + exited {
        return Err(Rejection::GlobalImbalance {
            consumed,
            produced,
            issued,
            exited,
        });
    }
    Ok(())
}

fn require_owner_signatures(
    totals: &GroupTotals<'_>,
    signers: &BTreeSet<PublicKey>,
) -> Result<(), Rejection> {
    match totals.owners.iter().find(|key| !signers.contains(**key)) {
        Some(key) => Err(Rejection::MissingSignature { key: **key }),
        None => Ok(()),
    }
}

fn unbalanced(token: &IssuedToken, totals: &GroupTotals<'_>, expected_delta: i128) -> Rejection {
    Rejection::UnbalancedGroup {
        token: token.to_string(),
        consumed: totals.consumed,
        produced: totals.produced,
        expected_delta,
    }
}

/// The keys a transition consuming `consumed` under `command` must carry:
/// every owner of a consumed state, plus the issuer for `Issue`/`Exit`.
pub fn required_signers(consumed: &[GoodyState], command: &Command) -> BTreeSet<PublicKey> {
    let mut keys: BTreeSet<PublicKey> = consumed
        .iter()
        .map(|s| *s.owner.owning_key())
        .collect();
    if let Some(amount) = command.amount() {
        keys.insert(*amount.token.issuer_party().owning_key());
    }
    keys
}
