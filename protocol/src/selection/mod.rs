//! # Fungible Selector
//!
//! Turns "pay 500 NOUGAT" into a concrete set of inputs and outputs.
//!
//! ## Algorithm
//!
//! 1. Keep only states whose token the request accepts: same product for
//!    an issuer-agnostic request, same product *and* issuer for an
//!    issuer-specific one.
//! 2. Partition them into groups by [`IssuedToken`]. Groups are walked in
//!    `IssuedToken` order (issuer, then product); states within a group
//!    keep the order they were supplied in. The same snapshot always
//!    yields the same plan.
//! 3. Greedily take whole states from the current group until either the
//!    group is exhausted or the remaining request is covered. Whatever the
//!    taken states hold beyond what the group contributes is that group's
//!    change.
//! 4. Move to the next group while anything remains.
//! 5. If every eligible group is exhausted and the request is still not
//!    covered, fail with [`InsufficientFunds`]. No partial plan is returned.
//!
//! The plan never merges groups: each touched group yields at most one
//! payment output and at most one change output. A recipient paid from two
//! issuers receives two states.
//!
//! Nothing here performs I/O. The vault runs [`select`] under its own lock
//! so selection and reservation are atomic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::asset::{Amount, IssuedToken, Token};
use crate::contract::{GoodyState, StateAndRef};
use crate::identity::Party;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// What is being asked for. The two modes are distinct types so a caller
/// cannot accidentally drop an issuer constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionRequest {
    /// Any issuer of this product will do.
    AnyIssuer(Amount<Token>),
    /// Only goodies of exactly this issued token.
    Issued(Amount<IssuedToken>),
}

impl SelectionRequest {
    pub fn quantity(&self) -> u64 {
        match self {
            Self::AnyIssuer(a) => a.quantity,
            Self::Issued(a) => a.quantity,
        }
    }

    pub fn product(&self) -> &Token {
        match self {
            Self::AnyIssuer(a) => &a.token,
            Self::Issued(a) => &a.token.product,
        }
    }

    /// `true` if a state of `token` can contribute to this request.
    pub fn accepts(&self, token: &IssuedToken) -> bool {
        match self {
            Self::AnyIssuer(a) => token.product == a.token,
            Self::Issued(a) => *token == a.token,
        }
    }
}

impl From<Amount<Token>> for SelectionRequest {
    fn from(amount: Amount<Token>) -> Self {
        Self::AnyIssuer(amount)
    }
}

impl From<Amount<IssuedToken>> for SelectionRequest {
    fn from(amount: Amount<IssuedToken>) -> Self {
        Self::Issued(amount)
    }
}

impl fmt::Display for SelectionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnyIssuer(a) => write!(f, "{}", a),
            Self::Issued(a) => write!(f, "{}", a),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// The eligible holdings do not cover the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("insufficient funds: requested {requested} {product}, available {available}")]
pub struct InsufficientFunds {
    pub product: Token,
    pub requested: u64,
    pub available: u64,
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// What one issuer group contributes to the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSelection {
    pub token: IssuedToken,
    /// Consumed states, in selection order.
    pub inputs: Vec<StateAndRef>,
    /// The part of the request this group satisfies.
    pub contribution: u64,
    /// Consumed value beyond `contribution`; returned to the change owner.
    pub change: u64,
}

impl GroupSelection {
    pub fn consumed(&self) -> u64 {
        self.contribution + self.change
    }

    /// Outputs for this group: one for the contribution if `recipient` is
    /// given (none for an exit), one for change if there is any. Zero
    /// quantities are never materialised.
    pub fn outputs(&self, recipient: Option<&Party>, change_owner: &Party) -> Vec<GoodyState> {
        let mut out = Vec::with_capacity(2);
        if let Some(recipient) = recipient {
            if self.contribution > 0 {
                out.push(GoodyState::new(
                    Amount::new(self.contribution, self.token.clone()),
                    recipient.clone(),
                ));
            }
        }
        if self.change > 0 {
            out.push(GoodyState::new(
                Amount::new(self.change, self.token.clone()),
                change_owner.clone(),
            ));
        }
        out
    }
}

/// The full result of a selection, one entry per touched group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPlan {
    pub groups: Vec<GroupSelection>,
}

impl SelectionPlan {
    pub fn inputs(&self) -> Vec<StateAndRef> {
        self.groups
            .iter()
            .flat_map(|g| g.inputs.iter().cloned())
            .collect()
    }

    pub fn input_count(&self) -> usize {
        self.groups.iter().map(|g| g.inputs.len()).sum()
    }

    pub fn outputs(&self, recipient: Option<&Party>, change_owner: &Party) -> Vec<GoodyState> {
        self.groups
            .iter()
            .flat_map(|g| g.outputs(recipient, change_owner))
            .collect()
    }

    pub fn total_contribution(&self) -> u64 {
        self.groups.iter().map(|g| g.contribution).sum()
    }

    pub fn total_change(&self) -> u64 {
        self.groups.iter().map(|g| g.change).sum()
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Selects from `available` to cover `request`.
///
/// `available` must already be restricted to states the requester may
/// spend (owned by them, unreserved, one notary).
pub fn select(
    available: &[StateAndRef],
    request: &SelectionRequest,
) -> Result<SelectionPlan, InsufficientFunds> {
    let mut groups: BTreeMap<&IssuedToken, Vec<&StateAndRef>> = BTreeMap::new();
    for candidate in available {
        let token = &candidate.state.amount.token;
        if request.accepts(token) && !candidate.state.amount.is_zero() {
            groups.entry(token).or_default().push(candidate);
        }
    }

    let requested = request.quantity();
    let mut remaining = requested;
    let mut plan = Vec::new();

    for (token, states) in &groups {
        if remaining == 0 {
            break;
        }

        let mut taken = Vec::new();
        let mut consumed: u64 = 0;
        for state in states {
            if consumed >= remaining {
                break;
            }
            consumed = consumed.saturating_add(state.state.amount.quantity);
            taken.push((*state).clone());
        }

        let contribution = consumed.min(remaining);
        remaining -= contribution;
        plan.push(GroupSelection {
            token: (*token).clone(),
            inputs: taken,
            contribution,
            change: consumed - contribution,
        });
    }

    if remaining > 0 {
        let available_total = groups
            .values()
            .flatten()
            .fold(0u64, |acc, s| acc.saturating_add(s.state.amount.quantity));
        return Err(InsufficientFunds {
            product: request.product().clone(),
            requested,
            available: available_total,
        });
    }

    Ok(SelectionPlan { groups: plan })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::StateRef;
    use crate::identity::OpaqueBytes;
    use crate::transaction::TxId;

    struct Fixture {
        x: Party,
        y: Party,
        alice: Party,
        bob: Party,
        notary: Party,
        next: u32,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                x: Party::generate("Issuer X").0,
                y: Party::generate("Issuer Y").0,
                alice: Party::generate("Alice").0,
                bob: Party::generate("Bob").0,
                notary: Party::generate("Notary").0,
                next: 0,
            }
        }

        fn token(&self, issuer: &Party, product: &str) -> IssuedToken {
            Token::new(product).issued_by(issuer.reference(OpaqueBytes::new(vec![1]).unwrap()))
        }

        fn held(&mut self, issuer: &Party, product: &str, q: u64) -> StateAndRef {
            self.next += 1;
            StateAndRef {
                state: GoodyState::new(Amount::new(q, self.token(issuer, product)), self.alice.clone()),
                notary: self.notary.clone(),
                state_ref: StateRef::new(TxId::from_bytes([1u8; 32]), self.next),
            }
        }
    }

    fn nougat(q: u64) -> SelectionRequest {
        Amount::new(q, Token::new("Nougat")).into()
    }

    #[test]
    fn exact_single_state_has_no_change() {
        let mut f = Fixture::new();
        let x = f.x.clone();
        let available = vec![f.held(&x, "Nougat", 7684)];

        let plan = select(&available, &nougat(7684)).unwrap();
        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.total_change(), 0);

        let outputs = plan.outputs(Some(&f.bob), &f.alice);
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].owner, f.bob);
        assert_eq!(outputs[0].amount.quantity, 7684);
    }

    #[test]
    fn partial_spend_produces_change() {
        let mut f = Fixture::new();
        let x = f.x.clone();
        let available = vec![f.held(&x, "Nougat", 7684)];

        let plan = select(&available, &nougat(7684 / 3)).unwrap();
        let outputs = plan.outputs(Some(&f.bob), &f.alice);
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].amount.quantity, 2561);
        assert_eq!(outputs[0].owner, f.bob);
        assert_eq!(outputs[1].amount.quantity, 5123);
        assert_eq!(outputs[1].owner, f.alice);
    }

    #[test]
    fn same_issuer_states_merge_into_one_payment() {
        let mut f = Fixture::new();
        let x = f.x.clone();
        let available = vec![f.held(&x, "Nougat", 10000), f.held(&x, "Nougat", 7684)];

        let plan = select(&available, &nougat(17684)).unwrap();
        assert_eq!(plan.input_count(), 2);
        let outputs = plan.outputs(Some(&f.bob), &f.alice);
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].amount.quantity, 17684);
    }

    #[test]
    fn greedy_stops_once_covered() {
        let mut f = Fixture::new();
        let x = f.x.clone();
        let available = vec![
            f.held(&x, "Nougat", 30),
            f.held(&x, "Nougat", 30),
            f.held(&x, "Nougat", 30),
        ];

        let plan = select(&available, &nougat(45)).unwrap();
        assert_eq!(plan.input_count(), 2);
        assert_eq!(plan.groups[0].contribution, 45);
        assert_eq!(plan.groups[0].change, 15);
        // Insertion order within a group is kept.
        assert_eq!(plan.inputs()[0].state_ref, available[0].state_ref);
    }

    #[test]
    fn issuers_are_never_merged() {
        let mut f = Fixture::new();
        let (x, y) = (f.x.clone(), f.y.clone());
        let available = vec![f.held(&x, "Nougat", 7684), f.held(&y, "Nougat", 963)];

        let plan = select(&available, &nougat(7684 + 963)).unwrap();
        assert_eq!(plan.groups.len(), 2);
        let outputs = plan.outputs(Some(&f.bob), &f.alice);
        assert_eq!(outputs.len(), 2);
        assert!(outputs.iter().all(|o| o.owner == f.bob));
        let mut quantities: Vec<u64> = outputs.iter().map(|o| o.amount.quantity).collect();
        quantities.sort();
        assert_eq!(quantities, vec![963, 7684]);
        assert_ne!(outputs[0].amount.token, outputs[1].amount.token);
    }

    #[test]
    fn groups_are_walked_in_issuer_order() {
        let mut f = Fixture::new();
        let (x, y) = (f.x.clone(), f.y.clone());
        let available = vec![f.held(&y, "Nougat", 100), f.held(&x, "Nougat", 100)];

        let first = f.token(&x, "Nougat").min(f.token(&y, "Nougat"));
        let plan = select(&available, &nougat(50)).unwrap();
        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.groups[0].token, first);

        let reversed: Vec<_> = available.iter().rev().cloned().collect();
        assert_eq!(select(&reversed, &nougat(50)).unwrap().groups[0].token, first);
    }

    #[test]
    fn issuer_specific_request_ignores_other_issuers() {
        let mut f = Fixture::new();
        let (x, y) = (f.x.clone(), f.y.clone());
        let available = vec![f.held(&x, "Nougat", 100), f.held(&y, "Nougat", 100)];

        let request = SelectionRequest::Issued(Amount::new(150, f.token(&y, "Nougat")));
        let err = select(&available, &request).unwrap_err();
        assert_eq!(err.requested, 150);
        assert_eq!(err.available, 100);

        let request = SelectionRequest::Issued(Amount::new(80, f.token(&y, "Nougat")));
        let plan = select(&available, &request).unwrap();
        assert_eq!(plan.groups[0].token, f.token(&y, "Nougat"));
    }

    #[test]
    fn wrong_product_is_insufficient() {
        let mut f = Fixture::new();
        let x = f.x.clone();
        let available = vec![f.held(&x, "Nougat", 100)];

        let toffee: SelectionRequest = Amount::new(1, Token::new("Toffee")).into();
        let err = select(&available, &toffee).unwrap_err();
        assert_eq!(err.available, 0);
        assert_eq!(err.product, Token::new("Toffee"));
    }

    #[test]
    fn one_more_than_held_is_insufficient() {
        let mut f = Fixture::new();
        let (x, y) = (f.x.clone(), f.y.clone());
        let available = vec![f.held(&x, "Nougat", 7684), f.held(&y, "Nougat", 963)];

        let err = select(&available, &nougat(7684 + 963 + 1)).unwrap_err();
        assert_eq!(err.available, 7684 + 963);
    }

    #[test]
    fn exit_plan_has_only_change() {
        let mut f = Fixture::new();
        let x = f.x.clone();
        let available = vec![f.held(&x, "Nougat", 7684)];

        let plan = select(&available, &nougat(5123)).unwrap();
        let outputs = plan.outputs(None, &f.alice);
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].amount.quantity, 2561);

        let all = select(&available, &nougat(7684)).unwrap();
        assert!(all.outputs(None, &f.alice).is_empty());
    }
}
