//! Flow outcomes other than success.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::contract::Rejection;
use crate::crypto::PublicKey;
use crate::selection::InsufficientFunds;
use crate::transaction::TxId;
use crate::vault::LockId;

/// A transition whose finality outcome is unknown.
///
/// Hand it to [`GoodyFlows::reconcile`](super::GoodyFlows::reconcile)
/// before retrying. `lock_id` is the reservation still held on the inputs
/// (none for an issue, which has no inputs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransition {
    pub tx_id: TxId,
    pub lock_id: Option<LockId>,
    pub reason: String,
}

/// Every way a flow can end without a finalised transition.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Matching holdings do not cover the request. A normal business
    /// outcome; never retried automatically.
    #[error(transparent)]
    InsufficientFunds(#[from] InsufficientFunds),

    /// The built transition failed the conservation verifier. Always a bug.
    #[error("verification rejected: {0}")]
    VerificationRejected(#[from] Rejection),

    /// A required signer refused. Reservations have been released.
    #[error("signature declined by {signer}: {reason}")]
    SignatureDeclined { signer: PublicKey, reason: String },

    /// The finality service refused. Nothing was committed; safe to retry
    /// with a fresh selection.
    #[error("finality rejected transaction {tx_id}: {reason}")]
    FinalityRejected { tx_id: TxId, reason: String },

    /// The finality outcome is unknown. Reconcile before retrying.
    #[error("finality indeterminate for transaction {}: {}", .0.tx_id, .0.reason)]
    FinalityIndeterminate(PendingTransition),

    /// The request itself is malformed (zero amount, too many states...).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl FlowError {
    /// Outcomes the caller should show to a user rather than treat as a
    /// system failure.
    pub fn is_business_outcome(&self) -> bool {
        matches!(
            self,
            Self::InsufficientFunds(_) | Self::SignatureDeclined { .. } | Self::InvalidRequest(_)
        )
    }

    /// `true` if resubmitting the same request is safe without reconciling.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::FinalityRejected { .. })
    }

    /// Short, stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientFunds(_) => "insufficient_funds",
            Self::VerificationRejected(_) => "verification_rejected",
            Self::SignatureDeclined { .. } => "signature_declined",
            Self::FinalityRejected { .. } => "finality_rejected",
            Self::FinalityIndeterminate(_) => "finality_indeterminate",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Token;

    #[test]
    fn classification() {
        let insufficient = FlowError::from(InsufficientFunds {
            product: Token::new("Nougat"),
            requested: 10,
            available: 9,
        });
        assert!(insufficient.is_business_outcome());
        assert!(!insufficient.is_retryable());
        assert_eq!(insufficient.kind(), "insufficient_funds");

        let rejected = FlowError::FinalityRejected {
            tx_id: TxId::from_bytes([0u8; 32]),
            reason: "double spend".into(),
        };
        assert!(rejected.is_retryable());
        assert!(!rejected.is_business_outcome());

        let pending = FlowError::FinalityIndeterminate(PendingTransition {
            tx_id: TxId::from_bytes([1u8; 32]),
            lock_id: None,
            reason: "timed out".into(),
        });
        assert!(!pending.is_retryable());
        assert!(pending.to_string().contains("timed out"));
    }

    #[test]
    fn insufficient_funds_message_is_preserved() {
        let err = FlowError::from(InsufficientFunds {
            product: Token::new("Nougat"),
            requested: 7685,
            available: 7684,
        });
        assert_eq!(
            err.to_string(),
            "insufficient funds: requested 7685 NOUGAT, available 7684"
        );
    }
}
