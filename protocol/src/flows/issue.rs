use tracing::info;

use super::{FinalizedTransition, FlowError, GoodyFlows};
use crate::asset::{Amount, Token};
use crate::contract::{Command, GoodyState};
use crate::identity::{OpaqueBytes, Party};
use crate::transaction::TransactionBuilder;

impl GoodyFlows {
    /// Mints `amount` under `reference`, owned by us, guarded by `notary`.
    ///
    /// Produces a single state for the whole amount.
    pub async fn issue(
        &self,
        amount: Amount<Token>,
        reference: OpaqueBytes,
        notary: Party,
    ) -> Result<FinalizedTransition, FlowError> {
        if amount.is_zero() {
            return Err(FlowError::InvalidRequest("cannot issue zero goodies".into()));
        }

        info!(me = %self.me, %amount, reference = %reference, "STARTING issue");

        let issued = amount.issued_by(self.me.reference(reference));
        let tx = TransactionBuilder::new(notary, Command::Issue { amount: issued.clone() })
            .output(GoodyState::new(issued, self.me.clone()))
            .build();

        self.drive(tx, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlowConfig;
    use crate::crypto::Keypair;
    use crate::services::{LocalKeyStore, LocalNotary};
    use crate::vault::{InMemoryVault, StateIndex};
    use std::sync::Arc;

    #[tokio::test]
    async fn issue_creates_one_state_owned_by_the_issuer() {
        let vault = Arc::new(InMemoryVault::new());
        let keys = Arc::new(LocalKeyStore::new());
        let kp = Keypair::generate();
        let me = Party::new("Bank", kp.public_key());
        keys.insert(kp);
        let notary = Party::generate("Notary").0;
        let flows = GoodyFlows::new(
            me.clone(),
            vault.clone(),
            keys,
            Arc::new(LocalNotary::new(notary.clone(), vault.clone())),
            FlowConfig::default(),
        );

        let reference = OpaqueBytes::new(vec![0x65, 0x33]).unwrap();
        let done = flows
            .issue(Amount::new(100, Token::new("Nougat")), reference.clone(), notary.clone())
            .await
            .unwrap();

        assert_eq!(done.outputs.len(), 1);
        let state = &done.outputs[0].state;
        assert_eq!(state.owner, me);
        assert_eq!(state.amount.quantity, 100);
        assert_eq!(state.amount.token.issuer, me.reference(reference));
        assert_eq!(done.outputs[0].notary, notary);
        assert_eq!(vault.unspent_owned_by(&me).len(), 1);
    }

    #[tokio::test]
    async fn issuing_zero_is_invalid() {
        let vault = Arc::new(InMemoryVault::new());
        let notary = Party::generate("Notary").0;
        let flows = GoodyFlows::new(
            Party::generate("Bank").0,
            vault.clone(),
            Arc::new(LocalKeyStore::new()),
            Arc::new(LocalNotary::new(notary.clone(), vault)),
            FlowConfig::default(),
        );
        let err = flows
            .issue(Amount::new(0, Token::new("Nougat")), OpaqueBytes::new(vec![1]).unwrap(), notary)
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidRequest(_)));
    }
}
