use tracing::{debug, info};

use super::{FinalizedTransition, FlowError, GoodyFlows};
use crate::asset::{Amount, Token};
use crate::contract::Command;
use crate::identity::OpaqueBytes;
use crate::selection::SelectionRequest;
use crate::transaction::TransactionBuilder;
use crate::vault::{LockId, ReservationGuard, UnspentQuery};

impl GoodyFlows {
    /// Burns `amount` of goodies we both issued under `reference` and
    /// still hold. Any excess of the consumed states comes back to us as
    /// change; an exact exit leaves nothing behind.
    pub async fn exit(
        &self,
        amount: Amount<Token>,
        reference: OpaqueBytes,
    ) -> Result<FinalizedTransition, FlowError> {
        if amount.is_zero() {
            return Err(FlowError::InvalidRequest("cannot exit zero goodies".into()));
        }

        info!(me = %self.me, %amount, reference = %reference, "STARTING exit");

        let issued = amount.issued_by(self.me.reference(reference));
        let request = SelectionRequest::Issued(issued.clone());
        let query = UnspentQuery::owned_by(self.me.clone()).issued_by(self.me.clone());

        let guard = ReservationGuard::new(self.index.clone(), LockId::new());
        debug!(lock_id = %guard.lock_id(), "SELECTING");
        let plan = self
            .index
            .reserve(guard.lock_id(), &query, &request)
            .map_err(|e| {
                info!(me = %self.me, %request, available = e.available, "insufficient funds");
                FlowError::from(e)
            })?;

        let inputs = plan.inputs();
        let notary = match inputs.first() {
            Some(first) => first.notary.clone(),
            None => return Err(FlowError::InvalidRequest("selection produced no inputs".into())),
        };

        let tx = TransactionBuilder::new(notary, Command::Exit { amount: issued })
            .inputs(inputs)
            .outputs(plan.outputs(None, &self.me))
            .build();

        self.drive(tx, Some(guard)).await
    }
}
