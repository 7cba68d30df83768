use tracing::{debug, info};

use super::{FinalizedTransition, FlowError, GoodyFlows};
use crate::contract::Command;
use crate::identity::Party;
use crate::selection::SelectionRequest;
use crate::transaction::TransactionBuilder;
use crate::vault::{LockId, ReservationGuard, UnspentQuery};

impl GoodyFlows {
    /// Pays `request` to `recipient` from our unspent holdings.
    ///
    /// An `Amount<Token>` request may draw on any issuer; an
    /// `Amount<IssuedToken>` request only on that issuer. The recipient
    /// gets one state per issuer group touched; change comes back to us.
    /// Only we sign: a recipient need not consent to receiving goodies.
    pub async fn transfer(
        &self,
        request: impl Into<SelectionRequest>,
        recipient: Party,
    ) -> Result<FinalizedTransition, FlowError> {
        let request = request.into();
        if request.quantity() == 0 {
            return Err(FlowError::InvalidRequest("cannot transfer zero goodies".into()));
        }

        info!(me = %self.me, %request, %recipient, "STARTING transfer");

        let guard = ReservationGuard::new(self.index.clone(), LockId::new());
        debug!(lock_id = %guard.lock_id(), "SELECTING");
        let plan = self
            .index
            .reserve(guard.lock_id(), &UnspentQuery::owned_by(self.me.clone()), &request)
            .map_err(|e| {
                info!(me = %self.me, %request, available = e.available, "insufficient funds");
                FlowError::from(e)
            })?;

        let inputs = plan.inputs();
        let notary = match inputs.first() {
            Some(first) => first.notary.clone(),
            None => return Err(FlowError::InvalidRequest("selection produced no inputs".into())),
        };

        let tx = TransactionBuilder::new(notary, Command::Move)
            .inputs(inputs)
            .outputs(plan.outputs(Some(&recipient), &self.me))
            .build();

        self.drive(tx, Some(guard)).await
    }
}
