//! # REST API
//!
//! Builds the axum router that exposes the hosted party's flows over HTTP.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path               | Description                               |
//! |--------|--------------------|-------------------------------------------|
//! | GET    | `/health`          | Liveness probe                            |
//! | GET    | `/goody/me`        | The hosted party                          |
//! | POST   | `/goody/issue`     | Issue goodies to ourselves                |
//! | POST   | `/goody/transfer`  | Pay goodies to another party              |
//! | POST   | `/goody/exit`      | Burn goodies we issued                    |
//! | GET    | `/goody/balances`  | Holdings per product (`?candy=` filters)  |
//! | POST   | `/goody/reconcile` | Settle a transition that timed out        |
//!
//! Flow failures map onto status codes by kind: 400 invalid request,
//! 403 signature declined, 409 finality rejected, 422 insufficient funds,
//! 500 verification rejected, 504 finality indeterminate. A 504 body
//! carries the `pending` transition; posting it back to `/goody/reconcile`
//! reports whether it committed and releases its reservation.

use axum::{
    extract::{Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use goody_protocol::asset::{amount_string, Amount, Token};
use goody_protocol::contract::StateAndRef;
use goody_protocol::flows::{
    FinalizedTransition, FlowError, GoodyFlows, PendingTransition, Reconciliation,
};
use goody_protocol::identity::{OpaqueBytes, Party, PartyId};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Parties this node can address by name or by `goody1...` id.
#[derive(Debug, Default)]
pub struct Directory {
    parties: BTreeMap<String, Party>,
}

impl Directory {
    pub fn new(parties: impl IntoIterator<Item = Party>) -> Self {
        Self {
            parties: parties
                .into_iter()
                .map(|p| (p.name().to_lowercase(), p))
                .collect(),
        }
    }

    /// Looks `who` up by (case-insensitive) name, then by party id.
    pub fn resolve(&self, who: &str) -> Option<Party> {
        if let Some(party) = self.parties.get(&who.to_lowercase()) {
            return Some(party.clone());
        }
        let id: PartyId = who.parse().ok()?;
        self.parties
            .values()
            .find(|p| id.matches(p.owning_key()))
            .cloned()
    }
}

/// Shared application state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub version: String,
    pub flows: Arc<GoodyFlows>,
    pub directory: Arc<Directory>,
    /// Notary used for issues that do not name one.
    pub default_notary: Party,
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/goody/me", get(me_handler))
        .route("/goody/issue", post(issue_handler))
        .route("/goody/transfer", post(transfer_handler))
        .route("/goody/exit", post(exit_handler))
        .route("/goody/balances", get(balances_handler))
        .route("/goody/reconcile", post(reconcile_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    #[serde(with = "amount_string")]
    pub candy: Amount<Token>,
    pub issuer_reference: OpaqueBytes,
    /// Notary name or id; the node's default notary when absent.
    pub notary: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    #[serde(with = "amount_string")]
    pub candy: Amount<Token>,
    /// Recipient name or id.
    pub recipient: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitRequest {
    #[serde(with = "amount_string")]
    pub candy: Amount<Token>,
    pub issuer_reference: OpaqueBytes,
}

#[derive(Debug, Deserialize)]
pub struct BalancesQuery {
    pub candy: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub me: String,
    pub id: String,
    pub key: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputView {
    pub state_ref: String,
    pub owner: String,
    pub quantity: u64,
    pub product: String,
    pub issuer: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResponse {
    pub tx_id: String,
    pub message: String,
    pub outputs: Vec<OutputView>,
}

impl From<&StateAndRef> for OutputView {
    fn from(o: &StateAndRef) -> Self {
        Self {
            state_ref: o.state_ref.to_string(),
            owner: o.state.owner.name().to_string(),
            quantity: o.state.amount.quantity,
            product: o.state.amount.token.product.to_string(),
            issuer: o.state.amount.token.issuer.party.name().to_string(),
        }
    }
}

impl From<FinalizedTransition> for TransitionResponse {
    fn from(done: FinalizedTransition) -> Self {
        Self {
            tx_id: done.tx_id.to_hex(),
            message: format!("Transaction ID: {}", done.tx_id),
            outputs: done.outputs.iter().map(OutputView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResponse {
    pub tx_id: String,
    pub committed: bool,
    /// Outputs of the transition when it committed; empty otherwise.
    pub outputs: Vec<OutputView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalancesResponse {
    pub balances: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    Flow(FlowError),
    UnknownParty(String),
}

impl From<FlowError> for ApiError {
    fn from(e: FlowError) -> Self {
        Self::Flow(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::UnknownParty(who) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({
                    "error": "unknown_party",
                    "message": format!("unknown party '{}'", who),
                }),
            ),
            Self::Flow(e) => {
                let status = match &e {
                    FlowError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                    FlowError::InsufficientFunds(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    FlowError::SignatureDeclined { .. } => StatusCode::FORBIDDEN,
                    FlowError::FinalityRejected { .. } => StatusCode::CONFLICT,
                    FlowError::FinalityIndeterminate(_) => StatusCode::GATEWAY_TIMEOUT,
                    FlowError::VerificationRejected(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let mut body = serde_json::json!({
                    "error": e.kind(),
                    "message": e.to_string(),
                });
                if let FlowError::FinalityIndeterminate(pending) = &e {
                    body["pending"] = serde_json::json!(pending);
                }
                (status, body)
            }
        };
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: 200 while the process is up.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /goody/me`
async fn me_handler(State(state): State<AppState>) -> Json<MeResponse> {
    let me = state.flows.whoami();
    Json(MeResponse {
        me: me.name().to_string(),
        id: me.id().to_address(),
        key: me.owning_key().to_hex(),
    })
}

/// `POST /goody/issue`
async fn issue_handler(
    State(state): State<AppState>,
    Json(req): Json<IssueRequest>,
) -> Result<Json<TransitionResponse>, ApiError> {
    tracing::info!(candy = %req.candy, reference = %req.issuer_reference, "received issue request");
    let notary = match &req.notary {
        Some(who) => state
            .directory
            .resolve(who)
            .ok_or_else(|| ApiError::UnknownParty(who.clone()))?,
        None => state.default_notary.clone(),
    };
    let done = observe(
        &state,
        "issue",
        state.flows.issue(req.candy, req.issuer_reference, notary),
    )
    .await?;
    Ok(Json(done.into()))
}

/// `POST /goody/transfer`
async fn transfer_handler(
    State(state): State<AppState>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<TransitionResponse>, ApiError> {
    tracing::info!(candy = %req.candy, recipient = %req.recipient, "received transfer request");
    let recipient = state
        .directory
        .resolve(&req.recipient)
        .ok_or_else(|| ApiError::UnknownParty(req.recipient.clone()))?;
    let done = observe(&state, "transfer", state.flows.transfer(req.candy, recipient)).await?;
    Ok(Json(done.into()))
}

/// `POST /goody/exit`
async fn exit_handler(
    State(state): State<AppState>,
    Json(req): Json<ExitRequest>,
) -> Result<Json<TransitionResponse>, ApiError> {
    tracing::info!(candy = %req.candy, reference = %req.issuer_reference, "received exit request");
    let done = observe(
        &state,
        "exit",
        state.flows.exit(req.candy, req.issuer_reference),
    )
    .await?;
    Ok(Json(done.into()))
}

/// `GET /goody/balances[?candy=NAME]`
async fn balances_handler(
    State(state): State<AppState>,
    Query(query): Query<BalancesQuery>,
) -> Json<BalancesResponse> {
    let product = query.candy.as_deref().map(Token::new);
    let balances = state
        .flows
        .balances(product.as_ref())
        .into_iter()
        .map(|(token, amount)| (token.to_string(), amount.to_string()))
        .collect();
    Json(BalancesResponse { balances })
}

/// `POST /goody/reconcile`: body is the `pending` object of a 504.
async fn reconcile_handler(
    State(state): State<AppState>,
    Json(pending): Json<PendingTransition>,
) -> Json<ReconcileResponse> {
    tracing::info!(tx_id = %pending.tx_id, "received reconcile request");
    let outputs = match state.flows.reconcile(&pending) {
        Reconciliation::Committed(outputs) => Some(outputs),
        Reconciliation::NotCommitted => None,
    };
    Json(ReconcileResponse {
        tx_id: pending.tx_id.to_hex(),
        committed: outputs.is_some(),
        outputs: outputs
            .unwrap_or_default()
            .iter()
            .map(OutputView::from)
            .collect(),
    })
}

/// Runs a flow while counting it in the node metrics.
async fn observe<F>(
    state: &AppState,
    flow: &'static str,
    run: F,
) -> Result<FinalizedTransition, FlowError>
where
    F: Future<Output = Result<FinalizedTransition, FlowError>>,
{
    let metrics = &state.metrics;
    metrics.flows_started_total.with_label_values(&[flow]).inc();
    let timer = metrics
        .flow_latency_seconds
        .with_label_values(&[flow])
        .start_timer();

    let result = run.await;
    timer.observe_duration();

    match &result {
        Ok(done) => {
            metrics.flows_succeeded_total.with_label_values(&[flow]).inc();
            tracing::info!(flow, tx_id = %done.tx_id, "request completed");
        }
        Err(e) => {
            metrics
                .flows_failed_total
                .with_label_values(&[flow, e.kind()])
                .inc();
            if e.is_business_outcome() {
                tracing::info!(flow, error = %e, "request refused");
            } else {
                tracing::error!(flow, error = %e, "request failed");
            }
        }
    }
    result
}
