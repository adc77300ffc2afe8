//! trinity-backend
//!
//! HTTP surface of the Trinity verification engine. Handlers are thin: they
//! decode camelCase JSON, call [`TrinityEngine`] and map [`TrinityError`]
//! onto `{error, error_code}` bodies.

pub mod config;

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use trinity_common::dto::{ConsensusDto, ZkProofDto};
use trinity_common::{
    ChainId, Clock, CrossChainVerification, ParamBag, PredicateType, SystemClock, TrinityError,
    VerificationResult,
};
use trinity_consensus::{SecurityLevelOutcome, TracingSink, TrinityEngine};
use trinity_rails::AdapterRegistry;
use trinity_verifier::DisclosureCheck;

pub use config::TrinityConfig;

// ═══════════════════════════════════════════════════════════════════════════════
// STATE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct AppState {
    engine: Arc<TrinityEngine>,
}

impl AppState {
    pub fn new(engine: TrinityEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Engine over in-process chains, as configured.
    pub fn from_config(config: &TrinityConfig) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let adapters = AdapterRegistry::local(&config.chains, config.retry_policy(), clock.clone())?;
        let engine = TrinityEngine::new(
            config.engine_config(),
            config.open_ledger()?,
            adapters,
            Arc::new(TracingSink),
            clock,
        );
        Ok(Self::new(engine))
    }

    pub fn engine(&self) -> &TrinityEngine {
        &self.engine
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl From<TrinityError> for ApiError {
    fn from(err: TrinityError) -> Self {
        let status = StatusCode::from_u16(err.suggested_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(code = err.error_code(), error = %err, "request failed");
        }
        Self {
            status,
            code: err.error_code(),
            message: err.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    error_code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            error_code: self.code,
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ═══════════════════════════════════════════════════════════════════════════════
// REQUESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateProofRequest {
    vault_id: String,
    predicate_type: PredicateType,
    chain: ChainId,
    #[serde(default)]
    params: ParamBag,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyQuery {
    #[serde(default)]
    on_chain: bool,
}

#[derive(Debug, Deserialize)]
struct DisclosureCheckRequest {
    fields: BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectiveDisclosureRequest {
    vault_id: String,
    fields: BTreeSet<String>,
    chain: ChainId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RangeProofRequest {
    vault_id: String,
    min: u128,
    max: u128,
    chain: ChainId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuditProofRequest {
    vault_id: String,
    properties: BTreeSet<String>,
    chain: ChainId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConsensusRequestBody {
    vault_id: String,
    predicate_type: PredicateType,
    chains: Vec<ChainId>,
    #[serde(default)]
    deadline_ms: Option<u64>,
    #[serde(default)]
    params: ParamBag,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecurityLevelRequest {
    vault_id: String,
    operation: String,
    security_level: u8,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    chains: Vec<ChainId>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROUTER
// ═══════════════════════════════════════════════════════════════════════════════

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/trinity/proofs", post(generate_proof))
        .route("/trinity/proofs/selective-disclosure", post(selective_disclosure))
        .route("/trinity/proofs/range", post(range_proof))
        .route("/trinity/proofs/audit", post(audit_proof))
        .route("/trinity/proofs/:id", get(get_proof))
        .route("/trinity/proofs/:id/verify", post(verify_proof))
        .route("/trinity/proofs/:id/disclosure", post(check_disclosure))
        .route("/trinity/vaults/:vault_id/proofs", get(vault_proofs))
        .route("/trinity/vaults/:vault_id/verifications", get(vault_verifications))
        .route("/trinity/consensus", post(request_consensus))
        .route("/trinity/consensus/security-level", post(security_level_consensus))
        .route("/trinity/verifications/:id", get(get_verification))
        .with_state(state)
}

pub async fn serve(config: TrinityConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = app_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, chains = ?config.chains, "Trinity service listening");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        chains: state.engine.chains(),
    })
}

async fn generate_proof(
    State(state): State<AppState>,
    Json(body): Json<GenerateProofRequest>,
) -> ApiResult<ZkProofDto> {
    let dto = state
        .engine
        .generate_proof(&body.vault_id, body.predicate_type, body.chain, &body.params)
        .await?;
    Ok(Json(dto))
}

async fn get_proof(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ZkProofDto> {
    Ok(Json(state.engine.get_proof(&id)?))
}

async fn verify_proof(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<VerifyQuery>,
) -> ApiResult<VerificationResult> {
    let result = if query.on_chain {
        state.engine.verify_proof_on_chain(&id).await?
    } else {
        state.engine.verify_proof(&id)?
    };
    Ok(Json(result))
}

async fn check_disclosure(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<DisclosureCheckRequest>,
) -> ApiResult<DisclosureCheck> {
    Ok(Json(state.engine.check_disclosure(&id, &body.fields)?))
}

async fn selective_disclosure(
    State(state): State<AppState>,
    Json(body): Json<SelectiveDisclosureRequest>,
) -> ApiResult<ZkProofDto> {
    let dto = state
        .engine
        .selective_disclosure(&body.vault_id, &body.fields, body.chain)
        .await?;
    Ok(Json(dto))
}

async fn range_proof(
    State(state): State<AppState>,
    Json(body): Json<RangeProofRequest>,
) -> ApiResult<ZkProofDto> {
    let dto = state
        .engine
        .range_proof(&body.vault_id, body.min, body.max, body.chain)
        .await?;
    Ok(Json(dto))
}

async fn audit_proof(
    State(state): State<AppState>,
    Json(body): Json<AuditProofRequest>,
) -> ApiResult<ZkProofDto> {
    let dto = state
        .engine
        .audit_proof(&body.vault_id, &body.properties, body.chain)
        .await?;
    Ok(Json(dto))
}

async fn vault_proofs(
    State(state): State<AppState>,
    Path(vault_id): Path<String>,
) -> ApiResult<Vec<ZkProofDto>> {
    Ok(Json(state.engine.proofs_for_vault(&vault_id)?))
}

async fn vault_verifications(
    State(state): State<AppState>,
    Path(vault_id): Path<String>,
) -> ApiResult<Vec<CrossChainVerification>> {
    Ok(Json(state.engine.verifications_for_vault(&vault_id)?))
}

async fn request_consensus(
    State(state): State<AppState>,
    Json(body): Json<ConsensusRequestBody>,
) -> ApiResult<ConsensusDto> {
    let dto = state
        .engine
        .request_cross_chain_consensus(
            &body.vault_id,
            body.predicate_type,
            &body.chains,
            body.deadline_ms,
            &body.params,
        )
        .await?;
    Ok(Json(dto))
}

async fn security_level_consensus(
    State(state): State<AppState>,
    Json(body): Json<SecurityLevelRequest>,
) -> ApiResult<SecurityLevelOutcome> {
    let outcome = state
        .engine
        .integrate_with_triple_chain_security(&body.vault_id, &body.operation, body.security_level)
        .await?;
    Ok(Json(outcome))
}

async fn get_verification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<CrossChainVerification> {
    Ok(Json(state.engine.get_verification(&id)?))
}
