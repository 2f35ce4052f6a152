//! REST API.
//!
//! Proof-of-work chain:
//! - `GET  /chain`
//! - `POST /transactions/new`
//! - `POST /mine`
//! - `POST /nodes/register`
//! - `POST /nodes/resolve`
//!
//! Quorum ledger:
//! - `GET  /ledger`
//! - `POST /blocks/propose`
//! - `POST /blocks`
//! - `POST /blocks/:hash/signatures`
//! - `POST /blocks/:hash/commit`

use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use quorumchain_chain::{sync_chain_then, BlockchainError, LedgerError};
use quorumchain_consensus::{find_proof_cancellable, ChainSnapshot};
use quorumchain_core::{Block, Hash, NodeId, QuorumBlock, Transaction};
use quorumchain_storage::StorageError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

impl From<BlockchainError> for ApiError {
    fn from(err: BlockchainError) -> Self {
        match err {
            BlockchainError::Consensus(e) => ApiError::Internal(e.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::UnknownBlock(_) => ApiError::NotFound(err.to_string()),
            LedgerError::UnknownSigner(_) => ApiError::Forbidden(err.to_string()),
            LedgerError::QuorumNotMet { .. }
            | LedgerError::Rejected(_)
            | LedgerError::TooManyPending(_) => ApiError::Conflict(err.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        error!(error = %err, "failed to persist chain");
        ApiError::Internal(format!("storage: {err}"))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct NewTransaction {
    pub sender: String,
    pub recipient: String,
    pub amount: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MinedBlockResponse {
    pub message: String,
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: Hash,
}

#[derive(Debug, Deserialize)]
pub struct RegisterNodes {
    pub nodes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterNodesResponse {
    pub message: String,
    pub total_nodes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub message: String,
    pub replaced: bool,
    pub chain: Vec<Block>,
}

#[derive(Debug, Deserialize)]
pub struct ProposeBlock {
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Deserialize)]
pub struct SignatureRequest {
    pub signer: NodeId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StagedBlockResponse {
    pub hash: Hash,
    pub signatures: usize,
    pub required: usize,
    pub accepted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerResponse {
    pub node_id: NodeId,
    pub length: usize,
    pub chain: Vec<QuorumBlock>,
    pub pending: usize,
}

fn parse_hash(raw: &str) -> Result<Hash, ApiError> {
    Hash::from_hex(raw).map_err(|e| ApiError::BadRequest(format!("invalid block hash: {e}")))
}

// ============================================================================
// Proof-of-work chain
// ============================================================================

/// `GET /chain`
async fn get_chain(State(state): State<AppState>) -> Json<ChainSnapshot> {
    Json(state.blockchain.read().snapshot())
}

/// `POST /transactions/new`
async fn new_transaction(
    State(state): State<AppState>,
    Json(req): Json<NewTransaction>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let index = state
        .blockchain
        .write()
        .add_transaction(req.sender, req.recipient, req.amount)?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: format!("Transaction will be added to Block {index}"),
        }),
    ))
}

/// `POST /mine`
///
/// The proof search runs on the blocking pool without holding the chain
/// lock. If the tail changed meanwhile, the proof is useless and the round
/// is reported as a conflict. The block reaches the store before it joins
/// the in-memory chain.
async fn mine(State(state): State<AppState>) -> Result<Json<MinedBlockResponse>, ApiError> {
    let (last_proof, last_hash) = {
        let chain = state.blockchain.read();
        let last = chain.last_block();
        (last.proof, last.hash())
    };

    let token = state.mining_token();
    let proof = tokio::task::spawn_blocking(move || find_proof_cancellable(last_proof, &token))
        .await
        .map_err(|e| ApiError::Internal(format!("proof search failed: {e}")))?
        .ok_or_else(|| ApiError::Conflict("mining cancelled: chain was replaced".into()))?;

    let block = {
        let mut chain = state.blockchain.write();
        if chain.last_block().hash() != last_hash {
            warn!(last_proof, "chain moved during proof search");
            return Err(ApiError::Conflict("chain moved during proof search".into()));
        }
        chain.forge_then(state.node_id.as_str(), proof, |block| {
            state.persist_block(block).map_err(ApiError::from)
        })?
    };

    info!(index = block.index, proof, "new block forged");
    Ok(Json(MinedBlockResponse {
        message: "New Block Forged".into(),
        index: block.index,
        transactions: block.transactions,
        proof: block.proof,
        previous_hash: block.previous_hash,
    }))
}

/// `POST /nodes/register`
async fn register_nodes(
    State(state): State<AppState>,
    Json(req): Json<RegisterNodes>,
) -> Result<(StatusCode, Json<RegisterNodesResponse>), ApiError> {
    if req.nodes.is_empty() {
        return Err(ApiError::BadRequest("please supply a valid list of nodes".into()));
    }

    for address in &req.nodes {
        state.register_peer(address)?;
    }

    Ok((
        StatusCode::CREATED,
        Json(RegisterNodesResponse {
            message: "New nodes have been added".into(),
            total_nodes: state.blockchain.read().nodes(),
        }),
    ))
}

/// `POST /nodes/resolve`
async fn resolve_nodes(State(state): State<AppState>) -> Result<Json<ResolveResponse>, ApiError> {
    let replaced = sync_chain_then(&state.blockchain, state.transport.as_ref(), |blocks| {
        state.persist_chain(blocks).map_err(ApiError::from)
    })
    .await?;
    let chain = state.blockchain.read().blocks().to_vec();

    let message = if replaced {
        state.cancel_mining();
        "Our chain was replaced"
    } else {
        "Our chain is authoritative"
    };

    Ok(Json(ResolveResponse {
        message: message.into(),
        replaced,
        chain,
    }))
}

// ============================================================================
// Quorum ledger
// ============================================================================

fn staged_response(state: &AppState, hash: &Hash) -> Result<StagedBlockResponse, ApiError> {
    let ledger = state.ledger.lock();
    let block = ledger
        .pending(hash)
        .ok_or_else(|| ApiError::NotFound(format!("unknown block: {hash}")))?;

    Ok(StagedBlockResponse {
        hash: *hash,
        signatures: ledger.valid_signatures(block),
        required: ledger.required_signatures(),
        accepted: ledger.is_accepted(block),
    })
}

/// `GET /ledger`
async fn get_ledger(State(state): State<AppState>) -> Json<LedgerResponse> {
    let ledger = state.ledger.lock();
    Json(LedgerResponse {
        node_id: ledger.node_id().clone(),
        length: ledger.chain().len(),
        chain: ledger.chain().to_vec(),
        pending: ledger.pending_count(),
    })
}

/// `POST /blocks/propose`
///
/// Seals a block on this node's tail and stages it here. The caller is
/// responsible for forwarding it to peers via `POST /blocks`.
async fn propose_block(
    State(state): State<AppState>,
    Json(req): Json<ProposeBlock>,
) -> Result<(StatusCode, Json<QuorumBlock>), ApiError> {
    for tx in &req.transactions {
        tx.validate()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    }

    let mut ledger = state.ledger.lock();
    let block = ledger.propose_block(req.transactions);
    let hash = block.hash();
    if !ledger.receive_block(block) {
        return Err(ApiError::Internal("proposed block failed validation".into()));
    }
    let staged = ledger
        .pending(&hash)
        .cloned()
        .ok_or_else(|| ApiError::Internal("proposed block was not staged".into()))?;

    Ok((StatusCode::CREATED, Json(staged)))
}

/// `POST /blocks`
async fn receive_block(
    State(state): State<AppState>,
    Json(block): Json<QuorumBlock>,
) -> Result<(StatusCode, Json<StagedBlockResponse>), ApiError> {
    let hash = block.hash();
    state.ledger.lock().stage_block(block)?;

    Ok((StatusCode::CREATED, Json(staged_response(&state, &hash)?)))
}

/// `POST /blocks/:hash/signatures`
async fn add_signature(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    Json(req): Json<SignatureRequest>,
) -> Result<Json<StagedBlockResponse>, ApiError> {
    let hash = parse_hash(&hash)?;
    state.ledger.record_signature(&hash, req.signer)?;
    Ok(Json(staged_response(&state, &hash)?))
}

/// `POST /blocks/:hash/commit`
async fn commit_block(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<QuorumBlock>, ApiError> {
    let hash = parse_hash(&hash)?;
    let mut ledger = state.ledger.lock();
    let block = ledger.commit(&hash)?.clone();
    Ok(Json(block))
}

// ============================================================================
// Router
// ============================================================================

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/chain", get(get_chain))
        .route("/transactions/new", post(new_transaction))
        .route("/mine", post(mine))
        .route("/nodes/register", post(register_nodes))
        .route("/nodes/resolve", post(resolve_nodes))
        .route("/ledger", get(get_ledger))
        .route("/blocks", post(receive_block))
        .route("/blocks/propose", post(propose_block))
        .route("/blocks/:hash/signatures", post(add_signature))
        .route("/blocks/:hash/commit", post(commit_block))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
