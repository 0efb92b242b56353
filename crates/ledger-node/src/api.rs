use crate::state::{AppState, NodeError};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::{Block, LedgerError, Transaction};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::error;

#[derive(Debug, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
}

/// Body of `GET /chain`. Peers parse exactly this shape during resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainResponse {
    pub chain: Vec<Block>,
    pub length: usize,
}

impl From<Vec<Block>> for ChainResponse {
    fn from(chain: Vec<Block>) -> Self {
        Self {
            length: chain.len(),
            chain,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MineResponse {
    pub message: String,
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub message: String,
    pub index: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PendingResponse {
    pub transactions: Vec<Transaction>,
    pub length: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterNodes {
    pub nodes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub total_nodes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodesResponse {
    pub nodes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub message: String,
    pub replaced: bool,
    pub chain: Vec<Block>,
    pub length: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Node(#[from] NodeError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Node(NodeError::Peer(_)) => StatusCode::BAD_REQUEST,
            ApiError::Node(NodeError::TipContended(_))
            | ApiError::Node(NodeError::Ledger(LedgerError::StaleTip { .. })) => {
                StatusCode::CONFLICT
            }
            ApiError::Node(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/mine", get(mine))
        .route("/transactions/new", post(new_transaction))
        .route("/transactions/pending", get(pending_transactions))
        .route("/chain", get(full_chain))
        .route("/nodes", get(list_nodes))
        .route("/nodes/register", post(register_nodes))
        .route("/nodes/resolve", get(resolve))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".into(),
    })
}

async fn mine(State(state): State<AppState>) -> Result<Json<MineResponse>, ApiError> {
    let block = state.mine().await?;
    Ok(Json(MineResponse {
        message: "New Block Forged".into(),
        index: block.index,
        transactions: block.transactions,
        proof: block.proof,
        previous_hash: block.previous_hash,
    }))
}

async fn new_transaction(
    State(state): State<AppState>,
    Json(tx): Json<Transaction>,
) -> (StatusCode, Json<TransactionResponse>) {
    let index = state.submit(tx).await;
    (
        StatusCode::CREATED,
        Json(TransactionResponse {
            message: format!("Transaction will be added to Block {index}"),
            index,
        }),
    )
}

async fn pending_transactions(State(state): State<AppState>) -> Json<PendingResponse> {
    let transactions = state.pending().await;
    Json(PendingResponse {
        length: transactions.len(),
        transactions,
    })
}

async fn full_chain(State(state): State<AppState>) -> Json<ChainResponse> {
    Json(state.chain().await.into())
}

async fn list_nodes(State(state): State<AppState>) -> Json<NodesResponse> {
    Json(NodesResponse {
        nodes: state.peers().await,
    })
}

async fn register_nodes(
    State(state): State<AppState>,
    Json(body): Json<RegisterNodes>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    if body.nodes.is_empty() {
        return Err(ApiError::BadRequest(
            "please supply a valid list of nodes".into(),
        ));
    }
    let total_nodes = state.register_peers(&body.nodes).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "New nodes have been added".into(),
            total_nodes,
        }),
    ))
}

async fn resolve(State(state): State<AppState>) -> Result<Json<ResolveResponse>, ApiError> {
    let (replaced, chain) = state.resolve_conflicts().await?;
    let message = if replaced {
        "Our chain was replaced"
    } else {
        "Our chain is authoritative"
    };
    Ok(Json(ResolveResponse {
        message: message.into(),
        replaced,
        length: chain.len(),
        chain,
    }))
}
