use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::{mine::mine_block_parallel, Block, Hash, LedgerError, Transaction};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::state::AppState;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Ledger(
                LedgerError::InvalidPredecessor { .. } | LedgerError::InvalidIndex { .. },
            ) => StatusCode::CONFLICT,
            ApiError::Ledger(
                LedgerError::InsufficientFunds { .. }
                | LedgerError::InvalidAmount(_)
                | LedgerError::InvalidKey(_),
            ) => StatusCode::BAD_REQUEST,
            ApiError::Ledger(LedgerError::MiningCancelled) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Ledger(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Head {
    pub height: u64,
    pub hash: Hash,
    pub difficulty: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Balance {
    pub address: String,
    pub balance: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WalletInfo {
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TxView {
    pub txid: Hash,
    #[serde(flatten)]
    pub tx: Transaction,
}

impl From<&Transaction> for TxView {
    fn from(tx: &Transaction) -> Self {
        Self {
            txid: tx.txid(),
            tx: tx.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BlockView {
    pub index: u64,
    pub hash: Hash,
    pub prev_hash: Hash,
    pub timestamp: u64,
    pub nonce: u64,
    pub transactions: Vec<TxView>,
}

impl From<&Block> for BlockView {
    fn from(block: &Block) -> Self {
        Self {
            index: block.index(),
            hash: block.hash().to_string(),
            prev_hash: block.prev_hash().to_string(),
            timestamp: block.timestamp(),
            nonce: block.nonce(),
            transactions: block.transactions().iter().map(TxView::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub to: String,
    pub amount: u64,
}

#[derive(Debug, Deserialize)]
pub struct PeerRequest {
    pub url: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/chain/head", get(head))
        .route("/chain/blocks", get(blocks))
        .route("/wallet", get(wallet))
        .route("/balance", get(own_balance))
        .route("/balance/{address}", get(balance))
        .route("/mempool", get(mempool))
        .route("/tx", post(submit_tx))
        .route("/send", post(send))
        .route("/mine", post(mine))
        .route("/block", post(submit_block))
        .route("/peers", get(list_peers).post(add_peer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn head(State(state): State<AppState>) -> Json<Head> {
    let ledger = state.ledger.lock().await;
    let tip = ledger.tip();
    Json(Head {
        height: tip.index(),
        hash: tip.hash().to_string(),
        difficulty: ledger.difficulty(),
    })
}

pub async fn blocks(State(state): State<AppState>) -> Json<Vec<BlockView>> {
    let ledger = state.ledger.lock().await;
    Json(ledger.chain().iter().map(BlockView::from).collect())
}

pub async fn wallet(State(state): State<AppState>) -> Json<WalletInfo> {
    Json(WalletInfo {
        address: state.wallet.address().to_string(),
    })
}

pub async fn own_balance(State(state): State<AppState>) -> Json<Balance> {
    let address = state.wallet.address().to_string();
    balance(State(state), Path(address)).await
}

pub async fn balance(State(state): State<AppState>, Path(address): Path<String>) -> Json<Balance> {
    let balance = state.ledger.lock().await.balance(&address);
    Json(Balance { address, balance })
}

pub async fn mempool(State(state): State<AppState>) -> Json<Vec<TxView>> {
    let mempool = state.mempool.lock().await;
    Json(mempool.transactions().iter().map(TxView::from).collect())
}

/// Transaction relayed by a peer.
pub async fn submit_tx(
    State(state): State<AppState>,
    Json(tx): Json<Transaction>,
) -> Result<(StatusCode, Json<TxView>), ApiError> {
    if tx.is_coinbase() {
        return Err(ApiError::BadRequest(
            "coinbase transactions are not relayed".into(),
        ));
    }
    let view = TxView::from(&tx);

    let ledger = state.ledger.lock().await;
    let mut mempool = state.mempool.lock().await;
    if mempool.contains(&view.txid) {
        return Ok((StatusCode::OK, Json(view)));
    }
    if let Some(outpoint) = mempool.conflict(&tx) {
        return Err(ApiError::Conflict(format!(
            "{outpoint} is already spent by a pending transaction"
        )));
    }
    ledger.check_transactions(std::slice::from_ref(&tx))?;
    mempool.insert(tx);
    info!(txid = %view.txid, "transaction received");
    Ok((StatusCode::ACCEPTED, Json(view)))
}

/// Pays `amount` from the node wallet to `to` and relays the transaction.
pub async fn send(
    State(state): State<AppState>,
    Json(req): Json<SendRequest>,
) -> Result<(StatusCode, Json<TxView>), ApiError> {
    let tx = {
        let ledger = state.ledger.lock().await;
        let mut mempool = state.mempool.lock().await;
        let tx = state.wallet.create_transaction_excluding(
            &ledger,
            &req.to,
            req.amount,
            &mempool.pending_inputs(),
        )?;
        mempool.insert(tx.clone());
        tx
    };
    info!(txid = %tx.txid(), to = %req.to, amount = req.amount, "transaction created");
    state.peers.broadcast("/tx", &tx).await;
    Ok((StatusCode::ACCEPTED, Json(TxView::from(&tx))))
}

/// Seals a block paying the node wallet, with every pending transaction that
/// is still valid, then accepts and relays it.
///
/// The ledger lock is released while searching for a nonce.
pub async fn mine(State(state): State<AppState>) -> Result<(StatusCode, Json<BlockView>), ApiError> {
    let (candidate, difficulty) = {
        let ledger = state.ledger.lock().await;
        let mempool = state.mempool.lock().await;
        let txs = mempool.select(&ledger);
        (
            ledger.candidate_block(state.wallet.address(), txs),
            ledger.difficulty(),
        )
    };

    let shutdown = state.shutdown.clone();
    let sealed = tokio::task::spawn_blocking(move || {
        mine_block_parallel(candidate, difficulty, &shutdown)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    {
        let mut ledger = state.ledger.lock().await;
        ledger.accept(sealed.clone())?;
        state
            .mempool
            .lock()
            .await
            .remove_included(sealed.transactions());
    }
    info!(index = sealed.index(), hash = %sealed.hash(), "block mined");

    state.peers.broadcast("/block", &sealed).await;
    Ok((StatusCode::CREATED, Json(BlockView::from(&sealed))))
}

/// Block relayed by a peer. Its hash is recomputed from content on decode.
pub async fn submit_block(
    State(state): State<AppState>,
    Json(block): Json<Block>,
) -> Result<Json<BlockView>, ApiError> {
    let view = BlockView::from(&block);
    {
        let mut ledger = state.ledger.lock().await;
        ledger.accept(block)?;
        state
            .mempool
            .lock()
            .await
            .remove_included(ledger.tip().transactions());
    }
    info!(index = view.index, hash = %view.hash, "block synced from peer");
    Ok(Json(view))
}

pub async fn list_peers(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.peers.list().await)
}

pub async fn add_peer(
    State(state): State<AppState>,
    Json(req): Json<PeerRequest>,
) -> Result<(StatusCode, Json<Vec<String>>), ApiError> {
    if req.url.trim().is_empty() {
        return Err(ApiError::BadRequest("peer url is empty".into()));
    }
    let added = state.peers.add(&req.url).await;
    let status = if added { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(state.peers.list().await)))
}
