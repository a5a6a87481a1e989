mod constants;
mod mempool;
mod peers;
mod routes;
mod state;

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use clap::Parser;
use ledger_core::{constants::DEFAULT_DIFFICULTY, KeyPair, Ledger, Wallet};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::constants::DEFAULT_LISTEN;
use crate::peers::Peers;
use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "ledger-node")]
#[command(about = "Proof-of-work ledger node with an HTTP API")]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, default_value = DEFAULT_LISTEN)]
    listen: String,

    /// Leading zero hex digits required of every block hash
    #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
    difficulty: u32,

    /// Peer base URL to relay blocks and transactions to; repeatable
    #[arg(long = "peer")]
    peers: Vec<String>,

    /// Hex secret key for the node wallet; a fresh key is generated if absent
    #[arg(long)]
    secret_key: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let wallet = match &args.secret_key {
        Some(secret) => Wallet::new(KeyPair::from_secret_hex(secret)?),
        None => Wallet::generate(),
    };
    info!(address = %wallet.address(), "wallet loaded");

    let ledger = Ledger::with_difficulty(args.difficulty);
    info!(
        genesis = %ledger.tip().hash(),
        difficulty = ledger.difficulty(),
        "ledger initialised"
    );

    let state = AppState::new(ledger, wallet, Peers::new(args.peers)?);
    let shutdown = state.shutdown.clone();
    let app = routes::router(state);

    let addr: SocketAddr = args.listen.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("ledger-node listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;
    Ok(())
}

/// Resolves on ctrl-c and flags running nonce searches to stop.
async fn shutdown_signal(flag: Arc<AtomicBool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler unavailable; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
    flag.store(true, Ordering::Relaxed);
}
