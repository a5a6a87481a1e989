use std::sync::{atomic::AtomicBool, Arc};

use ledger_core::{Ledger, Wallet};
use tokio::sync::Mutex;

use crate::mempool::Mempool;
use crate::peers::Peers;

/// Shared node state.
///
/// The ledger sits behind one mutex so acceptance is never observed half
/// applied. When both locks are needed, take `ledger` before `mempool`.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Mutex<Ledger>>,
    pub mempool: Arc<Mutex<Mempool>>,
    pub wallet: Arc<Wallet>,
    pub peers: Arc<Peers>,
    /// Set on shutdown; running proof-of-work searches poll it.
    pub shutdown: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(ledger: Ledger, wallet: Wallet, peers: Peers) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(ledger)),
            mempool: Arc::new(Mutex::new(Mempool::new())),
            wallet: Arc::new(wallet),
            peers: Arc::new(peers),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }
}
