use std::sync::{Arc, Mutex};

use animica_aicf::queue::JobStore;
use animica_aicf::registry::Registry;
use animica_aicf::settlement::SettlementStore;
use animica_beacon::Beacon;
use animica_core::types::Hash32;
use animica_da::DaStore;
use animica_genesis::NetworkParams;
use animica_mempool::Mempool;
use animica_state::ChainStore;

use crate::hub::SubscriptionHub;

/// Blob commitments accepted via RPC and waiting for the next seal.
pub type PendingBlobs = Arc<Mutex<Vec<Hash32>>>;

/// Shared state handed to the RPC server by the node.
///
/// Readers (most methods) hit the stores directly; the mempool and
/// beacon are the two single-writer actors and sit behind mutexes the
/// sealer also takes.
pub struct RpcContext {
    pub params: NetworkParams,
    pub store: Arc<ChainStore>,
    pub jobs: Arc<JobStore>,
    pub registry: Arc<Registry>,
    pub settlement: Arc<SettlementStore>,
    pub da: Arc<DaStore>,
    pub mempool: Arc<Mutex<Mempool>>,
    pub beacon: Arc<Mutex<Beacon>>,
    pub pending_blobs: PendingBlobs,
    pub hub: SubscriptionHub,
}

impl RpcContext {
    /// Current head height, or 0 before genesis sealed.
    pub fn head_height(&self) -> u64 {
        self.store
            .head_block()
            .ok()
            .flatten()
            .map(|b| b.header.height)
            .unwrap_or(0)
    }
}
