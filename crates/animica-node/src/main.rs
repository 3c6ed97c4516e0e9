//! animica-node — the Animica full-node binary.
//!
//! Startup sequence:
//!   1. Open (or initialise) the sled database and all stores
//!   2. Load network params (JSON file, or devnet defaults)
//!   3. Apply genesis and seal block 0 if the store is fresh
//!   4. Start the JSON-RPC 2.0 / WS server
//!   5. Run the sealer loop: one block per interval, plus inbound
//!      blocks, proof envelopes, and provider heartbeats from the
//!      abstract relay channels

mod relay;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};

use animica_aicf::matcher;
use animica_aicf::queue::JobStore;
use animica_aicf::registry::Registry;
use animica_aicf::resolver::{self, Resolution};
use animica_aicf::settlement::SettlementStore;
use animica_beacon::{Beacon, IteratedSha3Vdf};
use animica_core::types::Hash32;
use animica_da::engine::{block_tree, ExtendedBlob};
use animica_da::DaStore;
use animica_genesis::{apply_genesis, NetworkParams};
use animica_mempool::{Mempool, MempoolConfig};
use animica_rpc::types::hex0x;
use animica_rpc::{RpcContext, RpcServer, SubscriptionHub, Topic};
use animica_state::exec::Executor;
use animica_state::ChainStore;

#[derive(Parser, Debug)]
#[command(
    name = "animica-node",
    version,
    about = "Animica full node — deterministic compute, settled on chain"
)]
struct Args {
    /// Directory for the persistent database.
    #[arg(long, default_value = "~/.animica/data")]
    data_dir: PathBuf,

    /// JSON-RPC / WS listen address.
    #[arg(long, default_value = "127.0.0.1:8545")]
    rpc_addr: SocketAddr,

    /// Path to network params JSON. Devnet defaults when omitted.
    #[arg(long)]
    network_params: Option<PathBuf>,

    /// Override the block interval (milliseconds).
    #[arg(long)]
    seal_interval_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,animica=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("Animica node starting");

    // ── Network params ────────────────────────────────────────────────────────
    let params = match &args.network_params {
        Some(path) => NetworkParams::load(path)
            .with_context(|| format!("loading network params from {}", path.display()))?,
        None => {
            warn!("no --network-params given; using devnet defaults");
            NetworkParams::devnet()
        }
    };
    info!(chain_id = params.chain_id, "network params pinned");

    // ── Stores ────────────────────────────────────────────────────────────────
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;
    let db = sled::open(&data_dir).context("opening database")?;
    let store = Arc::new(ChainStore::open(db).context("opening chain store")?);
    let jobs = Arc::new(JobStore::open(store.db()).context("opening job store")?);
    let registry = Arc::new(
        Registry::open(store.db(), params.aicf.clone(), params.attest.clone())
            .context("opening provider registry")?,
    );
    let settlement = Arc::new(SettlementStore::open(store.db()).context("opening settlement")?);
    let da = Arc::new(DaStore::open(store.db()).context("opening DA store")?);

    let gas = params.gas.clone();
    let executor = Executor::new(&store, &jobs, &gas, params.chain_id);

    // ── Genesis if fresh ──────────────────────────────────────────────────────
    if store.head_hash().context("reading head")?.is_none() {
        info!("fresh database — applying genesis");
        apply_genesis(&store, &params).context("applying genesis state")?;
        let staged = executor
            .execute_block(
                Hash32::ZERO,
                0,
                chrono::Utc::now().timestamp(),
                0,
                Vec::new(),
                Hash32::ZERO,
            )
            .context("executing genesis block")?;
        executor.commit(staged).context("sealing genesis block")?;
    } else {
        info!("existing database found — skipping genesis");
    }

    // ── Actors ────────────────────────────────────────────────────────────────
    let mempool = Arc::new(Mutex::new(Mempool::new(
        params.chain_id,
        MempoolConfig {
            capacity: params.mempool.capacity,
            min_fee: params.mempool.min_fee.clone(),
        },
    )));
    let start_height = store
        .head_block()
        .context("reading head block")?
        .map(|b| b.header.height)
        .unwrap_or(0);
    let beacon = Arc::new(Mutex::new(Beacon::new(params.beacon, start_height)));
    let hub = SubscriptionHub::new();
    let pending_blobs = Arc::new(Mutex::new(Vec::new()));

    // ── Relay (abstract block-delivery channels) ──────────────────────────────
    let (node_relay, _transport) = relay::channels(256);
    let relay::NodeRelay {
        blocks_out,
        mut blocks_in,
        mut proofs_in,
        mut heartbeats_in,
    } = node_relay;

    // ── RPC server ────────────────────────────────────────────────────────────
    let rpc_ctx = Arc::new(RpcContext {
        params: params.clone(),
        store: Arc::clone(&store),
        jobs: Arc::clone(&jobs),
        registry: Arc::clone(&registry),
        settlement: Arc::clone(&settlement),
        da: Arc::clone(&da),
        mempool: Arc::clone(&mempool),
        beacon: Arc::clone(&beacon),
        pending_blobs: Arc::clone(&pending_blobs),
        hub: hub.clone(),
    });
    let _rpc_handle = RpcServer::new(rpc_ctx)
        .start(args.rpc_addr)
        .await
        .context("starting RPC server")?;

    // ── Sealer loop ───────────────────────────────────────────────────────────
    let interval_ms = args
        .seal_interval_ms
        .unwrap_or(params.block_interval_secs * 1_000);
    let mut ticker = interval(Duration::from_millis(interval_ms.max(100)));
    let max_txs = animica_core::constants::MAX_TXS_PER_BLOCK;
    let vdf = IteratedSha3Vdf;

    info!(rpc = %args.rpc_addr, interval_ms, "node ready");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = seal_round(
                    &executor, &store, &jobs, &registry, &settlement, &da,
                    &mempool, &beacon, &pending_blobs, &hub, &blocks_out,
                    &params, max_txs, &vdf,
                ).await {
                    error!(error = %e, "seal round failed");
                }
            }
            Some(block) = blocks_in.recv() => {
                match executor.apply_external(block) {
                    Ok(block) => {
                        hub.publish(Topic::NewHeads, serde_json::json!({
                            "height": block.header.height,
                            "hash": hex0x(block.hash().as_bytes()),
                        }));
                        let mut pool = mempool.lock().expect("mempool lock");
                        let included: Vec<_> = block.txs.iter().map(|t| t.tx_hash).collect();
                        pool.mark_included(&included);
                    }
                    Err(e) => warn!(error = %e, "external block rejected"),
                }
            }
            Some(delivery) = proofs_in.recv() => {
                let now = chrono::Utc::now().timestamp();
                let height = head_height(&store);
                match resolver::resolve(
                    &jobs, &params.aicf, &delivery.envelope, &delivery.claim,
                    &delivery.output, height, now,
                ) {
                    Ok(Resolution::Completed(task_id)) => {
                        let _ = registry.adjust_active_jobs(&delivery.envelope.provider_id, -1);
                        let payload = serde_json::json!({
                            "taskId": hex0x(task_id.as_bytes()),
                            "providerId": delivery.envelope.provider_id,
                        });
                        hub.publish(Topic::AicfJobCompleted, payload.clone());
                        hub.publish(Topic::CapJobCompleted, payload);
                    }
                    Ok(Resolution::TrapFailed(task_id)) => {
                        let _ = registry.adjust_active_jobs(&delivery.envelope.provider_id, -1);
                        warn!(task = %task_id, "quantum proof failed trap verification");
                    }
                    Err(e) => warn!(error = %e, "proof resolution rejected"),
                }
            }
            Some(heartbeat) = heartbeats_in.recv() => {
                let now = chrono::Utc::now().timestamp();
                let height = head_height(&store);
                match registry.heartbeat(&heartbeat, now, height) {
                    Ok(record) => {
                        // A beat from a provider with assigned work renews
                        // its leases and marks them running.
                        for job in jobs.list_jobs(None, None).unwrap_or_default() {
                            if job.provider_id.as_deref() != Some(record.provider_id.as_str()) {
                                continue;
                            }
                            match job.status {
                                animica_aicf::JobStatus::Assigned => {
                                    let _ = jobs.mark_running(&job.task_id, now);
                                    let _ = jobs.renew_lease(&job.task_id, now);
                                }
                                animica_aicf::JobStatus::Running => {
                                    let _ = jobs.renew_lease(&job.task_id, now);
                                }
                                _ => {}
                            }
                        }
                    }
                    Err(e) => warn!(error = %e, "heartbeat rejected"),
                }
            }
        }
    }
}

/// One sealing round: draw a batch, commit blobs, execute, seal, notify,
/// then run the AICF/beacon housekeeping that follows a new height.
#[allow(clippy::too_many_arguments)]
async fn seal_round(
    executor: &Executor<'_>,
    store: &Arc<ChainStore>,
    jobs: &Arc<JobStore>,
    registry: &Arc<Registry>,
    settlement: &Arc<SettlementStore>,
    da: &Arc<DaStore>,
    mempool: &Arc<Mutex<Mempool>>,
    beacon: &Arc<Mutex<Beacon>>,
    pending_blobs: &Arc<Mutex<Vec<Hash32>>>,
    hub: &SubscriptionHub,
    blocks_out: &tokio::sync::mpsc::Sender<animica_state::Block>,
    params: &NetworkParams,
    max_txs: usize,
    vdf: &IteratedSha3Vdf,
) -> anyhow::Result<()> {
    let now = chrono::Utc::now().timestamp();
    let head = store
        .head_block()
        .context("reading head")?
        .context("sealing requires a genesis block")?;
    let height = head.header.height + 1;

    // Draw the batch and the blobs going into this block.
    let batch = {
        let pool = mempool.lock().expect("mempool lock");
        pool.next_batch(max_txs)
    };
    let blob_commitments: Vec<Hash32> = {
        let mut pending = pending_blobs.lock().expect("pending blobs lock");
        std::mem::take(&mut *pending)
    };
    let da_root = compute_da_root(da, &blob_commitments, params)?;

    let beacon_round = beacon.lock().expect("beacon lock").current_round();
    let staged = executor
        .execute_block(head.hash(), height, now, beacon_round, batch, da_root)
        .context("executing block")?;
    let block = executor.commit(staged).context("committing block")?;

    // Pool upkeep and notifications.
    {
        let mut pool = mempool.lock().expect("mempool lock");
        let included: Vec<_> = block.txs.iter().map(|t| t.tx_hash).collect();
        pool.mark_included(&included);
    }
    hub.publish(
        Topic::NewHeads,
        serde_json::json!({
            "height": block.header.height,
            "hash": hex0x(block.hash().as_bytes()),
            "daRoot": hex0x(block.header.da_root.as_bytes()),
            "txs": block.txs.len(),
        }),
    );
    for commitment in &blob_commitments {
        hub.publish(
            Topic::DaCommitted,
            serde_json::json!({
                "commitment": hex0x(commitment.as_bytes()),
                "height": block.header.height,
            }),
        );
    }
    let _ = blocks_out.try_send(block.clone());

    // Beacon advance.
    let finalized = {
        let mut b = beacon.lock().expect("beacon lock");
        b.on_height(height, vdf)
    };
    if let Some(output) = finalized {
        hub.publish(
            Topic::RandBeaconFinalized,
            serde_json::json!({
                "round": output.round,
                "randomness": hex0x(output.randomness.as_bytes()),
            }),
        );
    }

    // AICF housekeeping: expire overdue leases, decay silent providers,
    // match queued jobs under the current beacon seed.
    let (requeued, failed) = jobs
        .expire_leases(now, params.aicf.max_retries)
        .map_err(|e| anyhow::anyhow!("expiring leases: {e}"))?;
    if !requeued.is_empty() || !failed.is_empty() {
        info!(requeued = requeued.len(), failed = failed.len(), "lease expiry sweep");
    }
    registry
        .tick(now, height)
        .map_err(|e| anyhow::anyhow!("registry tick: {e}"))?;
    let seed = beacon.lock().expect("beacon lock").current_seed();
    let assigned = matcher::assign_queued(registry, jobs, &seed, height, now)
        .map_err(|e| anyhow::anyhow!("matching: {e}"))?;
    for (task_id, provider_id) in assigned {
        hub.publish(
            Topic::AicfJobAssigned,
            serde_json::json!({
                "taskId": hex0x(task_id.as_bytes()),
                "providerId": provider_id,
            }),
        );
    }

    // Epoch close at the boundary.
    if height > 0 && height % params.aicf.epoch_len_blocks == 0 {
        let epoch = height / params.aicf.epoch_len_blocks - 1;
        match settlement.close_epoch(jobs, &params.aicf, epoch) {
            Ok(s) => info!(epoch, payouts = s.payouts.len(), "epoch closed"),
            Err(e) => warn!(error = %e, epoch, "epoch close failed"),
        }
    }
    Ok(())
}

/// The block-level DA root: NMT over every included blob's leaves in
/// global `(namespace, blob_local_index)` order.
fn compute_da_root(
    da: &DaStore,
    commitments: &[Hash32],
    params: &NetworkParams,
) -> anyhow::Result<Hash32> {
    if commitments.is_empty() {
        return Ok(Hash32::ZERO);
    }
    let mut extended = Vec::with_capacity(commitments.len());
    for commitment in commitments {
        let envelope = da
            .get_commitment(commitment)
            .map_err(|e| anyhow::anyhow!("reading blob envelope: {e}"))?
            .context("pending blob missing from store")?;
        let shares = da
            .get_shares(&envelope)
            .map_err(|e| anyhow::anyhow!("reading blob shares: {e}"))?;
        let stripes = shares.len() / params.da.n;
        extended.push(ExtendedBlob {
            namespace: envelope.namespace,
            original_len: envelope.original_len,
            shares,
            stripes,
        });
    }
    let (_, root) = block_tree(&extended).map_err(|e| anyhow::anyhow!("building DA tree: {e}"))?;
    Ok(root.digest)
}

fn head_height(store: &ChainStore) -> u64 {
    store
        .head_block()
        .ok()
        .flatten()
        .map(|b| b.header.height)
        .unwrap_or(0)
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
