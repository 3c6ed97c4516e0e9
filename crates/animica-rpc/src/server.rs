use std::net::SocketAddr;
use std::sync::Arc;

use animica_aicf::types::{JobKind, JobStatus};
use animica_core::amount::Amount;
use animica_core::types::{Address, Hash32};
use animica_da::engine::{reconstruct, ExtendedBlob};
use animica_da::{Blob, Namespace, Nmt, NmtLeaf};
use animica_mempool::AccountView;
use animica_state::ChainStore;
use animica_tx::decode_envelope;
use base64::Engine as _;
use jsonrpsee::core::{async_trait, RpcResult, SubscriptionResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::{PendingSubscriptionSink, RpcModule, SubscriptionMessage};
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::{
    AicfApiServer, ChainApiServer, DaApiServer, RandApiServer, StateApiServer, SubsApiServer,
    TxApiServer,
};
use crate::context::RpcContext;
use crate::error::{self, admission_error, beacon_error, err};
use crate::hub::Topic;
use crate::types::{
    block_view, hex0x, BlockOpts, JobFilter, ProviderFilter, RpcBeacon, RpcBlob, RpcBlobInfo,
    RpcBlock, RpcDaProof, RpcDaSample, RpcHead, RpcJob, RpcProvider, RpcReceipt, RpcRound, RpcTx,
};

/// The RPC server: a thin, read-mostly shell over the node's stores and
/// the two single-writer actors (mempool, beacon).
#[derive(Clone)]
pub struct RpcServer {
    ctx: Arc<RpcContext>,
}

impl RpcServer {
    pub fn new(ctx: Arc<RpcContext>) -> Self {
        Self { ctx }
    }

    /// Start serving on `addr` (HTTP + WS on the same listener) with
    /// permissive CORS. Returns a handle to stop the server.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let cors = CorsLayer::new()
            .allow_methods(Any)
            .allow_origin(Any)
            .allow_headers(Any);
        let server = Server::builder()
            .set_http_middleware(tower::ServiceBuilder::new().layer(cors))
            .build(addr)
            .await?;

        let mut module = RpcModule::new(());
        module.merge(TxApiServer::into_rpc(self.clone()))?;
        module.merge(ChainApiServer::into_rpc(self.clone()))?;
        module.merge(StateApiServer::into_rpc(self.clone()))?;
        module.merge(DaApiServer::into_rpc(self.clone()))?;
        module.merge(RandApiServer::into_rpc(self.clone()))?;
        module.merge(AicfApiServer::into_rpc(self.clone()))?;
        module.merge(SubsApiServer::into_rpc(self))?;

        let handle = server.start(module);
        info!(%addr, "RPC server started");
        Ok(handle)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

struct StoreView<'a>(&'a ChainStore);

impl AccountView for StoreView<'_> {
    fn nonce(&self, addr: &Address) -> u64 {
        self.0.get_account(addr).map(|a| a.nonce).unwrap_or(0)
    }

    fn balance(&self, addr: &Address) -> Amount {
        self.0
            .get_account(addr)
            .map(|a| a.balance)
            .unwrap_or_else(|_| Amount::zero())
    }

    fn tx_known(&self, hash: &Hash32) -> bool {
        self.0.tx_exists(hash)
    }
}

fn parse_hash(s: &str) -> RpcResult<Hash32> {
    Hash32::from_hex(s).map_err(|e| err(-32602, format!("invalid hash: {e}")))
}

fn parse_address(s: &str) -> RpcResult<Address> {
    Address::from_bech32m(s).map_err(|e| err(-32602, format!("invalid address: {e}")))
}

fn parse_hex_bytes(s: &str) -> RpcResult<Vec<u8>> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
        .map_err(|e| err(-32602, format!("invalid hex: {e}")))
}

fn internal(e: impl std::fmt::Display) -> jsonrpsee::types::ErrorObject<'static> {
    err(-32603, e.to_string())
}

fn head_view(block: &animica_state::Block) -> RpcHead {
    RpcHead {
        height: block.header.height,
        hash: hex0x(block.hash().as_bytes()),
        parent_hash: hex0x(block.header.parent_hash.as_bytes()),
        timestamp: block.header.timestamp,
        state_root: hex0x(block.header.state_root.as_bytes()),
        da_root: hex0x(block.header.da_root.as_bytes()),
    }
}

impl RpcServer {
    fn block_to_view(&self, block: animica_state::Block, opts: BlockOpts) -> RpcResult<RpcBlock> {
        let receipts = if opts.receipts {
            let mut out = Vec::with_capacity(block.txs.len());
            for tx in &block.txs {
                if let Some(receipt) = self.ctx.store.get_receipt(&tx.tx_hash).map_err(internal)? {
                    out.push(RpcReceipt::from(&receipt));
                }
            }
            Some(out)
        } else {
            None
        };
        Ok(block_view(&block, opts, receipts))
    }
}

// ── tx.* ─────────────────────────────────────────────────────────────────────

#[async_trait]
impl TxApiServer for RpcServer {
    async fn send_raw_transaction(&self, raw_cbor_hex: String) -> RpcResult<String> {
        let raw = parse_hex_bytes(&raw_cbor_hex)?;
        let tx = decode_envelope(&raw).map_err(admission_error)?;
        let hash = {
            let mut pool = self.ctx.mempool.lock().expect("mempool lock");
            pool.admit(tx, raw.len(), &StoreView(&self.ctx.store))
                .map_err(admission_error)?
        };
        self.ctx.hub.publish(
            Topic::PendingTxs,
            serde_json::json!({ "txHash": hex0x(hash.as_bytes()) }),
        );
        Ok(hex0x(hash.as_bytes()))
    }

    async fn get_transaction_receipt(&self, tx_hash: String) -> RpcResult<Option<RpcReceipt>> {
        let hash = parse_hash(&tx_hash)?;
        Ok(self
            .ctx
            .store
            .get_receipt(&hash)
            .map_err(internal)?
            .map(|r| RpcReceipt::from(&r)))
    }

    async fn get_transaction_by_hash(&self, tx_hash: String) -> RpcResult<Option<RpcTx>> {
        let hash = parse_hash(&tx_hash)?;
        // Pending first, then the chain.
        {
            let pool = self.ctx.mempool.lock().expect("mempool lock");
            if let Some(tx) = pool.get(&hash) {
                return Ok(Some(RpcTx::from_signed(tx)));
            }
        }
        let Some((block_hash, index)) = self.ctx.store.get_tx_location(&hash).map_err(internal)?
        else {
            return Ok(None);
        };
        let block = self
            .ctx
            .store
            .get_block(&block_hash)
            .map_err(internal)?
            .ok_or_else(|| err(error::UNKNOWN_BLOCK, "indexed block missing"))?;
        Ok(block.txs.get(index as usize).map(RpcTx::from_signed))
    }
}

// ── chain.* ──────────────────────────────────────────────────────────────────

#[async_trait]
impl ChainApiServer for RpcServer {
    async fn get_head(&self) -> RpcResult<Option<RpcHead>> {
        Ok(self
            .ctx
            .store
            .head_block()
            .map_err(internal)?
            .map(|b| head_view(&b)))
    }

    async fn get_params(&self) -> RpcResult<serde_json::Value> {
        serde_json::to_value(&self.ctx.params).map_err(internal)
    }

    async fn get_chain_id(&self) -> RpcResult<u64> {
        Ok(self.ctx.params.chain_id)
    }

    async fn get_block_by_number(
        &self,
        height: u64,
        opts: Option<BlockOpts>,
    ) -> RpcResult<Option<RpcBlock>> {
        match self.ctx.store.get_block_by_height(height).map_err(internal)? {
            Some(block) => Ok(Some(self.block_to_view(block, opts.unwrap_or_default())?)),
            None => Ok(None),
        }
    }

    async fn get_block_by_hash(
        &self,
        hash: String,
        opts: Option<BlockOpts>,
    ) -> RpcResult<Option<RpcBlock>> {
        let hash = parse_hash(&hash)?;
        match self.ctx.store.get_block(&hash).map_err(internal)? {
            Some(block) => Ok(Some(self.block_to_view(block, opts.unwrap_or_default())?)),
            None => Ok(None),
        }
    }
}

// ── state.* ──────────────────────────────────────────────────────────────────

#[async_trait]
impl StateApiServer for RpcServer {
    async fn get_balance(&self, address: String) -> RpcResult<String> {
        let addr = parse_address(&address)?;
        Ok(self
            .ctx
            .store
            .get_account(&addr)
            .map_err(internal)?
            .balance
            .to_dec_string())
    }

    async fn get_nonce(&self, address: String) -> RpcResult<u64> {
        let addr = parse_address(&address)?;
        Ok(self.ctx.store.get_account(&addr).map_err(internal)?.nonce)
    }
}

// ── da.* ─────────────────────────────────────────────────────────────────────

#[async_trait]
impl DaApiServer for RpcServer {
    async fn put_blob(&self, namespace_hex: String, data_b64: String) -> RpcResult<RpcBlobInfo> {
        let da_params = self.ctx.params.da;
        let namespace = Namespace::from_hex(&namespace_hex, da_params.ns_size)
            .map_err(|e| err(-32602, e.to_string()))?;
        let data = base64::engine::general_purpose::STANDARD
            .decode(&data_b64)
            .map_err(|e| err(-32602, format!("invalid base64: {e}")))?;

        let blob = Blob {
            namespace: namespace.clone(),
            data,
        };
        let ext = ExtendedBlob::extend(&blob, &da_params)
            .map_err(|e| err(error::DA_PROOF_INVALID, e.to_string()))?;
        let (_, commitment) = ext
            .commit()
            .map_err(|e| err(error::DA_PROOF_INVALID, e.to_string()))?;
        self.ctx
            .da
            .put_blob(&commitment, &ext.shares)
            .map_err(internal)?;
        self.ctx
            .pending_blobs
            .lock()
            .expect("pending blobs lock")
            .push(commitment.commitment);
        info!(commitment = %commitment.commitment, size = commitment.original_len, "blob stored");
        Ok(RpcBlobInfo {
            commitment: hex0x(commitment.commitment.as_bytes()),
            size: commitment.original_len,
            namespace: namespace.to_hex(),
        })
    }

    async fn get_blob(&self, commitment: String) -> RpcResult<Option<RpcBlob>> {
        let hash = parse_hash(&commitment)?;
        let Some(envelope) = self.ctx.da.get_commitment(&hash).map_err(internal)? else {
            return Ok(None);
        };
        let shares = self
            .ctx
            .da
            .get_shares(&envelope)
            .map_err(|e| err(error::UNKNOWN_BLOB, e.to_string()))?;
        let available: Vec<(u64, Vec<u8>)> = shares
            .into_iter()
            .enumerate()
            .map(|(i, s)| (i as u64, s))
            .collect();
        let data = reconstruct(&envelope, &available, &self.ctx.params.da)
            .map_err(|e| err(error::DA_PROOF_INVALID, e.to_string()))?;
        Ok(Some(RpcBlob {
            commitment: hex0x(hash.as_bytes()),
            namespace: envelope.namespace.to_hex(),
            data_b64: base64::engine::general_purpose::STANDARD.encode(data),
        }))
    }

    async fn get_proof(&self, commitment: String, samples: u32) -> RpcResult<RpcDaProof> {
        let hash = parse_hash(&commitment)?;
        let envelope = self
            .ctx
            .da
            .get_commitment(&hash)
            .map_err(internal)?
            .ok_or_else(|| err(error::UNKNOWN_BLOB, format!("unknown blob {commitment}")))?;
        let shares = self
            .ctx
            .da
            .get_shares(&envelope)
            .map_err(|e| err(error::UNKNOWN_BLOB, e.to_string()))?;
        let leaves: Vec<NmtLeaf> = shares
            .iter()
            .map(|share| NmtLeaf {
                namespace: envelope.namespace.clone(),
                share: share.clone(),
            })
            .collect();
        let tree = Nmt::build(leaves).map_err(|e| err(error::DA_PROOF_INVALID, e.to_string()))?;

        let seed = self.ctx.beacon.lock().expect("beacon lock").current_seed();
        let indices = animica_da::sampling::sample_indices(
            &hash,
            envelope.num_leaves,
            seed.as_bytes(),
            samples.clamp(1, 256) as usize,
        );
        let mut out = Vec::with_capacity(indices.len());
        for index in indices {
            let proof = tree
                .prove_inclusion(index as usize)
                .map_err(|e| err(error::DA_PROOF_INVALID, e.to_string()))?;
            out.push(RpcDaSample {
                index,
                share_b64: base64::engine::general_purpose::STANDARD
                    .encode(&shares[index as usize]),
                proof: serde_json::to_value(&proof).map_err(internal)?,
            });
        }
        Ok(RpcDaProof {
            commitment: hex0x(hash.as_bytes()),
            num_leaves: envelope.num_leaves,
            samples: out,
        })
    }
}

// ── rand.* ───────────────────────────────────────────────────────────────────

#[async_trait]
impl RandApiServer for RpcServer {
    async fn get_params(&self) -> RpcResult<serde_json::Value> {
        serde_json::to_value(self.ctx.params.beacon).map_err(internal)
    }

    async fn get_round(&self) -> RpcResult<RpcRound> {
        let height = self.ctx.head_height();
        let beacon = self.ctx.beacon.lock().expect("beacon lock");
        Ok(RpcRound::from(beacon.view(height)))
    }

    async fn commit(&self, salt_hash_hex: String, payload_hash_hex: String) -> RpcResult<bool> {
        let salt_hash = parse_hash(&salt_hash_hex)?;
        let payload_hash = parse_hash(&payload_hash_hex)?;
        let height = self.ctx.head_height();
        self.ctx
            .beacon
            .lock()
            .expect("beacon lock")
            .commit(salt_hash, payload_hash, height)
            .map_err(beacon_error)?;
        Ok(true)
    }

    async fn reveal(&self, salt_hex: String, payload_hex: String) -> RpcResult<bool> {
        let salt = parse_hex_bytes(&salt_hex)?;
        let payload = parse_hex_bytes(&payload_hex)?;
        let height = self.ctx.head_height();
        self.ctx
            .beacon
            .lock()
            .expect("beacon lock")
            .reveal(&salt, &payload, height)
            .map_err(beacon_error)?;
        Ok(true)
    }

    async fn get_beacon(&self, round_id: String) -> RpcResult<Option<RpcBeacon>> {
        let beacon = self.ctx.beacon.lock().expect("beacon lock");
        if round_id == "latest" {
            return Ok(beacon.latest_output().map(RpcBeacon::from));
        }
        let round: u64 = round_id
            .parse()
            .map_err(|_| err(-32602, "round id must be a number or \"latest\""))?;
        Ok(beacon.get_output(round).ok().map(RpcBeacon::from))
    }
}

// ── aicf.* ───────────────────────────────────────────────────────────────────

#[async_trait]
impl AicfApiServer for RpcServer {
    async fn list_providers(&self, filter: Option<ProviderFilter>) -> RpcResult<Vec<RpcProvider>> {
        let filter = filter.unwrap_or_default();
        let snapshot = self.ctx.registry.snapshot().map_err(internal)?;
        Ok(snapshot
            .iter()
            .filter(|p| {
                filter
                    .status
                    .as_deref()
                    .map_or(true, |s| p.status.to_string() == s)
            })
            .filter(|p| {
                filter
                    .capability
                    .as_deref()
                    .map_or(true, |c| p.capabilities.iter().any(|k| k.name() == c))
            })
            .map(RpcProvider::from)
            .collect())
    }

    async fn get_provider(&self, provider_id: String) -> RpcResult<Option<RpcProvider>> {
        Ok(self
            .ctx
            .registry
            .get(&provider_id)
            .map_err(internal)?
            .as_ref()
            .map(RpcProvider::from))
    }

    async fn list_jobs(&self, filter: Option<JobFilter>) -> RpcResult<Vec<RpcJob>> {
        let filter = filter.unwrap_or_default();
        let status = match filter.status.as_deref() {
            None => None,
            Some("queued") => Some(JobStatus::Queued),
            Some("assigned") => Some(JobStatus::Assigned),
            Some("running") => Some(JobStatus::Running),
            Some("completed") => Some(JobStatus::Completed),
            Some("failed") => Some(JobStatus::Failed),
            Some("expired") => Some(JobStatus::Expired),
            Some("canceled") => Some(JobStatus::Canceled),
            Some(other) => return Err(err(-32602, format!("unknown status {other:?}"))),
        };
        let kind = match filter.kind.as_deref() {
            None => None,
            Some(name) => Some(
                JobKind::from_name(name)
                    .ok_or_else(|| err(error::CAP_UNSUPPORTED, format!("unknown kind {name:?}")))?,
            ),
        };
        let jobs = self.ctx.jobs.list_jobs(status, kind).map_err(internal)?;
        Ok(jobs.iter().map(RpcJob::from).collect())
    }

    async fn get_job(&self, task_id: String) -> RpcResult<Option<RpcJob>> {
        let hash = parse_hash(&task_id)?;
        Ok(self
            .ctx
            .jobs
            .get_job(&hash)
            .map_err(internal)?
            .as_ref()
            .map(RpcJob::from))
    }

    async fn claim_payout(&self, provider_id: String, epoch: u64) -> RpcResult<String> {
        if self
            .ctx
            .registry
            .get(&provider_id)
            .map_err(internal)?
            .is_none()
        {
            return Err(err(
                error::UNKNOWN_PROVIDER,
                format!("unknown provider {provider_id}"),
            ));
        }
        let claimed = self
            .ctx
            .settlement
            .claim_payout(&provider_id, epoch)
            .map_err(|e| err(error::UNKNOWN_TASK, e.to_string()))?;
        Ok(claimed.to_dec_string())
    }

    async fn get_balance(&self, provider_id: String) -> RpcResult<String> {
        Ok(self
            .ctx
            .settlement
            .balance(&provider_id)
            .map_err(internal)?
            .to_dec_string())
    }
}

// ── subscribe ────────────────────────────────────────────────────────────────

#[async_trait]
impl SubsApiServer for RpcServer {
    async fn subscribe(&self, pending: PendingSubscriptionSink, topic: String) -> SubscriptionResult {
        let Some(topic) = Topic::parse(&topic) else {
            pending
                .reject(err(-32602, format!("unknown topic {topic:?}")))
                .await;
            return Ok(());
        };
        let mut rx = self.ctx.hub.subscribe(topic);
        let sink = pending.accept().await?;
        tokio::spawn(async move {
            loop {
                let payload = match rx.recv().await {
                    Ok(data) => serde_json::json!({ "topic": topic.as_str(), "data": data }),
                    Err(broadcast::error::RecvError::Lagged(dropped)) => {
                        warn!(topic = topic.as_str(), dropped, "subscriber overflow");
                        serde_json::json!({ "overflow": true, "dropped": dropped })
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Ok(msg) = SubscriptionMessage::from_json(&payload) else {
                    break;
                };
                if sink.send(msg).await.is_err() {
                    break; // client went away
                }
            }
        });
        Ok(())
    }
}
