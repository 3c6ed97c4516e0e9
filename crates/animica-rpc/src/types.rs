//! JSON view structs. Chain-native types render as: hashes 0x-hex,
//! addresses bech32m, amounts decimal strings, byte blobs 0x-hex (or
//! base64 where the method says so).

use animica_aicf::types::{JobRecord, ProviderRecord};
use animica_beacon::round::{BeaconOutput, RoundView};
use animica_state::{Block, EventLog, Receipt};
use animica_tx::{SignedTx, TxKind};
use serde::{Deserialize, Serialize};

pub fn hex0x(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcHead {
    pub height: u64,
    pub hash: String,
    pub parent_hash: String,
    pub timestamp: i64,
    pub state_root: String,
    pub da_root: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlock {
    pub hash: String,
    pub height: u64,
    pub parent_hash: String,
    pub timestamp: i64,
    pub tx_root: String,
    pub state_root: String,
    pub receipts_root: String,
    pub da_root: String,
    pub beacon_round: u64,
    pub tx_hashes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txs: Option<Vec<RpcTx>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipts: Option<Vec<RpcReceipt>>,
}

/// Optional includes for block queries.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockOpts {
    pub txs: bool,
    pub receipts: bool,
    pub proofs: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTx {
    pub tx_hash: String,
    pub kind: String,
    pub chain_id: u64,
    pub from: String,
    pub nonce: u64,
    pub gas_limit: u64,
    pub max_fee: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    pub scheme: String,
}

impl RpcTx {
    pub fn from_signed(tx: &SignedTx) -> Self {
        let (to, value, data) = match &tx.body.kind {
            TxKind::Transfer { to, value } => {
                (Some(to.to_bech32m()), Some(value.to_dec_string()), None)
            }
            TxKind::Call { to, data, value } => (
                Some(to.to_bech32m()),
                Some(value.to_dec_string()),
                Some(hex0x(data)),
            ),
            TxKind::Deploy { code, .. } => (None, None, Some(hex0x(code))),
        };
        Self {
            tx_hash: hex0x(tx.tx_hash.as_bytes()),
            kind: tx.body.kind.name().to_string(),
            chain_id: tx.body.chain_id,
            from: tx.body.from.to_bech32m(),
            nonce: tx.body.nonce,
            gas_limit: tx.body.gas_limit,
            max_fee: tx.body.max_fee.to_dec_string(),
            to,
            value,
            data,
            memo: tx.body.memo.clone(),
            scheme: tx.signature.scheme.name().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: String,
    pub name: String,
    pub data: String,
    pub topics: Vec<String>,
    pub index: u32,
    /// Schema-less payloads cannot be decoded generically; present for
    /// clients with out-of-band ABI knowledge.
    pub args_decoded: Option<serde_json::Value>,
}

impl From<&EventLog> for RpcLog {
    fn from(log: &EventLog) -> Self {
        Self {
            address: log.address.to_bech32m(),
            name: log.name.clone(),
            data: hex0x(&log.data),
            topics: log.topics.iter().map(|t| hex0x(t.as_bytes())).collect(),
            index: log.index,
            args_decoded: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    pub tx_hash: String,
    pub block_hash: String,
    pub block_height: u64,
    pub index: u32,
    pub status: String,
    pub gas_used: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    pub logs: Vec<RpcLog>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Receipt> for RpcReceipt {
    fn from(receipt: &Receipt) -> Self {
        Self {
            tx_hash: hex0x(receipt.tx_hash.as_bytes()),
            block_hash: hex0x(receipt.block_hash.as_bytes()),
            block_height: receipt.block_height,
            index: receipt.index,
            status: receipt.status.as_str().to_string(),
            gas_used: receipt.gas_used,
            return_data: receipt.return_data.as_ref().map(|d| hex0x(d)),
            contract_address: receipt.contract_address.map(|a| a.to_bech32m()),
            logs: receipt.logs.iter().map(RpcLog::from).collect(),
            error: receipt.error.clone(),
        }
    }
}

pub fn block_view(block: &Block, opts: BlockOpts, receipts: Option<Vec<RpcReceipt>>) -> RpcBlock {
    RpcBlock {
        hash: hex0x(block.hash().as_bytes()),
        height: block.header.height,
        parent_hash: hex0x(block.header.parent_hash.as_bytes()),
        timestamp: block.header.timestamp,
        tx_root: hex0x(block.header.tx_root.as_bytes()),
        state_root: hex0x(block.header.state_root.as_bytes()),
        receipts_root: hex0x(block.header.receipts_root.as_bytes()),
        da_root: hex0x(block.header.da_root.as_bytes()),
        beacon_round: block.header.beacon_round,
        tx_hashes: block
            .txs
            .iter()
            .map(|tx| hex0x(tx.tx_hash.as_bytes()))
            .collect(),
        txs: opts.txs.then(|| block.txs.iter().map(RpcTx::from_signed).collect()),
        receipts,
    }
}

// ── DA ───────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlobInfo {
    pub commitment: String,
    pub size: u64,
    pub namespace: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlob {
    pub commitment: String,
    pub namespace: String,
    pub data_b64: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcDaSample {
    pub index: u64,
    pub share_b64: String,
    pub proof: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcDaProof {
    pub commitment: String,
    pub num_leaves: u64,
    pub samples: Vec<RpcDaSample>,
}

// ── AICF ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderFilter {
    pub status: Option<String>,
    pub capability: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobFilter {
    pub status: Option<String>,
    pub kind: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcProvider {
    pub provider_id: String,
    pub status: String,
    pub capabilities: Vec<String>,
    pub stake_bonded: String,
    pub stake_min: String,
    pub health_ppm: u32,
    pub attest_hash: Option<String>,
    pub region: String,
    pub endpoint: String,
    pub active_jobs: u32,
}

impl From<&ProviderRecord> for RpcProvider {
    fn from(p: &ProviderRecord) -> Self {
        Self {
            provider_id: p.provider_id.clone(),
            status: p.status.to_string(),
            capabilities: p.capabilities.iter().map(|k| k.name().to_string()).collect(),
            stake_bonded: p.stake_bonded.to_dec_string(),
            stake_min: p.stake_min.to_dec_string(),
            health_ppm: p.health_ppm,
            attest_hash: p.attest_hash.map(|h| hex0x(h.as_bytes())),
            region: p.region.clone(),
            endpoint: p.endpoint.clone(),
            active_jobs: p.active_jobs,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcJob {
    pub task_id: String,
    pub kind: String,
    pub status: String,
    pub caller: String,
    pub enqueue_height: u64,
    pub priority_score: u64,
    pub provider_id: Option<String>,
    pub retries: u32,
}

impl From<&JobRecord> for RpcJob {
    fn from(job: &JobRecord) -> Self {
        Self {
            task_id: hex0x(job.task_id.as_bytes()),
            kind: job.kind.name().to_string(),
            status: job.status.to_string(),
            caller: job.caller.to_bech32m(),
            enqueue_height: job.enqueue_height,
            priority_score: job.priority_score,
            provider_id: job.provider_id.clone(),
            retries: job.retries,
        }
    }
}

// ── Randomness ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcRound {
    pub round: u64,
    pub phase: String,
    pub commit_closes_at: u64,
    pub reveal_opens_at: u64,
    pub reveal_closes_at: u64,
    pub commits: u32,
    pub reveals: u32,
}

impl From<RoundView> for RpcRound {
    fn from(v: RoundView) -> Self {
        Self {
            round: v.round,
            phase: format!("{:?}", v.phase).to_lowercase(),
            commit_closes_at: v.commit_closes_at,
            reveal_opens_at: v.reveal_opens_at,
            reveal_closes_at: v.reveal_closes_at,
            commits: v.commits,
            reveals: v.reveals,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBeacon {
    pub round: u64,
    pub randomness: String,
    pub vdf_input: String,
    pub reveals: u32,
    pub finalized_at_height: u64,
}

impl From<&BeaconOutput> for RpcBeacon {
    fn from(o: &BeaconOutput) -> Self {
        Self {
            round: o.round,
            randomness: hex0x(o.randomness.as_bytes()),
            vdf_input: hex0x(o.vdf_input.as_bytes()),
            reveals: o.reveals,
            finalized_at_height: o.finalized_at_height,
        }
    }
}
