use animica_core::amount::Amount;
use animica_core::types::{Address, Hash32, Timestamp};
use animica_crypto::scheme::SigScheme;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of compute a job requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Ai,
    Quantum,
}

impl JobKind {
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::Ai => "ai",
            JobKind::Quantum => "quantum",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "ai" => Some(JobKind::Ai),
            "quantum" => Some(JobKind::Quantum),
            _ => None,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Job lifecycle. Only `Completed` settles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Assigned,
    Running,
    Completed,
    Failed,
    Expired,
    Canceled,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Assigned => "assigned",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Expired => "expired",
            JobStatus::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// A time-bounded assignment of a job to a provider, kept alive by
/// heartbeats.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub lease_id: Hash32,
    pub provider_id: String,
    pub issued_at: Timestamp,
    pub ttl_seconds: u64,
    pub renewals: u32,
    pub max_renewals: u32,
}

impl Lease {
    pub fn expires_at(&self) -> Timestamp {
        self.issued_at + self.ttl_seconds as i64
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expires_at()
    }
}

/// One enqueued unit of work.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub task_id: Hash32,
    pub kind: JobKind,
    /// Opaque canonical-CBOR request payload.
    pub request: Vec<u8>,
    pub caller: Address,
    pub enqueue_height: u64,
    pub enqueued_at: Timestamp,
    pub priority_score: u64,
    pub status: JobStatus,
    pub lease: Option<Lease>,
    pub provider_id: Option<String>,
    pub retries: u32,
    pub updated_at: Timestamp,
}

/// Provider status machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderStatus {
    Registered,
    Active,
    Jailed,
    Unstaking,
    Deregistered,
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderStatus::Registered => "REGISTERED",
            ProviderStatus::Active => "ACTIVE",
            ProviderStatus::Jailed => "JAILED",
            ProviderStatus::Unstaking => "UNSTAKING",
            ProviderStatus::Deregistered => "DEREGISTERED",
        };
        f.write_str(s)
    }
}

/// Per-provider quota limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotas {
    pub max_concurrent_jobs: u32,
}

impl Default for Quotas {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 8,
        }
    }
}

/// A registered compute provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRecord {
    /// `provider:<hex(SHA3-256(pubkey || alg_id)[:12])>`.
    pub provider_id: String,
    pub status: ProviderStatus,
    pub scheme: SigScheme,
    pub pubkey: Vec<u8>,
    pub capabilities: Vec<JobKind>,
    pub attest_hash: Option<Hash32>,
    pub attest_version: u32,
    pub attest_at: Option<Timestamp>,
    pub stake_bonded: Amount,
    pub stake_min: Amount,
    pub unlock_height: Option<u64>,
    /// Exponential-decay health in ppm (0..=1_000_000).
    pub health_ppm: u32,
    pub last_heartbeat: Option<Timestamp>,
    pub jailed_until_height: Option<u64>,
    pub quotas: Quotas,
    pub active_jobs: u32,
    pub region: String,
    pub endpoint: String,
    pub registered_at: Timestamp,
}

/// One append-only entry in the provider transition log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub seq: u64,
    pub from: ProviderStatus,
    pub to: ProviderStatus,
    pub reason: String,
    pub height: u64,
    pub at: Timestamp,
}

/// QoS snapshot reported in heartbeats and proof metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QosSnapshot {
    pub p95_ms: u32,
    pub availability_ppm: u32,
}

/// A signed provider heartbeat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub provider_id: String,
    pub attest_hash: Hash32,
    pub capabilities: Vec<JobKind>,
    pub load_ppm: u32,
    pub qos: QosSnapshot,
    pub sent_at: Timestamp,
    pub signature: Vec<u8>,
}

impl Heartbeat {
    /// Bytes covered by the provider signature.
    pub fn sign_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(96);
        out.extend_from_slice(b"animica:aicf:heartbeat/v1");
        out.extend_from_slice(self.provider_id.as_bytes());
        out.extend_from_slice(self.attest_hash.as_bytes());
        for cap in &self.capabilities {
            out.extend_from_slice(cap.name().as_bytes());
        }
        out.extend_from_slice(&self.load_ppm.to_be_bytes());
        out.extend_from_slice(&self.qos.p95_ms.to_be_bytes());
        out.extend_from_slice(&self.qos.availability_ppm.to_be_bytes());
        out.extend_from_slice(&self.sent_at.to_be_bytes());
        out
    }
}

/// Verified-work metrics carried by a proof envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobMetrics {
    /// Work units in milli-units (3.25 units → 3250).
    pub units_milli: u64,
    pub qos: QosSnapshot,
    /// Quantum only: fraction of trap circuits answered correctly.
    pub trap_ratio_ppm: Option<u32>,
}

/// Verified work conveyed by a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofEnvelope {
    pub task_id: Hash32,
    pub provider_id: String,
    pub kind: JobKind,
    /// e.g. `"AI_V1"`, `"QPROOF_V1"`.
    pub proof_type: String,
    pub output_digest: Hash32,
    pub metrics: JobMetrics,
    pub nullifier: Hash32,
    pub block_height: u64,
}

impl ProofEnvelope {
    /// Content hash of the envelope (referenced by claims and payouts).
    pub fn envelope_hash(&self) -> Hash32 {
        let bytes = bincode::serialize(self).expect("envelope serializes");
        Hash32::from_bytes(animica_crypto::hash::sha3_256(&bytes))
    }
}

/// Links an included proof envelope to a task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofClaim {
    pub task_id: Hash32,
    pub proof_type: String,
    pub envelope_hash: Hash32,
    pub nullifier: Hash32,
    pub metrics: JobMetrics,
    pub block_height: u64,
}

/// Single-consumption result readable by the VM from the block after
/// finalization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub task_id: Hash32,
    pub output_digest: Hash32,
    pub units_milli: u64,
    pub qos: QosSnapshot,
    pub proof_refs: Vec<Hash32>,
    pub nullifier: Hash32,
    pub finalized_height: u64,
    pub provider_id: String,
    pub kind: JobKind,
    pub consumed: bool,
}

/// One epoch payout line. Every field needed to audit the split.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub provider_id: String,
    pub task_id: Hash32,
    pub nullifier: Hash32,
    pub units_milli: u64,
    /// Effective milli-rate after clamps and multipliers.
    pub rate_milli: u64,
    pub provider_amount: Amount,
    pub miner_amount: Amount,
    pub fund_amount: Amount,
}

impl Payout {
    pub fn total(&self) -> Amount {
        self.provider_amount.clone() + self.miner_amount.clone() + self.fund_amount.clone()
    }
}

/// Closed-epoch summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochSettlement {
    pub epoch: u64,
    pub payouts: Vec<Payout>,
    /// Tasks deferred to the next epoch under the fund cap, FIFO.
    pub carried: Vec<Hash32>,
    pub total_fund: Amount,
}
