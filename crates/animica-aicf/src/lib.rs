//! animica-aicf — on-chain accounting for off-chain AI/Quantum compute.
//!
//! The pipeline: a contract (or RPC user) enqueues a job, the matcher
//! leases it to an eligible provider, the provider heartbeats while it
//! runs, a proof envelope lands in a later block, the resolver binds it
//! to the task and mints a `ResultRecord`, and epoch settlement converts
//! finalized results into payouts under the fund cap.
//!
//! Two registries never regress: provider status/stake transitions are an
//! append-only log, and nullifiers are consumed at most once, ever.

pub mod attest;
pub mod error;
pub mod health;
pub mod matcher;
pub mod params;
pub mod queue;
pub mod registry;
pub mod resolver;
pub mod settlement;
pub mod task;
pub mod types;

pub use attest::{AttestPolicy, AttestationBundle};
pub use error::AicfError;
pub use matcher::assign_queued;
pub use params::AicfParams;
pub use queue::JobStore;
pub use registry::Registry;
pub use resolver::{resolve, Resolution};
pub use settlement::SettlementStore;
pub use task::task_id;
pub use types::{
    JobKind, JobRecord, JobStatus, Lease, ProofClaim, ProofEnvelope, ProviderRecord,
    ProviderStatus, ResultRecord,
};
