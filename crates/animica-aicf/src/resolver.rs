//! Proof-bound result resolution.
//!
//! A block conveys verified work as `ProofEnvelope`s; a `ProofClaim`
//! links an envelope to a task. The resolver (a) trusts only envelopes
//! the block validation already accepted, (b) matches claim and envelope
//! field by field, (c) consumes the nullifier exactly once, and (d)
//! mints the task's single `ResultRecord`, readable by the VM from the
//! next block.

use animica_core::types::{Hash32, Timestamp};
use tracing::{info, warn};

use crate::error::AicfError;
use crate::params::AicfParams;
use crate::queue::JobStore;
use crate::types::{JobKind, JobStatus, ProofClaim, ProofEnvelope, ResultRecord};

/// Outcome of resolving one envelope.
#[derive(Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Result recorded; job completed.
    Completed(Hash32),
    /// Quantum trap ratio below threshold: job failed, nothing settles,
    /// nullifier NOT recorded.
    TrapFailed(Hash32),
}

/// Resolve a consensus-validated proof envelope against its claim.
pub fn resolve(
    jobs: &JobStore,
    params: &AicfParams,
    envelope: &ProofEnvelope,
    claim: &ProofClaim,
    output: &[u8],
    finalized_height: u64,
    now: Timestamp,
) -> Result<Resolution, AicfError> {
    // (b) claim ↔ envelope binding.
    if claim.task_id != envelope.task_id
        || claim.nullifier != envelope.nullifier
        || claim.proof_type != envelope.proof_type
        || claim.envelope_hash != envelope.envelope_hash()
    {
        return Err(AicfError::ClaimMismatch(envelope.task_id.to_hex()));
    }

    let job = jobs.require_job(&envelope.task_id)?;
    if !matches!(
        job.status,
        JobStatus::Assigned | JobStatus::Running | JobStatus::Queued
    ) {
        return Err(AicfError::NotSettleable(format!(
            "task {} is {}",
            job.task_id.to_hex(),
            job.status
        )));
    }
    if job.kind != envelope.kind {
        return Err(AicfError::ClaimMismatch(envelope.task_id.to_hex()));
    }

    // Quantum: verify the trap-circuit ratio before anything is
    // consumed. A failed trap run records no nullifier, so the provider
    // may retry with fresh work.
    if envelope.kind == JobKind::Quantum {
        let got = envelope.metrics.trap_ratio_ppm.unwrap_or(0);
        if got < params.trap_threshold_ppm {
            warn!(task = %envelope.task_id, got_ppm = got, "quantum trap ratio below threshold");
            jobs.mark_failed(&envelope.task_id, now)?;
            return Ok(Resolution::TrapFailed(envelope.task_id));
        }
    }

    // (c) one-time nullifier.
    jobs.consume_nullifier(&envelope.nullifier, &envelope.task_id)?;

    // (d) the single ResultRecord.
    let result = ResultRecord {
        task_id: envelope.task_id,
        output_digest: envelope.output_digest,
        units_milli: envelope.metrics.units_milli,
        qos: envelope.metrics.qos,
        proof_refs: vec![claim.envelope_hash],
        nullifier: envelope.nullifier,
        finalized_height,
        provider_id: envelope.provider_id.clone(),
        kind: envelope.kind,
        consumed: false,
    };
    jobs.put_result(&result, output)?;

    let mut job = job;
    job.status = JobStatus::Completed;
    job.updated_at = now;
    jobs.put_job(&job)?;

    info!(task = %envelope.task_id, provider = %envelope.provider_id,
          units_milli = envelope.metrics.units_milli, "result recorded");
    Ok(Resolution::Completed(envelope.task_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JobMetrics, JobRecord, QosSnapshot};
    use animica_core::types::Address;

    fn setup() -> (tempfile::TempDir, JobStore) {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        (dir, JobStore::open(&db).unwrap())
    }

    fn enqueue_job(jobs: &JobStore, kind: JobKind, fill: u8) -> Hash32 {
        let mut addr = [0xAB; 33];
        addr[0] = 1;
        let task_id = Hash32::from_bytes([fill; 32]);
        jobs.enqueue(JobRecord {
            task_id,
            kind,
            request: vec![],
            caller: Address::from_bytes(addr),
            enqueue_height: 5,
            enqueued_at: 100,
            priority_score: 0,
            status: JobStatus::Queued,
            lease: None,
            provider_id: None,
            retries: 0,
            updated_at: 100,
        })
        .unwrap();
        task_id
    }

    fn envelope_for(task_id: Hash32, kind: JobKind, trap: Option<u32>) -> (ProofEnvelope, ProofClaim) {
        let envelope = ProofEnvelope {
            task_id,
            provider_id: "provider:aa".into(),
            kind,
            proof_type: if kind == JobKind::Ai { "AI_V1" } else { "QPROOF_V1" }.into(),
            output_digest: Hash32::from_bytes([7; 32]),
            metrics: JobMetrics {
                units_milli: 3_250,
                qos: QosSnapshot {
                    p95_ms: 420,
                    availability_ppm: 999_300,
                },
                trap_ratio_ppm: trap,
            },
            nullifier: Hash32::from_bytes([0x99 ^ task_id.as_bytes()[0]; 32]),
            block_height: 9,
        };
        let claim = ProofClaim {
            task_id,
            proof_type: envelope.proof_type.clone(),
            envelope_hash: envelope.envelope_hash(),
            nullifier: envelope.nullifier,
            metrics: envelope.metrics,
            block_height: 9,
        };
        (envelope, claim)
    }

    #[test]
    fn ai_proof_resolves_to_result() {
        let (_dir, jobs) = setup();
        let params = AicfParams::default();
        let task = enqueue_job(&jobs, JobKind::Ai, 1);
        let (envelope, claim) = envelope_for(task, JobKind::Ai, None);

        let res = resolve(&jobs, &params, &envelope, &claim, b"output", 10, 200).unwrap();
        assert_eq!(res, Resolution::Completed(task));

        let result = jobs.get_result(&task).unwrap().unwrap();
        assert_eq!(result.units_milli, 3_250);
        assert_eq!(result.qos.p95_ms, 420);
        assert_eq!(result.qos.availability_ppm, 999_300);
        assert_eq!(jobs.require_job(&task).unwrap().status, JobStatus::Completed);
        assert!(jobs.nullifier_used(&envelope.nullifier).unwrap());
    }

    #[test]
    fn replayed_nullifier_is_rejected() {
        let (_dir, jobs) = setup();
        let params = AicfParams::default();
        let task_a = enqueue_job(&jobs, JobKind::Ai, 1);
        let task_b = enqueue_job(&jobs, JobKind::Ai, 2);
        let (env_a, claim_a) = envelope_for(task_a, JobKind::Ai, None);
        resolve(&jobs, &params, &env_a, &claim_a, b"a", 10, 200).unwrap();

        // Same nullifier against a different task.
        let (mut env_b, _) = envelope_for(task_b, JobKind::Ai, None);
        env_b.nullifier = env_a.nullifier;
        let claim_b = ProofClaim {
            task_id: task_b,
            proof_type: env_b.proof_type.clone(),
            envelope_hash: env_b.envelope_hash(),
            nullifier: env_b.nullifier,
            metrics: env_b.metrics,
            block_height: 9,
        };
        assert!(matches!(
            resolve(&jobs, &params, &env_b, &claim_b, b"b", 11, 201),
            Err(AicfError::NullifierUsed(_))
        ));
    }

    #[test]
    fn quantum_below_trap_threshold_fails_without_nullifier() {
        let (_dir, jobs) = setup();
        let params = AicfParams::default();
        let task = enqueue_job(&jobs, JobKind::Quantum, 3);
        let (envelope, claim) = envelope_for(task, JobKind::Quantum, Some(100_000));

        let res = resolve(&jobs, &params, &envelope, &claim, b"", 10, 200).unwrap();
        assert_eq!(res, Resolution::TrapFailed(task));
        assert_eq!(jobs.require_job(&task).unwrap().status, JobStatus::Failed);
        assert!(jobs.get_result(&task).unwrap().is_none());
        // The nullifier stays unconsumed.
        assert!(!jobs.nullifier_used(&envelope.nullifier).unwrap());
    }

    #[test]
    fn tampered_claim_is_rejected() {
        let (_dir, jobs) = setup();
        let params = AicfParams::default();
        let task = enqueue_job(&jobs, JobKind::Ai, 4);
        let (envelope, mut claim) = envelope_for(task, JobKind::Ai, None);
        claim.envelope_hash = Hash32::from_bytes([0; 32]);
        assert!(matches!(
            resolve(&jobs, &params, &envelope, &claim, b"", 10, 200),
            Err(AicfError::ClaimMismatch(_))
        ));
    }
}
