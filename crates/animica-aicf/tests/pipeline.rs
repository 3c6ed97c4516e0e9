//! Full pipeline: enqueue → match → prove → resolve → settle.
//!
//! Covers the two reference flows: an AI job that completes with
//! `units = 3.25`, `qos.p95 = 420 ms`, `availability = 0.9993` and pays
//! out 80/15/5 at epoch close, and a quantum job whose trap ratio falls
//! below threshold: it fails, nothing settles, and its nullifier is
//! never recorded.

use animica_aicf::attest::{AttestPolicy, AttestationBundle};
use animica_aicf::matcher::assign_queued;
use animica_aicf::queue::JobStore;
use animica_aicf::registry::Registry;
use animica_aicf::resolver::{resolve, Resolution};
use animica_aicf::settlement::SettlementStore;
use animica_aicf::task::task_id;
use animica_aicf::types::{
    Heartbeat, JobKind, JobMetrics, JobRecord, JobStatus, ProofClaim, ProofEnvelope, QosSnapshot,
};
use animica_aicf::AicfParams;
use animica_core::amount::Amount;
use animica_core::types::{Address, Hash32};
use animica_crypto::hash::sha3_256;
use animica_crypto::{KeyPair, SigScheme};

struct Pipeline {
    _dir: tempfile::TempDir,
    registry: Registry,
    jobs: JobStore,
    settlement: SettlementStore,
    params: AicfParams,
}

fn attest_root() -> Vec<u8> {
    b"pipeline-root-cert".to_vec()
}

fn measurement() -> Hash32 {
    Hash32::from_bytes([0x42; 32])
}

fn setup() -> Pipeline {
    let dir = tempfile::tempdir().unwrap();
    let db = sled::open(dir.path()).unwrap();
    let params = AicfParams::default();
    let policy = AttestPolicy {
        pinned_roots: vec![Hash32::from_bytes(sha3_256(&attest_root()))],
        allowed_measurements: vec![measurement()],
        max_age_secs: 86_400,
    };
    Pipeline {
        registry: Registry::open(&db, params.clone(), policy).unwrap(),
        jobs: JobStore::open(&db).unwrap(),
        settlement: SettlementStore::open(&db).unwrap(),
        params,
        _dir: dir,
    }
}

fn bundle(provider_id: &str, now: i64) -> AttestationBundle {
    let root = attest_root();
    let mut leaf = b"leaf:".to_vec();
    leaf.extend_from_slice(&sha3_256(&root));
    let mut quote = b"quote:".to_vec();
    quote.extend_from_slice(measurement().as_bytes());
    AttestationBundle {
        provider_id: provider_id.to_string(),
        version: 1,
        vendor: "sev-snp".into(),
        quote,
        measurement: measurement(),
        cert_chain: vec![leaf, root],
        signed_at: now,
    }
}

/// Register, attest, stake, and heartbeat a provider into ACTIVE.
fn activate_provider(p: &Pipeline, kp: &KeyPair, caps: Vec<JobKind>, now: i64) -> String {
    let record = p
        .registry
        .register(kp.scheme, kp.public_key.clone(), caps.clone(), "eu".into(), String::new(), now)
        .unwrap();
    p.registry
        .submit_attestation(&bundle(&record.provider_id, now), now)
        .unwrap();
    let stake = caps
        .iter()
        .map(|k| p.params.min_stake_for(*k).clone())
        .max()
        .unwrap();
    p.registry
        .stake_topup(&record.provider_id, stake, 1, now)
        .unwrap();
    let attest_hash = p
        .registry
        .get(&record.provider_id)
        .unwrap()
        .unwrap()
        .attest_hash
        .unwrap();
    let mut hb = Heartbeat {
        provider_id: record.provider_id.clone(),
        attest_hash,
        capabilities: caps,
        load_ppm: 0,
        qos: QosSnapshot::default(),
        sent_at: now,
        signature: vec![],
    };
    hb.signature = kp.sign(&hb.sign_bytes()).unwrap();
    p.registry.heartbeat(&hb, now, 1).unwrap();
    record.provider_id
}

fn caller() -> Address {
    let mut raw = [0xCA; 33];
    raw[0] = 1;
    Address::from_bytes(raw)
}

fn enqueue(p: &Pipeline, kind: JobKind, height: u64, now: i64) -> Hash32 {
    let tx_hash = Hash32::from_bytes([height as u8; 32]);
    let payload = b"canonical-request";
    let id = task_id(1, height, &tx_hash, &caller(), payload);
    p.jobs
        .enqueue(JobRecord {
            task_id: id,
            kind,
            request: payload.to_vec(),
            caller: caller(),
            enqueue_height: height,
            enqueued_at: now,
            priority_score: 0,
            status: JobStatus::Queued,
            lease: None,
            provider_id: None,
            retries: 0,
            updated_at: now,
        })
        .unwrap();
    id
}

#[test]
fn ai_job_full_lifecycle_settles_80_15_5() {
    let p = setup();
    let now = 10_000;
    let kp = KeyPair::generate(SigScheme::Dilithium3);
    let provider_id = activate_provider(&p, &kp, vec![JobKind::Ai], now);

    // Enqueue at block H: the receipt side of this (accepted, enqueue
    // block H) is carried by the execution layer; here the queue holds it.
    let task = enqueue(&p, JobKind::Ai, 7, now);
    assert_eq!(p.jobs.require_job(&task).unwrap().status, JobStatus::Queued);

    // Matcher assigns under the beacon seed.
    let seed = Hash32::from_bytes([0xBE; 32]);
    let assigned = assign_queued(&p.registry, &p.jobs, &seed, 8, now).unwrap();
    assert_eq!(assigned, vec![(task, provider_id.clone())]);
    let job = p.jobs.require_job(&task).unwrap();
    assert_eq!(job.status, JobStatus::Assigned);
    assert_eq!(job.lease.as_ref().unwrap().provider_id, provider_id);

    // Provider posts an AI_V1 proof at H+1.
    let envelope = ProofEnvelope {
        task_id: task,
        provider_id: provider_id.clone(),
        kind: JobKind::Ai,
        proof_type: "AI_V1".into(),
        output_digest: Hash32::from_bytes(sha3_256(b"model output")),
        metrics: JobMetrics {
            units_milli: 3_250,
            qos: QosSnapshot {
                p95_ms: 420,
                availability_ppm: 999_300,
            },
            trap_ratio_ppm: None,
        },
        nullifier: Hash32::from_bytes([0xF1; 32]),
        block_height: 8,
    };
    let claim = ProofClaim {
        task_id: task,
        proof_type: envelope.proof_type.clone(),
        envelope_hash: envelope.envelope_hash(),
        nullifier: envelope.nullifier,
        metrics: envelope.metrics,
        block_height: 8,
    };
    let resolution = resolve(&p.jobs, &p.params, &envelope, &claim, b"model output", 8, now).unwrap();
    assert_eq!(resolution, Resolution::Completed(task));

    let result = p.jobs.get_result(&task).unwrap().unwrap();
    assert_eq!(result.units_milli, 3_250);
    assert_eq!(result.qos.p95_ms, 420);
    assert_eq!(result.qos.availability_ppm, 999_300);

    // Output readable from the block after finalization, exactly once.
    assert!(p.jobs.get_output(&task, 8).unwrap().is_none());
    assert_eq!(p.jobs.get_output(&task, 9).unwrap().unwrap(), b"model output");

    // Epoch 0 closes: one payout split 80/15/5.
    let settlement = p.settlement.close_epoch(&p.jobs, &p.params, 0).unwrap();
    assert_eq!(settlement.payouts.len(), 1);
    let payout = &settlement.payouts[0];
    assert_eq!(payout.provider_id, provider_id);
    assert_eq!(payout.task_id, task);
    assert_eq!(payout.nullifier, envelope.nullifier);
    let total = payout.total();
    assert_eq!(payout.provider_amount, total.mul_u64(8_000).div_u64(10_000));
    assert_eq!(payout.miner_amount, total.mul_u64(1_500).div_u64(10_000));
    assert_eq!(
        payout.provider_amount.clone() + payout.miner_amount.clone() + payout.fund_amount.clone(),
        total
    );

    // The provider claims its epoch payout into its balance.
    let claimed = p.settlement.claim_payout(&provider_id, 0).unwrap();
    assert_eq!(claimed, payout.provider_amount);
    assert!(claimed > Amount::zero());
}

#[test]
fn quantum_trap_failure_settles_nothing() {
    let p = setup();
    let now = 10_000;
    let kp = KeyPair::generate(SigScheme::Dilithium3);
    let provider_id = activate_provider(&p, &kp, vec![JobKind::Quantum], now);

    let task = enqueue(&p, JobKind::Quantum, 11, now);
    let seed = Hash32::from_bytes([0xBE; 32]);
    assign_queued(&p.registry, &p.jobs, &seed, 12, now).unwrap();

    let envelope = ProofEnvelope {
        task_id: task,
        provider_id: provider_id.clone(),
        kind: JobKind::Quantum,
        proof_type: "QPROOF_V1".into(),
        output_digest: Hash32::from_bytes([0x01; 32]),
        metrics: JobMetrics {
            units_milli: 9_000,
            qos: QosSnapshot::default(),
            // Below the 0.9 default threshold.
            trap_ratio_ppm: Some(450_000),
        },
        nullifier: Hash32::from_bytes([0xF2; 32]),
        block_height: 12,
    };
    let claim = ProofClaim {
        task_id: task,
        proof_type: envelope.proof_type.clone(),
        envelope_hash: envelope.envelope_hash(),
        nullifier: envelope.nullifier,
        metrics: envelope.metrics,
        block_height: 12,
    };
    let resolution = resolve(&p.jobs, &p.params, &envelope, &claim, b"", 12, now).unwrap();
    assert_eq!(resolution, Resolution::TrapFailed(task));

    assert_eq!(p.jobs.require_job(&task).unwrap().status, JobStatus::Failed);
    assert!(p.jobs.get_result(&task).unwrap().is_none());
    assert!(!p.jobs.nullifier_used(&envelope.nullifier).unwrap());

    // Nothing settles at epoch close.
    let settlement = p.settlement.close_epoch(&p.jobs, &p.params, 0).unwrap();
    assert!(settlement.payouts.is_empty());
    assert!(settlement.total_fund.is_zero());
}

#[test]
fn expired_lease_requeues_and_rematches() {
    let p = setup();
    let now = 10_000;
    let kp = KeyPair::generate(SigScheme::Dilithium3);
    let provider_id = activate_provider(&p, &kp, vec![JobKind::Ai], now);

    let task = enqueue(&p, JobKind::Ai, 20, now);
    let seed = Hash32::from_bytes([0x01; 32]);
    assign_queued(&p.registry, &p.jobs, &seed, 21, now).unwrap();
    p.registry.adjust_active_jobs(&provider_id, -1).unwrap(); // simulate release on expiry

    // TTL (120 s default) elapses without a heartbeat renewal.
    let later = now + 121;
    let (requeued, failed) = p.jobs.expire_leases(later, p.params.max_retries).unwrap();
    assert_eq!(requeued, vec![task]);
    assert!(failed.is_empty());
    let job = p.jobs.require_job(&task).unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.retries, 1);
    assert!(job.lease.is_none());

    // The matcher picks it up again.
    let assigned = assign_queued(&p.registry, &p.jobs, &seed, 22, later).unwrap();
    assert_eq!(assigned.len(), 1);
}
