//! Deterministic job → provider matching.
//!
//! Eligible providers are filtered per job (capability, stake, health,
//! attestation, quota), then shuffled with a ChaCha20 Fisher–Yates keyed
//! by `SHA3-256("animica:aicf:shuffle" || beacon || height || task_id)`.
//! The shuffled head takes the lease, so no provider can position itself
//! for a job without controlling the beacon.

use animica_core::constants::AICF_SHUFFLE_DOMAIN;
use animica_core::types::{Hash32, Timestamp};
use animica_crypto::hash::sha3_256_concat;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::debug;

use crate::error::AicfError;
use crate::queue::JobStore;
use crate::registry::Registry;
use crate::types::{JobRecord, Lease, ProviderRecord};

/// One matching round over all queued jobs.
///
/// Returns the newly assigned `(task_id, provider_id)` pairs. Jobs with
/// no eligible provider stay queued for the next round.
pub fn assign_queued(
    registry: &Registry,
    jobs: &JobStore,
    beacon: &Hash32,
    height: u64,
    now: Timestamp,
) -> Result<Vec<(Hash32, String)>, AicfError> {
    let params = registry.params();
    let snapshot = registry.snapshot()?;
    let mut assigned = Vec::new();

    for job in jobs.queued_jobs()? {
        let mut eligible: Vec<&ProviderRecord> = snapshot
            .iter()
            .filter(|p| registry.is_eligible(p, job.kind, now))
            .filter(|p| !assigned_this_round_full(p, &assigned))
            .collect();
        if eligible.is_empty() {
            debug!(task = %job.task_id, "no eligible provider; job stays queued");
            continue;
        }

        shuffle(&mut eligible, beacon, height, &job.task_id);
        let chosen = eligible[0];
        let lease = build_lease(&job, chosen, now, params.lease_ttl_secs, params.max_renewals);
        jobs.assign(&job.task_id, lease, now)?;
        registry.adjust_active_jobs(&chosen.provider_id, 1)?;
        assigned.push((job.task_id, chosen.provider_id.clone()));
    }
    Ok(assigned)
}

/// A lease id binds task, provider, and issue time.
fn build_lease(
    job: &JobRecord,
    provider: &ProviderRecord,
    now: Timestamp,
    ttl_seconds: u64,
    max_renewals: u32,
) -> Lease {
    let lease_id = Hash32::from_bytes(sha3_256_concat(&[
        b"animica:aicf:lease",
        job.task_id.as_bytes(),
        provider.provider_id.as_bytes(),
        &now.to_be_bytes(),
    ]));
    Lease {
        lease_id,
        provider_id: provider.provider_id.clone(),
        issued_at: now,
        ttl_seconds,
        renewals: 0,
        max_renewals,
    }
}

fn shuffle(providers: &mut [&ProviderRecord], beacon: &Hash32, height: u64, task: &Hash32) {
    let seed = sha3_256_concat(&[
        AICF_SHUFFLE_DOMAIN,
        beacon.as_bytes(),
        &height.to_be_bytes(),
        task.as_bytes(),
    ]);
    let mut rng = ChaCha20Rng::from_seed(seed);
    // Fisher–Yates.
    for i in (1..providers.len()).rev() {
        let j = rng.gen_range(0..=i);
        providers.swap(i, j);
    }
}

/// Quota guard across a single round: assignments made this round are
/// not yet reflected in the stored `active_jobs` snapshot we filtered on.
fn assigned_this_round_full(provider: &ProviderRecord, assigned: &[(Hash32, String)]) -> bool {
    let this_round = assigned
        .iter()
        .filter(|(_, id)| *id == provider.provider_id)
        .count() as u32;
    provider.active_jobs + this_round >= provider.quotas.max_concurrent_jobs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JobKind, ProviderStatus, Quotas};
    use animica_core::amount::Amount;
    use animica_crypto::scheme::SigScheme;

    fn provider(id: &str, health: u32) -> ProviderRecord {
        ProviderRecord {
            provider_id: id.to_string(),
            status: ProviderStatus::Active,
            scheme: SigScheme::Dilithium3,
            pubkey: vec![],
            capabilities: vec![JobKind::Ai],
            attest_hash: None,
            attest_version: 1,
            attest_at: None,
            stake_bonded: Amount::from_u64(1_000_000),
            stake_min: Amount::from_u64(1_000_000),
            unlock_height: None,
            health_ppm: health,
            last_heartbeat: Some(0),
            jailed_until_height: None,
            quotas: Quotas::default(),
            active_jobs: 0,
            region: "eu".into(),
            endpoint: String::new(),
            registered_at: 0,
        }
    }

    #[test]
    fn shuffle_is_deterministic_per_seed() {
        let a = provider("provider:aa", 1);
        let b = provider("provider:bb", 1);
        let c = provider("provider:cc", 1);
        let beacon = Hash32::from_bytes([5; 32]);
        let task = Hash32::from_bytes([6; 32]);

        let mut one: Vec<&ProviderRecord> = vec![&a, &b, &c];
        let mut two: Vec<&ProviderRecord> = vec![&a, &b, &c];
        shuffle(&mut one, &beacon, 42, &task);
        shuffle(&mut two, &beacon, 42, &task);
        let ids = |v: &[&ProviderRecord]| {
            v.iter().map(|p| p.provider_id.clone()).collect::<Vec<_>>()
        };
        assert_eq!(ids(&one), ids(&two));

        let mut other_round: Vec<&ProviderRecord> = vec![&a, &b, &c];
        shuffle(&mut other_round, &beacon, 43, &task);
        // Different height reseeds (orders may still coincide for 3
        // elements, so only check determinism-relevant structure).
        assert_eq!(other_round.len(), 3);
    }

    #[test]
    fn round_quota_guard_counts_pending_assignments() {
        let mut p = provider("provider:aa", 1);
        p.quotas = Quotas {
            max_concurrent_jobs: 1,
        };
        let assigned = vec![(Hash32::from_bytes([1; 32]), "provider:aa".to_string())];
        assert!(assigned_this_round_full(&p, &assigned));
        assert!(!assigned_this_round_full(&p, &[]));
    }
}
