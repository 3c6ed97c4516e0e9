//! The provider registry actor.
//!
//! A single writer owns every mutation; readers observe snapshots. Each
//! status or stake change appends an immutable `TransitionRecord`, so the
//! full history of a provider is reconstructable from the log alone.
//!
//! Named trees:
//!   aicf_providers    — provider_id utf8     → bincode(ProviderRecord)
//!   aicf_transitions  — provider_id || seq be → bincode(TransitionRecord)

use animica_core::amount::Amount;
use animica_core::types::Timestamp;
use animica_crypto::hash::sha3_256;
use animica_crypto::scheme::SigScheme;
use tracing::{info, warn};

use crate::attest::{self, AttestationBundle, AttestPolicy};
use crate::error::AicfError;
use crate::health;
use crate::params::AicfParams;
use crate::types::{
    Heartbeat, JobKind, ProviderRecord, ProviderStatus, Quotas, TransitionRecord,
};

/// Derive the canonical provider identity from its key material.
pub fn provider_id(pubkey: &[u8], alg_id: u8) -> String {
    let mut preimage = pubkey.to_vec();
    preimage.push(alg_id);
    let digest = sha3_256(&preimage);
    format!("provider:{}", hex::encode(&digest[..12]))
}

pub struct Registry {
    providers: sled::Tree,
    transitions: sled::Tree,
    params: AicfParams,
    attest_policy: AttestPolicy,
}

impl Registry {
    pub fn open(
        db: &sled::Db,
        params: AicfParams,
        attest_policy: AttestPolicy,
    ) -> Result<Self, AicfError> {
        Ok(Self {
            providers: db.open_tree("aicf_providers").map_err(AicfError::storage)?,
            transitions: db
                .open_tree("aicf_transitions")
                .map_err(AicfError::storage)?,
            params,
            attest_policy,
        })
    }

    pub fn params(&self) -> &AicfParams {
        &self.params
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub fn get(&self, id: &str) -> Result<Option<ProviderRecord>, AicfError> {
        match self.providers.get(id.as_bytes()).map_err(AicfError::storage)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(AicfError::ser)?)),
            None => Ok(None),
        }
    }

    fn require(&self, id: &str) -> Result<ProviderRecord, AicfError> {
        self.get(id)?
            .ok_or_else(|| AicfError::UnknownProvider(id.to_string()))
    }

    /// Immutable snapshot of every provider.
    pub fn snapshot(&self) -> Result<Vec<ProviderRecord>, AicfError> {
        let mut out = Vec::new();
        for item in self.providers.iter() {
            let (_, bytes) = item.map_err(AicfError::storage)?;
            out.push(bincode::deserialize(&bytes).map_err(AicfError::ser)?);
        }
        Ok(out)
    }

    /// Full append-only transition history for one provider.
    pub fn transitions(&self, id: &str) -> Result<Vec<TransitionRecord>, AicfError> {
        let mut out = Vec::new();
        for item in self.transitions.scan_prefix(id.as_bytes()) {
            let (_, bytes) = item.map_err(AicfError::storage)?;
            out.push(bincode::deserialize(&bytes).map_err(AicfError::ser)?);
        }
        Ok(out)
    }

    // ── Registration & attestation ───────────────────────────────────────────

    /// Register a new provider in `REGISTERED` with zero stake.
    pub fn register(
        &self,
        scheme: SigScheme,
        pubkey: Vec<u8>,
        capabilities: Vec<JobKind>,
        region: String,
        endpoint: String,
        now: Timestamp,
    ) -> Result<ProviderRecord, AicfError> {
        let id = provider_id(&pubkey, scheme.alg_id());
        if self.get(&id)?.is_some() {
            return Err(AicfError::AlreadyRegistered(id));
        }
        let stake_min = capabilities
            .iter()
            .map(|k| self.params.min_stake_for(*k).clone())
            .max()
            .unwrap_or_else(Amount::zero);
        let record = ProviderRecord {
            provider_id: id.clone(),
            status: ProviderStatus::Registered,
            scheme,
            pubkey,
            capabilities,
            attest_hash: None,
            attest_version: 0,
            attest_at: None,
            stake_bonded: Amount::zero(),
            stake_min,
            unlock_height: None,
            health_ppm: health::HEALTH_INITIAL_PPM,
            last_heartbeat: None,
            jailed_until_height: None,
            quotas: Quotas::default(),
            active_jobs: 0,
            region,
            endpoint,
            registered_at: now,
        };
        self.put(&record)?;
        info!(provider = %record.provider_id, "provider registered");
        Ok(record)
    }

    /// Record a validated attestation bundle. Versions only move forward.
    pub fn submit_attestation(
        &self,
        bundle: &AttestationBundle,
        now: Timestamp,
    ) -> Result<animica_core::types::Hash32, AicfError> {
        let mut record = self.require(&bundle.provider_id)?;
        if bundle.version <= record.attest_version {
            return Err(AicfError::Attestation(format!(
                "version {} not newer than {}",
                bundle.version, record.attest_version
            )));
        }
        let hash = attest::validate(bundle, &self.attest_policy, now)?;
        record.attest_hash = Some(hash);
        record.attest_version = bundle.version;
        record.attest_at = Some(now);
        self.put(&record)?;
        Ok(hash)
    }

    // ── Staking ──────────────────────────────────────────────────────────────

    /// Bond stake (initial or top-up). Resets any pending unlock timer.
    pub fn stake_topup(
        &self,
        id: &str,
        amount: Amount,
        height: u64,
        now: Timestamp,
    ) -> Result<ProviderRecord, AicfError> {
        let mut record = self.require(id)?;
        if record.status == ProviderStatus::Deregistered {
            return Err(AicfError::InvalidTransition {
                from: record.status.to_string(),
                to: "stake".into(),
            });
        }
        record.stake_bonded += &amount;
        record.unlock_height = None;
        if record.status == ProviderStatus::Unstaking {
            self.transition(&mut record, ProviderStatus::Registered, "stake top-up", height, now)?;
        }
        self.put(&record)?;
        Ok(record)
    }

    /// `ACTIVE → UNSTAKING`, starting the lock timer.
    pub fn request_unstake(
        &self,
        id: &str,
        height: u64,
        now: Timestamp,
    ) -> Result<ProviderRecord, AicfError> {
        let mut record = self.require(id)?;
        if !matches!(
            record.status,
            ProviderStatus::Active | ProviderStatus::Registered
        ) {
            return Err(AicfError::InvalidTransition {
                from: record.status.to_string(),
                to: ProviderStatus::Unstaking.to_string(),
            });
        }
        record.unlock_height = Some(height + self.params.unstake_lock_blocks);
        self.transition(&mut record, ProviderStatus::Unstaking, "unstake requested", height, now)?;
        self.put(&record)?;
        Ok(record)
    }

    /// Withdraw after the lock elapses. Returns the released amount.
    pub fn withdraw(
        &self,
        id: &str,
        height: u64,
        now: Timestamp,
    ) -> Result<Amount, AicfError> {
        let mut record = self.require(id)?;
        if record.status != ProviderStatus::Unstaking {
            return Err(AicfError::InvalidTransition {
                from: record.status.to_string(),
                to: ProviderStatus::Deregistered.to_string(),
            });
        }
        let unlock = record.unlock_height.unwrap_or(u64::MAX);
        if height < unlock {
            return Err(AicfError::StakeLocked {
                unlock_height: unlock,
            });
        }
        let released = record.stake_bonded.clone();
        record.stake_bonded = Amount::zero();
        record.unlock_height = None;
        self.transition(&mut record, ProviderStatus::Deregistered, "stake withdrawn", height, now)?;
        self.put(&record)?;
        Ok(released)
    }

    /// Slash bonded stake and jail. A provider slashed to zero is
    /// deregistered outright.
    pub fn slash(
        &self,
        id: &str,
        reason: &str,
        height: u64,
        now: Timestamp,
    ) -> Result<ProviderRecord, AicfError> {
        let mut record = self.require(id)?;
        let cut = record
            .stake_bonded
            .mul_u64(self.params.slash_bp as u64)
            .div_u64(10_000);
        record.stake_bonded = record.stake_bonded.saturating_sub(&cut);
        warn!(provider = %id, %reason, slashed = %cut, "provider slashed");
        if record.stake_bonded.is_zero() {
            self.transition(&mut record, ProviderStatus::Deregistered, reason, height, now)?;
        } else {
            record.jailed_until_height = Some(height + self.params.jail_cooldown_blocks);
            self.transition(&mut record, ProviderStatus::Jailed, reason, height, now)?;
        }
        self.put(&record)?;
        Ok(record)
    }

    // ── Heartbeats & health ──────────────────────────────────────────────────

    /// Apply a signed heartbeat: verify, refresh health, maybe activate.
    pub fn heartbeat(&self, hb: &Heartbeat, now: Timestamp, height: u64) -> Result<ProviderRecord, AicfError> {
        let mut record = self.require(&hb.provider_id)?;
        record
            .scheme
            .verify(&record.pubkey, &hb.sign_bytes(), &hb.signature)
            .map_err(|_| AicfError::HeartbeatSignature)?;
        if record.attest_hash != Some(hb.attest_hash) {
            return Err(AicfError::Attestation(
                "heartbeat attest_hash does not match latest attestation".into(),
            ));
        }

        // Decay for the gap, then credit the beat.
        if let Some(last) = record.last_heartbeat {
            let missed =
                health::missed_intervals(last, hb.sent_at, self.params.heartbeat_interval_secs);
            record.health_ppm = health::after_missed(record.health_ppm, missed);
        }
        record.health_ppm = health::on_heartbeat(record.health_ppm);
        record.last_heartbeat = Some(hb.sent_at);
        record.capabilities = hb.capabilities.clone();

        // attest + stake + heartbeat lifts REGISTERED into ACTIVE.
        if record.status == ProviderStatus::Registered && self.meets_activation(&record, now) {
            self.transition(&mut record, ProviderStatus::Active, "activation criteria met", height, now)?;
        }
        self.put(&record)?;
        Ok(record)
    }

    /// Periodic sweep: decay health for silent providers and jail the
    /// ones that fell through the threshold.
    pub fn tick(&self, now: Timestamp, height: u64) -> Result<(), AicfError> {
        for record in self.snapshot()? {
            if record.status != ProviderStatus::Active {
                continue;
            }
            let Some(last) = record.last_heartbeat else {
                continue;
            };
            let missed =
                health::missed_intervals(last, now, self.params.heartbeat_interval_secs);
            if missed == 0 {
                continue;
            }
            let mut record = record;
            record.health_ppm = health::after_missed(record.health_ppm, missed);
            if record.health_ppm < self.params.health_threshold_ppm {
                record.jailed_until_height = Some(height + self.params.jail_cooldown_blocks);
                self.transition(&mut record, ProviderStatus::Jailed, "health decayed below threshold", height, now)?;
            }
            self.put(&record)?;
        }
        Ok(())
    }

    /// `JAILED → ACTIVE` once the cooldown elapsed and health recovered.
    pub fn recover(&self, id: &str, height: u64, now: Timestamp) -> Result<ProviderRecord, AicfError> {
        let mut record = self.require(id)?;
        if record.status != ProviderStatus::Jailed {
            return Err(AicfError::InvalidTransition {
                from: record.status.to_string(),
                to: ProviderStatus::Active.to_string(),
            });
        }
        if let Some(until) = record.jailed_until_height {
            if height < until {
                return Err(AicfError::InvalidTransition {
                    from: format!("JAILED(until {until})"),
                    to: ProviderStatus::Active.to_string(),
                });
            }
        }
        if !self.meets_activation(&record, now) {
            return Err(AicfError::InvalidTransition {
                from: "JAILED(unmet activation criteria)".into(),
                to: ProviderStatus::Active.to_string(),
            });
        }
        record.jailed_until_height = None;
        self.transition(&mut record, ProviderStatus::Active, "cooldown elapsed", height, now)?;
        self.put(&record)?;
        Ok(record)
    }

    // ── Matcher support ──────────────────────────────────────────────────────

    /// Eligibility for one capability at `(now, height)`. The matcher
    /// filters on this before its deterministic shuffle.
    pub fn is_eligible(&self, record: &ProviderRecord, kind: JobKind, now: Timestamp) -> bool {
        record.status == ProviderStatus::Active
            && record.capabilities.contains(&kind)
            && record.stake_bonded >= *self.params.min_stake_for(kind)
            && record.health_ppm >= self.params.health_threshold_ppm
            && record.active_jobs < record.quotas.max_concurrent_jobs
            && self.attest_current(record, now)
    }

    /// Adjust the concurrent-job counter as leases are issued/released.
    pub fn adjust_active_jobs(&self, id: &str, delta: i32) -> Result<(), AicfError> {
        let mut record = self.require(id)?;
        record.active_jobs = record.active_jobs.saturating_add_signed(delta);
        self.put(&record)
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn attest_current(&self, record: &ProviderRecord, now: Timestamp) -> bool {
        match (record.attest_hash, record.attest_at) {
            (Some(_), Some(at)) => {
                let age = now - at;
                age >= 0 && (age as u64) <= self.params.attest_max_age_secs
            }
            _ => false,
        }
    }

    fn meets_activation(&self, record: &ProviderRecord, now: Timestamp) -> bool {
        self.attest_current(record, now)
            && record.stake_bonded >= record.stake_min
            && record.last_heartbeat.is_some()
            && record.health_ppm >= self.params.health_threshold_ppm
    }

    fn transition(
        &self,
        record: &mut ProviderRecord,
        to: ProviderStatus,
        reason: &str,
        height: u64,
        now: Timestamp,
    ) -> Result<(), AicfError> {
        let seq = self.next_seq(&record.provider_id)?;
        let entry = TransitionRecord {
            seq,
            from: record.status,
            to,
            reason: reason.to_string(),
            height,
            at: now,
        };
        let mut key = record.provider_id.as_bytes().to_vec();
        key.extend_from_slice(&seq.to_be_bytes());
        self.transitions
            .insert(key, bincode::serialize(&entry).map_err(AicfError::ser)?)
            .map_err(AicfError::storage)?;
        info!(provider = %record.provider_id, from = %record.status, to = %to, %reason, "provider transition");
        record.status = to;
        Ok(())
    }

    fn next_seq(&self, id: &str) -> Result<u64, AicfError> {
        Ok(self.transitions.scan_prefix(id.as_bytes()).count() as u64)
    }

    fn put(&self, record: &ProviderRecord) -> Result<(), AicfError> {
        self.providers
            .insert(
                record.provider_id.as_bytes(),
                bincode::serialize(record).map_err(AicfError::ser)?,
            )
            .map_err(AicfError::storage)?;
        Ok(())
    }
}
