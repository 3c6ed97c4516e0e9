use animica_core::amount::Amount;
use serde::{Deserialize, Serialize};

use crate::types::JobKind;

/// Network-pinned AICF policy. Loaded from genesis params and never
/// mutated at runtime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AicfParams {
    // Staking
    pub min_stake_ai: Amount,
    pub min_stake_quantum: Amount,
    pub unstake_lock_blocks: u64,
    /// Fraction of bonded stake burned per slash, in basis points.
    pub slash_bp: u16,

    // Health / heartbeats
    pub heartbeat_interval_secs: u64,
    pub attest_max_age_secs: u64,
    pub health_threshold_ppm: u32,
    pub jail_cooldown_blocks: u64,

    // Leases
    pub lease_ttl_secs: u64,
    pub max_renewals: u32,
    pub max_retries: u32,

    // Settlement
    pub epoch_len_blocks: u64,
    pub base_rate_ai_milli: u64,
    pub base_rate_quantum_milli: u64,
    pub split_provider_bp: u16,
    pub split_miner_bp: u16,
    pub split_fund_bp: u16,
    /// Per-epoch cap on the fund share; excess jobs carry over FIFO.
    pub gamma_fund: Amount,
    /// Demand-spike price clamp bounds, in basis points of base rate.
    pub clamp_min_bp: u16,
    pub clamp_max_bp: u16,
    /// Quantum: minimum trap-circuit success ratio.
    pub trap_threshold_ppm: u32,
}

impl AicfParams {
    pub fn min_stake_for(&self, kind: JobKind) -> &Amount {
        match kind {
            JobKind::Ai => &self.min_stake_ai,
            JobKind::Quantum => &self.min_stake_quantum,
        }
    }

    pub fn base_rate_milli(&self, kind: JobKind) -> u64 {
        match kind {
            JobKind::Ai => self.base_rate_ai_milli,
            JobKind::Quantum => self.base_rate_quantum_milli,
        }
    }
}

impl Default for AicfParams {
    fn default() -> Self {
        Self {
            min_stake_ai: Amount::from_u64(1_000_000),
            min_stake_quantum: Amount::from_u64(5_000_000),
            unstake_lock_blocks: 1_000,
            slash_bp: 500,
            heartbeat_interval_secs: 30,
            attest_max_age_secs: 86_400,
            health_threshold_ppm: 300_000,
            jail_cooldown_blocks: 600,
            lease_ttl_secs: 120,
            max_renewals: 10,
            max_retries: 3,
            epoch_len_blocks: 100,
            base_rate_ai_milli: 1_000,
            base_rate_quantum_milli: 4_000,
            split_provider_bp: 8_000,
            split_miner_bp: 1_500,
            split_fund_bp: 500,
            gamma_fund: Amount::from_u64(10_000_000),
            clamp_min_bp: 5_000,
            clamp_max_bp: 20_000,
            trap_threshold_ppm: 900_000,
        }
    }
}
