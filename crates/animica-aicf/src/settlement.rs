//! Epoch settlement.
//!
//! At epoch close every finalized `ResultRecord` in the epoch window
//! (plus tasks carried from the previous epoch) is priced:
//!
//! ```text
//! reward = units · base_rate(kind) · demand_multiplier · qos_multiplier
//! ```
//!
//! and split provider/miner/fund by the pinned basis-point ratios. The
//! fund share is capped at `Γ_fund` per epoch; tasks that would breach
//! the cap carry to the next epoch FIFO. Value is conserved exactly: the
//! fund leg absorbs integer-division remainders so
//! `provider + miner + fund == reward` for every payout.
//!
//! Named trees:
//!   aicf_settlements — epoch be       → bincode(EpochSettlement)
//!   aicf_balances    — provider utf8  → bincode(Amount)
//!   aicf_claims      — provider || epoch be → [] (claimed set)

use animica_core::amount::Amount;
use tracing::info;

use crate::error::AicfError;
use crate::params::AicfParams;
use crate::queue::JobStore;
use crate::types::{EpochSettlement, Payout, ResultRecord};

/// Demand-responsive price multiplier in basis points: par (10_000)
/// until settled volume exceeds one job per block, then rising linearly,
/// clamped to the pinned bounds.
pub fn demand_multiplier_bp(settled: u64, params: &AicfParams) -> u64 {
    let excess = settled.saturating_sub(params.epoch_len_blocks);
    let raw = 10_000 + 10_000 * excess / params.epoch_len_blocks.max(1);
    raw.clamp(params.clamp_min_bp as u64, params.clamp_max_bp as u64)
}

/// QoS multiplier in basis points: availability scales the last 20%,
/// and a p95 above 500 ms costs a flat 10%.
pub fn qos_multiplier_bp(result: &ResultRecord) -> u64 {
    let availability = result.qos.availability_ppm.min(1_000_000) as u64;
    let mut bp = 8_000 + 2_000 * availability / 1_000_000;
    if result.qos.p95_ms > 500 {
        bp = bp * 9_000 / 10_000;
    }
    bp
}

/// Price one result into a payout.
fn price(result: &ResultRecord, demand_bp: u64, params: &AicfParams) -> Payout {
    let rate_milli =
        params.base_rate_milli(result.kind) * demand_bp * qos_multiplier_bp(result) / 100_000_000;
    let reward = Amount::from_u128(result.units_milli as u128 * rate_milli as u128 / 1_000);

    let provider_amount = reward.mul_u64(params.split_provider_bp as u64).div_u64(10_000);
    let miner_amount = reward.mul_u64(params.split_miner_bp as u64).div_u64(10_000);
    // Fund takes the remainder so the split conserves value exactly.
    let fund_amount = reward
        .checked_sub(&provider_amount)
        .and_then(|r| r.checked_sub(&miner_amount))
        .unwrap_or_else(Amount::zero);

    Payout {
        provider_id: result.provider_id.clone(),
        task_id: result.task_id,
        nullifier: result.nullifier,
        units_milli: result.units_milli,
        rate_milli,
        provider_amount,
        miner_amount,
        fund_amount,
    }
}

/// Persistent settlement ledger.
pub struct SettlementStore {
    settlements: sled::Tree,
    balances: sled::Tree,
    claims: sled::Tree,
}

impl SettlementStore {
    pub fn open(db: &sled::Db) -> Result<Self, AicfError> {
        Ok(Self {
            settlements: db
                .open_tree("aicf_settlements")
                .map_err(AicfError::storage)?,
            balances: db.open_tree("aicf_balances").map_err(AicfError::storage)?,
            claims: db.open_tree("aicf_claims").map_err(AicfError::storage)?,
        })
    }

    /// Close `epoch` (heights `[epoch·len, (epoch+1)·len)`).
    pub fn close_epoch(
        &self,
        jobs: &JobStore,
        params: &AicfParams,
        epoch: u64,
    ) -> Result<EpochSettlement, AicfError> {
        let from = epoch * params.epoch_len_blocks;
        let to = from + params.epoch_len_blocks - 1;

        // Carried tasks first (FIFO), then this epoch's results.
        let mut pending: Vec<ResultRecord> = Vec::new();
        if epoch > 0 {
            if let Some(prev) = self.get_settlement(epoch - 1)? {
                for task_id in prev.carried {
                    if let Some(r) = jobs.get_result(&task_id)? {
                        pending.push(r);
                    }
                }
            }
        }
        pending.extend(jobs.results_finalized_in(from, to)?);

        let demand_bp = demand_multiplier_bp(pending.len() as u64, params);
        let mut payouts = Vec::new();
        let mut carried = Vec::new();
        let mut total_fund = Amount::zero();
        let mut capped = false;

        for result in &pending {
            if capped {
                carried.push(result.task_id);
                continue;
            }
            let payout = price(result, demand_bp, params);
            let next_fund = total_fund.clone() + payout.fund_amount.clone();
            if next_fund > params.gamma_fund {
                // Fund cap reached: this and everything after carries,
                // preserving FIFO order into the next epoch.
                capped = true;
                carried.push(result.task_id);
                continue;
            }
            total_fund = next_fund;
            payouts.push(payout);
        }

        let settlement = EpochSettlement {
            epoch,
            payouts,
            carried,
            total_fund,
        };
        self.settlements
            .insert(
                epoch.to_be_bytes(),
                bincode::serialize(&settlement).map_err(AicfError::ser)?,
            )
            .map_err(AicfError::storage)?;
        info!(
            epoch,
            payouts = settlement.payouts.len(),
            carried = settlement.carried.len(),
            fund = %settlement.total_fund,
            "epoch settled"
        );
        Ok(settlement)
    }

    pub fn get_settlement(&self, epoch: u64) -> Result<Option<EpochSettlement>, AicfError> {
        match self
            .settlements
            .get(epoch.to_be_bytes())
            .map_err(AicfError::storage)?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(AicfError::ser)?)),
            None => Ok(None),
        }
    }

    /// Claim a provider's payouts for one epoch into its balance. Once.
    pub fn claim_payout(&self, provider_id: &str, epoch: u64) -> Result<Amount, AicfError> {
        let mut claim_key = provider_id.as_bytes().to_vec();
        claim_key.extend_from_slice(&epoch.to_be_bytes());
        if self
            .claims
            .contains_key(&claim_key)
            .map_err(AicfError::storage)?
        {
            return Err(AicfError::AlreadyClaimed {
                provider: provider_id.to_string(),
                epoch,
            });
        }
        let settlement = self
            .get_settlement(epoch)?
            .ok_or(AicfError::NotSettleable(format!("epoch {epoch} not closed")))?;
        let mut claimed = Amount::zero();
        for payout in settlement
            .payouts
            .iter()
            .filter(|p| p.provider_id == provider_id)
        {
            claimed += &payout.provider_amount;
        }
        let new_balance = self.balance(provider_id)? + claimed.clone();
        self.balances
            .insert(
                provider_id.as_bytes(),
                bincode::serialize(&new_balance).map_err(AicfError::ser)?,
            )
            .map_err(AicfError::storage)?;
        self.claims
            .insert(claim_key, b"".as_ref())
            .map_err(AicfError::storage)?;
        Ok(claimed)
    }

    pub fn balance(&self, provider_id: &str) -> Result<Amount, AicfError> {
        match self
            .balances
            .get(provider_id.as_bytes())
            .map_err(AicfError::storage)?
        {
            Some(bytes) => Ok(bincode::deserialize(&bytes).map_err(AicfError::ser)?),
            None => Ok(Amount::zero()),
        }
    }
}
