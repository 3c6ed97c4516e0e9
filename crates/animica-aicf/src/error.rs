use thiserror::Error;

#[derive(Debug, Error)]
pub enum AicfError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("provider already registered: {0}")]
    AlreadyRegistered(String),

    #[error("unknown task: {0}")]
    UnknownTask(String),

    #[error("invalid status transition: {from} → {to}")]
    InvalidTransition { from: String, to: String },

    #[error("stake below capability minimum: bonded {bonded}, need {min}")]
    StakeTooLow { bonded: String, min: String },

    #[error("stake still locked until height {unlock_height}")]
    StakeLocked { unlock_height: u64 },

    #[error("attestation invalid: {0}")]
    Attestation(String),

    #[error("heartbeat signature invalid")]
    HeartbeatSignature,

    #[error("no eligible provider for task {0}")]
    NoEligibleProvider(String),

    #[error("lease not found for task {0}")]
    NoLease(String),

    #[error("lease renewal cap reached ({max})")]
    RenewalCapReached { max: u32 },

    #[error("nullifier already consumed: {0}")]
    NullifierUsed(String),

    #[error("proof claim does not match task {0}")]
    ClaimMismatch(String),

    #[error("trap ratio {got_ppm} ppm below threshold {threshold_ppm} ppm")]
    TrapRatioBelowThreshold { got_ppm: u32, threshold_ppm: u32 },

    #[error("retry cap reached ({max})")]
    RetryCapReached { max: u32 },

    #[error("job is not in a settleable state: {0}")]
    NotSettleable(String),

    #[error("payout already claimed for provider {provider} epoch {epoch}")]
    AlreadyClaimed { provider: String, epoch: u64 },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl AicfError {
    pub fn storage(e: impl std::fmt::Display) -> Self {
        AicfError::Storage(e.to_string())
    }

    pub fn ser(e: impl std::fmt::Display) -> Self {
        AicfError::Serialization(e.to_string())
    }
}
