use thiserror::Error;

/// Tier 1: rejected before admission. Surfaced to the submitter over RPC,
/// never persisted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("invalid CBOR: {0}")]
    InvalidCbor(String),

    #[error("unknown envelope tag: {0}")]
    UnknownTag(String),

    #[error("non-canonical encoding: {0}")]
    NonCanonical(String),

    #[error("chain id mismatch: expected {expected}, got {got}")]
    ChainIdMismatch { expected: u64, got: u64 },

    #[error("invalid signature")]
    SignatureInvalid,

    #[error("unknown signature scheme: {0}")]
    UnknownScheme(String),

    #[error("public key does not match sender address")]
    PubkeyMismatch,

    #[error("oversize: {got} bytes exceeds limit {max}")]
    Oversize { max: usize, got: usize },

    #[error("nonce gap: expected {expected}, got {got}")]
    NonceGap { expected: u64, got: u64 },

    #[error("fee too low: minimum {min}, got {got}")]
    FeeTooLow { min: String, got: String },

    #[error("duplicate transaction: {0}")]
    Duplicate(String),

    #[error("insufficient balance: need {need}, have {have}")]
    InsufficientBalance { need: String, have: String },

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),
}

/// Tier 2: recorded at execution level. Captured in the receipt `status`
/// (and `error` text); all state written by the call is rolled back.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error("revert: {0}")]
    Revert(String),

    #[error("out of gas")]
    OutOfGas,

    #[error("non-deterministic operation: {0}")]
    NotDeterministic(String),

    #[error("attestation invalid: {0}")]
    AttestationError(String),

    #[error("no result available yet for task {0}")]
    NoResultYet(String),

    #[error("result already consumed for task {0}")]
    AlreadyConsumed(String),

    #[error("step limit exceeded")]
    StepLimit,

    #[error("call depth limit exceeded")]
    DepthLimit,

    #[error("capacity cap exceeded: {0}")]
    CapExceeded(String),

    #[error("invalid program: {0}")]
    InvalidProgram(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("unknown function selector")]
    UnknownSelector,

    #[error("unknown contract: {0}")]
    UnknownContract(String),

    #[error("arithmetic error: {0}")]
    Arithmetic(String),
}

/// Tier 3: fatal at block level. The block is rejected outright; never
/// auto-retried.
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("DA root mismatch: header {header}, computed {computed}")]
    DaRootMismatch { header: String, computed: String },

    #[error("state root mismatch: header {header}, computed {computed}")]
    StateRootMismatch { header: String, computed: String },

    #[error("invalid proof envelope in block: {0}")]
    InvalidProofEnvelope(String),

    #[error("nullifier replay: {0}")]
    NullifierReplay(String),

    #[error("unknown parent block: {0}")]
    UnknownParent(String),

    #[error("non-contiguous height: head {head}, block {block}")]
    HeightGap { head: u64, block: u64 },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl BlockError {
    pub fn storage(e: impl std::fmt::Display) -> Self {
        BlockError::Storage(e.to_string())
    }
}
