//! JSON-RPC error-code map.

use animica_beacon::BeaconError;
use animica_core::error::AdmissionError;
use jsonrpsee::types::ErrorObject;

// Generic JSON-RPC codes are produced by jsonrpsee itself
// (-32600/-32601/-32602/-32603); -32000 is our generic server error.
pub const SERVER_ERROR: i32 = -32000;
pub const RATE_LIMITED: i32 = -32001;

// Transactions / blocks: -32010..-32020
pub const INVALID_TX: i32 = -32010;
pub const CHAIN_ID_MISMATCH: i32 = -32011;
pub const SIGNATURE_INVALID: i32 = -32012;
pub const FEE_TOO_LOW: i32 = -32013;
pub const NONCE_GAP: i32 = -32014;
pub const OVERSIZE: i32 = -32015;
pub const DUPLICATE: i32 = -32016;
pub const INSUFFICIENT_BALANCE: i32 = -32017;
pub const UNKNOWN_BLOCK: i32 = -32018;
pub const POOL_LIMIT: i32 = -32019;
pub const UNKNOWN_TX: i32 = -32020;

// DA: -32030..-32031
pub const UNKNOWN_BLOB: i32 = -32030;
pub const DA_PROOF_INVALID: i32 = -32031;

// AICF: -32041..-32042
pub const UNKNOWN_PROVIDER: i32 = -32041;
pub const UNKNOWN_TASK: i32 = -32042;

// Randomness: -32051..-32053
pub const COMMIT_TOO_LATE: i32 = -32051;
pub const REVEAL_TOO_EARLY: i32 = -32052;
pub const REVEAL_MISMATCH: i32 = -32053;

// Capabilities: -32061..-32063
pub const CAP_UNSUPPORTED: i32 = -32061;
pub const CAP_QUOTA: i32 = -32062;
pub const CAP_PAYLOAD: i32 = -32063;

pub fn err(code: i32, msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned(code, msg.into(), None::<()>)
}

/// Map an admission failure onto its pinned wire code.
pub fn admission_error(e: AdmissionError) -> ErrorObject<'static> {
    let code = match &e {
        AdmissionError::InvalidCbor(_)
        | AdmissionError::UnknownTag(_)
        | AdmissionError::NonCanonical(_) => INVALID_TX,
        AdmissionError::ChainIdMismatch { .. } => CHAIN_ID_MISMATCH,
        AdmissionError::SignatureInvalid
        | AdmissionError::UnknownScheme(_)
        | AdmissionError::PubkeyMismatch => SIGNATURE_INVALID,
        AdmissionError::FeeTooLow { .. } => FEE_TOO_LOW,
        AdmissionError::NonceGap { .. } => NONCE_GAP,
        AdmissionError::Oversize { .. } => OVERSIZE,
        AdmissionError::Duplicate(_) => DUPLICATE,
        AdmissionError::InsufficientBalance { .. } => INSUFFICIENT_BALANCE,
        AdmissionError::LimitExceeded(_) => POOL_LIMIT,
    };
    err(code, e.to_string())
}

/// Map a beacon failure onto its pinned wire code.
pub fn beacon_error(e: BeaconError) -> ErrorObject<'static> {
    let code = match &e {
        BeaconError::CommitTooLate { .. } | BeaconError::AlreadyCommitted => COMMIT_TOO_LATE,
        BeaconError::RevealTooEarly { .. } => REVEAL_TOO_EARLY,
        BeaconError::RevealTooLate { .. }
        | BeaconError::RevealMismatch
        | BeaconError::UnknownCommit => REVEAL_MISMATCH,
        BeaconError::NotFinalized(_) => SERVER_ERROR,
    };
    err(code, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_codes_match_pinned_ranges() {
        let cases = [
            (AdmissionError::InvalidCbor("x".into()), INVALID_TX),
            (
                AdmissionError::ChainIdMismatch { expected: 1, got: 2 },
                CHAIN_ID_MISMATCH,
            ),
            (AdmissionError::SignatureInvalid, SIGNATURE_INVALID),
            (
                AdmissionError::FeeTooLow {
                    min: "1".into(),
                    got: "0".into(),
                },
                FEE_TOO_LOW,
            ),
            (AdmissionError::NonceGap { expected: 0, got: 2 }, NONCE_GAP),
            (AdmissionError::Oversize { max: 1, got: 2 }, OVERSIZE),
            (AdmissionError::Duplicate("h".into()), DUPLICATE),
        ];
        for (error, code) in cases {
            assert_eq!(admission_error(error).code(), code);
        }
    }
}
