use animica_core::amount::Amount;
use animica_core::types::{Address, ChainId, Gas, Nonce};
use serde::{Deserialize, Serialize};

/// The operation a transaction performs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    /// Move `value` from the sender to `to`.
    Transfer { to: Address, value: Amount },

    /// Invoke a deployed contract with opaque ABI call data.
    Call {
        to: Address,
        data: Vec<u8>,
        value: Amount,
    },

    /// Deploy a contract package (canonical CBOR: manifest + program).
    Deploy {
        code: Vec<u8>,
        init: Option<Vec<u8>>,
    },
}

impl TxKind {
    pub fn name(&self) -> &'static str {
        match self {
            TxKind::Transfer { .. } => "transfer",
            TxKind::Call { .. } => "call",
            TxKind::Deploy { .. } => "deploy",
        }
    }
}

/// An unsigned transaction body. Immutable after construction; the
/// signed envelope carries it unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxBody {
    pub chain_id: ChainId,
    pub from: Address,
    /// Strictly increasing per account; enforced at admission and apply.
    pub nonce: Nonce,
    pub gas_limit: Gas,
    /// Flat fee ceiling the sender is willing to pay.
    pub max_fee: Amount,
    /// Optional human-readable memo (consensus cap in `animica-core`).
    pub memo: Option<String>,
    pub kind: TxKind,
}
