use animica_core::types::{Address, Hash32};
use animica_vm::exec::{CallStatus, VmEvent};
use serde::{Deserialize, Serialize};

/// Terminal status recorded for every processed transaction. Only
/// `Success` emits state changes and payable effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Success,
    Revert,
    OutOfGas,
    Invalid,
    Failed,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Success => "success",
            ReceiptStatus::Revert => "revert",
            ReceiptStatus::OutOfGas => "out_of_gas",
            ReceiptStatus::Invalid => "invalid",
            ReceiptStatus::Failed => "failed",
        }
    }
}

/// One emitted event in a receipt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    pub address: Address,
    pub name: String,
    /// Canonical args bytes.
    pub data: Vec<u8>,
    pub topics: Vec<Hash32>,
    pub index: u32,
}

impl From<VmEvent> for EventLog {
    fn from(ev: VmEvent) -> Self {
        Self {
            address: ev.address,
            name: ev.name,
            data: ev.data,
            topics: ev.topics,
            index: ev.index,
        }
    }
}

/// Execution receipt, one per included transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: Hash32,
    pub block_hash: Hash32,
    pub block_height: u64,
    pub index: u32,
    pub status: ReceiptStatus,
    pub gas_used: u64,
    pub return_data: Option<Vec<u8>>,
    pub contract_address: Option<Address>,
    pub logs: Vec<EventLog>,
    pub error: Option<String>,
}

impl Receipt {
    /// Map a VM call status into `(status, error)`.
    pub fn status_of(call: &CallStatus) -> (ReceiptStatus, Option<String>) {
        match call {
            CallStatus::Success => (ReceiptStatus::Success, None),
            CallStatus::Revert(msg) => (ReceiptStatus::Revert, Some(msg.clone())),
            CallStatus::OutOfGas => (ReceiptStatus::OutOfGas, None),
            CallStatus::Failed(err) => (ReceiptStatus::Failed, Some(err.clone())),
        }
    }

    /// Content hash folded into the receipts root.
    pub fn digest(&self) -> Hash32 {
        let bytes = bincode::serialize(self).expect("receipt serializes");
        Hash32::from_bytes(animica_crypto::hash::sha3_256(&bytes))
    }
}
