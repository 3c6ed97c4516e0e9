//! Buffered call effects.
//!
//! Nothing the VM does touches real state directly: storage writes,
//! treasury transfers, AICF enqueues, and result consumptions accumulate
//! here and the execution layer applies them only when the whole call
//! commits. Any failure discards the buffer, which is the call-level
//! atomicity the receipt semantics require.

use animica_core::amount::Amount;
use animica_core::error::ExecError;
use animica_core::types::{Address, Hash32};
use std::collections::BTreeMap;

use crate::host::Host;

/// One staged storage mutation (`None` value = delete).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageWrite {
    pub contract: Address,
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
}

/// One staged treasury movement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferEffect {
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
}

/// One staged AICF job enqueue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnqueueEffect {
    pub caller: Address,
    /// `"ai"` or `"quantum"`.
    pub kind: String,
    pub payload: Vec<u8>,
}

#[derive(Default, Debug)]
pub struct Effects {
    pub storage_writes: Vec<StorageWrite>,
    pub transfers: Vec<TransferEffect>,
    pub enqueues: Vec<EnqueueEffect>,
    pub consumed_results: Vec<Hash32>,
    /// Read-your-writes overlay over host storage.
    overlay: BTreeMap<(Address, Vec<u8>), Option<Vec<u8>>>,
    /// Net pending debits per account, to validate transfers.
    debits: BTreeMap<Address, Amount>,
    credits: BTreeMap<Address, Amount>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage read through the overlay.
    pub fn storage_get(
        &self,
        host: &dyn Host,
        contract: &Address,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>, ExecError> {
        if let Some(staged) = self.overlay.get(&(*contract, key.to_vec())) {
            return Ok(staged.clone());
        }
        host.storage_get(contract, key)
    }

    pub fn storage_set(&mut self, contract: Address, key: Vec<u8>, value: Vec<u8>) {
        self.overlay
            .insert((contract, key.clone()), Some(value.clone()));
        self.storage_writes.push(StorageWrite {
            contract,
            key,
            value: Some(value),
        });
    }

    pub fn storage_delete(&mut self, contract: Address, key: Vec<u8>) {
        self.overlay.insert((contract, key.clone()), None);
        self.storage_writes.push(StorageWrite {
            contract,
            key,
            value: None,
        });
    }

    /// Stage a transfer, validating spendable balance through the host
    /// plus pending credits minus pending debits.
    pub fn transfer(
        &mut self,
        host: &dyn Host,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), ExecError> {
        let base = host.balance(&from)?;
        let credited = self.credits.get(&from).cloned().unwrap_or_else(Amount::zero);
        let debited = self.debits.get(&from).cloned().unwrap_or_else(Amount::zero);
        let spendable = (base + credited)
            .checked_sub(&debited)
            .unwrap_or_else(Amount::zero);
        if spendable.checked_sub(&amount).is_none() {
            return Err(ExecError::Revert(format!(
                "insufficient balance: need {amount}, spendable {spendable}"
            )));
        }
        *self.debits.entry(from).or_insert_with(Amount::zero) += &amount;
        *self.credits.entry(to).or_insert_with(Amount::zero) += &amount;
        self.transfers.push(TransferEffect { from, to, amount });
        Ok(())
    }

    pub fn enqueue(&mut self, caller: Address, kind: String, payload: Vec<u8>) {
        self.enqueues.push(EnqueueEffect {
            caller,
            kind,
            payload,
        });
    }

    pub fn consume_result(&mut self, task_id: Hash32) -> Result<(), ExecError> {
        if self.consumed_results.contains(&task_id) {
            return Err(ExecError::AlreadyConsumed(task_id.to_hex()));
        }
        self.consumed_results.push(task_id);
        Ok(())
    }

}
