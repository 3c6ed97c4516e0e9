//! Block execution.
//!
//! One block at a time, transactions in index order. All writes land in
//! an in-memory overlay first; the sled trees only change in `commit`,
//! after every root checks out, so a failing block leaves no trace.
//!
//! Fee model: the sender pays `max_fee` flat once the transaction is
//! included, success or not, and the nonce advances for every processed
//! (non-`invalid`) transaction. Only `success` receipts emit state
//! changes and payable effects.

use std::collections::BTreeMap;

use animica_aicf::queue::JobStore;
use animica_aicf::task;
use animica_aicf::types::{JobKind, JobRecord, JobStatus};
use animica_codec::{encode, Value};
use animica_core::amount::Amount;
use animica_core::constants::CONTRACT_ADDR_DOMAIN;
use animica_core::error::{BlockError, ExecError};
use animica_core::types::{Address, Hash32, Timestamp};
use animica_crypto::hash::{sha3_256, sha3_256_concat};
use animica_tx::{SignedTx, TxKind};
use animica_vm::effects::Effects;
use animica_vm::exec::{execute_call, CallContext};
use animica_vm::{decode_deploy_payload, GasTable, Host, Manifest, Program};
use tracing::{info, warn};

use crate::account::Account;
use crate::block::{receipts_root, tx_root, Block, BlockHeader};
use crate::bloom::Bloom;
use crate::receipt::{EventLog, Receipt, ReceiptStatus};
use crate::store::{storage_key, ChainStore, ContractMeta};

/// Flat gas charged for a plain value transfer.
pub const TRANSFER_GAS: u64 = 21_000;

/// Deploy pricing: base plus per payload byte.
pub const DEPLOY_GAS_BASE: u64 = 50_000;
pub const DEPLOY_GAS_PER_BYTE: u64 = 5;

/// Uncommitted result of executing a block's transactions.
pub struct StagedBlock {
    pub header: BlockHeader,
    pub txs: Vec<SignedTx>,
    pub receipts: Vec<Receipt>,
    overlay: BlockOverlay,
}

#[derive(Default)]
struct BlockOverlay {
    accounts: BTreeMap<Address, Account>,
    /// Keyed by the full `contract || key` storage key.
    storage: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    contracts: BTreeMap<Address, (ContractMeta, Vec<u8>)>,
    enqueued_jobs: Vec<JobRecord>,
    consumed_results: Vec<Hash32>,
}

pub struct Executor<'a> {
    pub store: &'a ChainStore,
    pub jobs: &'a JobStore,
    pub gas: &'a GasTable,
    pub chain_id: u64,
}

impl<'a> Executor<'a> {
    pub fn new(store: &'a ChainStore, jobs: &'a JobStore, gas: &'a GasTable, chain_id: u64) -> Self {
        Self {
            store,
            jobs,
            gas,
            chain_id,
        }
    }

    /// Execute `txs` on top of the current head, producing a staged block
    /// ready to commit.
    pub fn execute_block(
        &self,
        parent_hash: Hash32,
        height: u64,
        timestamp: Timestamp,
        beacon_round: u64,
        txs: Vec<SignedTx>,
        da_root: Hash32,
    ) -> Result<StagedBlock, BlockError> {
        let mut overlay = BlockOverlay::default();
        let mut receipts = Vec::with_capacity(txs.len());
        let mut bloom = Bloom::default();

        for (index, tx) in txs.iter().enumerate() {
            let receipt = self.process_tx(&mut overlay, tx, height, timestamp, index as u32);
            for log in &receipt.logs {
                bloom.add(log.address.as_bytes());
                for topic in &log.topics {
                    bloom.add(topic.as_bytes());
                }
            }
            receipts.push(receipt);
        }

        let state_root = self.state_root(&overlay)?;
        let digests: Vec<Hash32> = receipts.iter().map(Receipt::digest).collect();
        let header = BlockHeader {
            chain_id: self.chain_id,
            height,
            parent_hash,
            timestamp,
            tx_root: tx_root(&txs),
            state_root,
            receipts_root: receipts_root(&digests),
            da_root,
            logs_bloom: bloom,
            beacon_round,
        };
        Ok(StagedBlock {
            header,
            txs,
            receipts,
            overlay,
        })
    }

    /// Commit a staged block: overlay, AICF side effects, block,
    /// receipts, head pointer.
    pub fn commit(&self, mut staged: StagedBlock) -> Result<Block, BlockError> {
        let block = Block {
            header: staged.header.clone(),
            txs: std::mem::take(&mut staged.txs),
        };
        let block_hash = block.hash();

        for (addr, account) in &staged.overlay.accounts {
            self.store.put_account(addr, account)?;
        }
        for (key, value) in &staged.overlay.storage {
            let (contract, raw_key) = split_storage_key(key);
            self.store.storage_put(&contract, raw_key, value.as_deref())?;
        }
        for (addr, (meta, program_bytes)) in &staged.overlay.contracts {
            self.store.put_contract(addr, meta, program_bytes)?;
        }
        for job in &staged.overlay.enqueued_jobs {
            self.jobs
                .enqueue(job.clone())
                .map_err(|e| BlockError::Storage(e.to_string()))?;
        }
        for task_id in &staged.overlay.consumed_results {
            self.jobs
                .mark_result_consumed(task_id)
                .map_err(|e| BlockError::Storage(e.to_string()))?;
        }

        for receipt in &mut staged.receipts {
            receipt.block_hash = block_hash;
        }
        self.store.put_block(&block, &staged.receipts)?;
        self.store.flush()?;
        info!(height = block.header.height, hash = %block_hash, txs = block.txs.len(), "block committed");
        Ok(block)
    }

    /// Apply an externally delivered block: re-execute and compare every
    /// root before committing. Any mismatch rejects the block.
    pub fn apply_external(&self, block: Block) -> Result<Block, BlockError> {
        let head = self.store.head_block()?;
        let (parent_hash, expected_height) = match &head {
            Some(h) => (h.hash(), h.header.height + 1),
            None => (Hash32::ZERO, 0),
        };
        if block.header.parent_hash != parent_hash {
            return Err(BlockError::UnknownParent(block.header.parent_hash.to_hex()));
        }
        if block.header.height != expected_height {
            return Err(BlockError::HeightGap {
                head: expected_height,
                block: block.header.height,
            });
        }
        let staged = self.execute_block(
            parent_hash,
            block.header.height,
            block.header.timestamp,
            block.header.beacon_round,
            block.txs,
            block.header.da_root,
        )?;
        if staged.header.state_root != block.header.state_root {
            return Err(BlockError::StateRootMismatch {
                header: block.header.state_root.to_hex(),
                computed: staged.header.state_root.to_hex(),
            });
        }
        if staged.header.receipts_root != block.header.receipts_root {
            return Err(BlockError::InvalidProofEnvelope(format!(
                "receipts root mismatch at height {}",
                block.header.height
            )));
        }
        self.commit(staged)
    }

    // ── Single transaction ───────────────────────────────────────────────────

    fn process_tx(
        &self,
        overlay: &mut BlockOverlay,
        tx: &SignedTx,
        height: u64,
        timestamp: Timestamp,
        index: u32,
    ) -> Receipt {
        let mut receipt = Receipt {
            tx_hash: tx.tx_hash,
            block_hash: Hash32::ZERO,
            block_height: height,
            index,
            status: ReceiptStatus::Invalid,
            gas_used: 0,
            return_data: None,
            contract_address: None,
            logs: Vec::new(),
            error: None,
        };

        // Inclusion-time validation; failures here change no state.
        if tx.body.chain_id != self.chain_id {
            receipt.error = Some("chain id mismatch".into());
            return receipt;
        }
        let mut sender = self.account(overlay, &tx.body.from);
        if sender.nonce != tx.body.nonce {
            receipt.error = Some(format!(
                "nonce mismatch: account {}, tx {}",
                sender.nonce, tx.body.nonce
            ));
            return receipt;
        }
        let fee = tx.body.max_fee.clone();
        let Some(after_fee) = sender.balance.checked_sub(&fee) else {
            receipt.error = Some("balance below fee".into());
            return receipt;
        };

        // Fee and nonce apply to every included transaction from here on.
        sender.balance = after_fee;
        sender.nonce += 1;
        overlay.accounts.insert(tx.body.from, sender);

        match &tx.body.kind {
            TxKind::Transfer { to, value } => {
                self.process_transfer(overlay, tx, *to, value, &mut receipt);
            }
            TxKind::Call { to, data, value } => {
                self.process_call(
                    overlay, tx, *to, data, value, height, timestamp, index, &mut receipt,
                );
            }
            TxKind::Deploy { code, init } => {
                self.process_deploy(
                    overlay,
                    tx,
                    code,
                    init.as_deref(),
                    height,
                    timestamp,
                    index,
                    &mut receipt,
                );
            }
        }
        receipt
    }

    fn process_transfer(
        &self,
        overlay: &mut BlockOverlay,
        tx: &SignedTx,
        to: Address,
        value: &Amount,
        receipt: &mut Receipt,
    ) {
        if tx.body.gas_limit < TRANSFER_GAS {
            receipt.status = ReceiptStatus::OutOfGas;
            receipt.gas_used = tx.body.gas_limit;
            return;
        }
        receipt.gas_used = TRANSFER_GAS;
        let mut sender = self.account(overlay, &tx.body.from);
        let Some(remaining) = sender.balance.checked_sub(value) else {
            receipt.status = ReceiptStatus::Failed;
            receipt.error = Some("balance below transfer value".into());
            return;
        };
        sender.balance = remaining;
        overlay.accounts.insert(tx.body.from, sender);
        let mut dest = self.account(overlay, &to);
        dest.balance = dest.balance + value.clone();
        overlay.accounts.insert(to, dest);
        receipt.status = ReceiptStatus::Success;
    }

    #[allow(clippy::too_many_arguments)]
    fn process_call(
        &self,
        overlay: &mut BlockOverlay,
        tx: &SignedTx,
        to: Address,
        data: &[u8],
        value: &Amount,
        height: u64,
        timestamp: Timestamp,
        index: u32,
        receipt: &mut Receipt,
    ) {
        let Some((manifest, program)) = self.load_contract(overlay, &to) else {
            receipt.status = ReceiptStatus::Failed;
            receipt.error = Some(format!("no contract at {to}"));
            return;
        };
        let ctx = CallContext {
            chain_id: self.chain_id,
            height,
            tx_hash: tx.tx_hash,
            call_index: index,
            caller: tx.body.from,
            contract: to,
            value: value.clone(),
            gas_limit: tx.body.gas_limit,
        };
        let host = OverlayHost {
            executor: self,
            overlay,
            height,
            tx_hash: tx.tx_hash,
        };
        let outcome = execute_call(&host, self.gas, &ctx, &manifest, &program, data);
        receipt.gas_used = outcome.gas_used;
        let (status, error) = Receipt::status_of(&outcome.status);
        receipt.status = status;
        receipt.error = error;
        receipt.return_data = outcome.return_data;
        if receipt.status == ReceiptStatus::Success {
            receipt.logs = outcome.events.into_iter().map(EventLog::from).collect();
            self.merge_effects(overlay, outcome.effects, tx, height, timestamp);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn process_deploy(
        &self,
        overlay: &mut BlockOverlay,
        tx: &SignedTx,
        code: &[u8],
        init: Option<&[u8]>,
        height: u64,
        timestamp: Timestamp,
        index: u32,
        receipt: &mut Receipt,
    ) {
        let deploy_gas = DEPLOY_GAS_BASE + DEPLOY_GAS_PER_BYTE * code.len() as u64;
        if tx.body.gas_limit < deploy_gas {
            receipt.status = ReceiptStatus::OutOfGas;
            receipt.gas_used = tx.body.gas_limit;
            return;
        }
        receipt.gas_used = deploy_gas;

        let (manifest, program) = match decode_deploy_payload(code) {
            Ok(pair) => pair,
            Err(e) => {
                receipt.status = ReceiptStatus::Failed;
                receipt.error = Some(e.to_string());
                return;
            }
        };
        let contract_addr = contract_address(&tx.body.from, tx.body.nonce);
        if self.load_contract(overlay, &contract_addr).is_some() {
            receipt.status = ReceiptStatus::Failed;
            receipt.error = Some("contract address collision".into());
            return;
        }
        let program_bytes = program.encode();
        let meta = ContractMeta {
            manifest: manifest.clone(),
            code_hash: Hash32::from_bytes(sha3_256(&program_bytes)),
            deployer: tx.body.from,
            deployed_height: height,
        };
        overlay
            .contracts
            .insert(contract_addr, (meta, program_bytes));
        receipt.contract_address = Some(contract_addr);

        if let Some(init_data) = init {
            let gas_left = tx.body.gas_limit - deploy_gas;
            let ctx = CallContext {
                chain_id: self.chain_id,
                height,
                tx_hash: tx.tx_hash,
                call_index: index,
                caller: tx.body.from,
                contract: contract_addr,
                value: Amount::zero(),
                gas_limit: gas_left,
            };
            let host = OverlayHost {
                executor: self,
                overlay,
                height,
                tx_hash: tx.tx_hash,
            };
            let outcome = execute_call(&host, self.gas, &ctx, &manifest, &program, init_data);
            receipt.gas_used += outcome.gas_used;
            let (status, error) = Receipt::status_of(&outcome.status);
            if status != ReceiptStatus::Success {
                // A failed constructor voids the deployment.
                overlay.contracts.remove(&contract_addr);
                receipt.contract_address = None;
                receipt.status = status;
                receipt.error = error;
                return;
            }
            receipt.logs = outcome.events.into_iter().map(EventLog::from).collect();
            self.merge_effects(overlay, outcome.effects, tx, height, timestamp);
        }
        receipt.status = ReceiptStatus::Success;
    }

    // ── Effects & overlay plumbing ───────────────────────────────────────────

    fn merge_effects(
        &self,
        overlay: &mut BlockOverlay,
        effects: Effects,
        tx: &SignedTx,
        height: u64,
        timestamp: Timestamp,
    ) {
        for write in effects.storage_writes {
            overlay
                .storage
                .insert(storage_key(&write.contract, &write.key), write.value);
        }
        for transfer in effects.transfers {
            let mut from = self.account(overlay, &transfer.from);
            match from.balance.checked_sub(&transfer.amount) {
                Some(rest) => from.balance = rest,
                None => {
                    // The VM validated spendable balances against this
                    // same overlay; hitting this means a logic error, not
                    // a user error.
                    warn!(from = %transfer.from, "transfer debit exceeds balance at merge");
                    continue;
                }
            }
            overlay.accounts.insert(transfer.from, from);
            let mut to = self.account(overlay, &transfer.to);
            to.balance = to.balance + transfer.amount.clone();
            overlay.accounts.insert(transfer.to, to);
        }
        for enqueue in effects.enqueues {
            let kind = JobKind::from_name(&enqueue.kind).unwrap_or(JobKind::Ai);
            let task_id = task::task_id(
                self.chain_id,
                height,
                &tx.tx_hash,
                &enqueue.caller,
                &enqueue.payload,
            );
            overlay.enqueued_jobs.push(JobRecord {
                task_id,
                kind,
                request: enqueue.payload,
                caller: enqueue.caller,
                enqueue_height: height,
                enqueued_at: timestamp,
                priority_score: 0,
                status: JobStatus::Queued,
                lease: None,
                provider_id: None,
                retries: 0,
                updated_at: timestamp,
            });
        }
        overlay.consumed_results.extend(effects.consumed_results);
    }

    fn account(&self, overlay: &BlockOverlay, addr: &Address) -> Account {
        if let Some(acc) = overlay.accounts.get(addr) {
            return acc.clone();
        }
        self.store.get_account(addr).unwrap_or_default()
    }

    fn load_contract(
        &self,
        overlay: &BlockOverlay,
        addr: &Address,
    ) -> Option<(Manifest, Program)> {
        if let Some((meta, bytes)) = overlay.contracts.get(addr) {
            let program = Program::decode(bytes).ok()?;
            return Some((meta.manifest.clone(), program));
        }
        let meta = self.store.get_contract(addr).ok()??;
        let bytes = self.store.get_program(&meta.code_hash).ok()??;
        let program = Program::decode(&bytes).ok()?;
        Some((meta.manifest, program))
    }

    /// Deterministic commitment over the post-block state: every account,
    /// contract, and storage entry, in key order, merged with the
    /// overlay.
    fn state_root(&self, overlay: &BlockOverlay) -> Result<Hash32, BlockError> {
        let mut accounts: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        for item in self.store.accounts.iter() {
            let (k, v) = item.map_err(BlockError::storage)?;
            accounts.insert(k.to_vec(), v.to_vec());
        }
        for (addr, account) in &overlay.accounts {
            accounts.insert(
                addr.as_bytes().to_vec(),
                bincode::serialize(account).map_err(|e| BlockError::Serialization(e.to_string()))?,
            );
        }

        let mut storage: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        for item in self.store.contract_storage.iter() {
            let (k, v) = item.map_err(BlockError::storage)?;
            storage.insert(k.to_vec(), v.to_vec());
        }
        for (key, value) in &overlay.storage {
            match value {
                Some(v) => {
                    storage.insert(key.clone(), v.clone());
                }
                None => {
                    storage.remove(key);
                }
            }
        }

        let mut contracts: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        for item in self.store.contracts.iter() {
            let (k, v) = item.map_err(BlockError::storage)?;
            contracts.insert(k.to_vec(), v.to_vec());
        }
        for (addr, (meta, _)) in &overlay.contracts {
            contracts.insert(
                addr.as_bytes().to_vec(),
                bincode::serialize(meta).map_err(|e| BlockError::Serialization(e.to_string()))?,
            );
        }

        let mut entries = Vec::new();
        for (domain, map) in [
            ("accounts", &accounts),
            ("storage", &storage),
            ("contracts", &contracts),
        ] {
            let mut items = Vec::with_capacity(map.len());
            for (k, v) in map {
                items.push(Value::Array(vec![
                    Value::Bytes(k.clone()),
                    Value::Bytes(v.clone()),
                ]));
            }
            entries.push((Value::Text(domain.to_string()), Value::Array(items)));
        }
        let bytes = encode(&Value::Map(entries))
            .map_err(|e| BlockError::Serialization(e.to_string()))?;
        Ok(Hash32::from_bytes(sha3_256(&bytes)))
    }
}

/// Read-only host view over store + block overlay for one transaction.
struct OverlayHost<'e, 'a, 'b> {
    executor: &'e Executor<'a>,
    overlay: &'b BlockOverlay,
    height: u64,
    tx_hash: Hash32,
}

impl Host for OverlayHost<'_, '_, '_> {
    fn storage_get(&self, contract: &Address, key: &[u8]) -> Result<Option<Vec<u8>>, ExecError> {
        if let Some(staged) = self.overlay.storage.get(&storage_key(contract, key)) {
            return Ok(staged.clone());
        }
        self.executor
            .store
            .storage_get(contract, key)
            .map_err(|e| ExecError::Revert(e.to_string()))
    }

    fn balance(&self, addr: &Address) -> Result<Amount, ExecError> {
        Ok(self.executor.account(self.overlay, addr).balance)
    }

    fn contract(&self, addr: &Address) -> Result<Option<(Manifest, Program)>, ExecError> {
        Ok(self.executor.load_contract(self.overlay, addr))
    }

    fn aicf_result(&self, task_id: &Hash32) -> Result<Option<Vec<u8>>, ExecError> {
        self.executor
            .jobs
            .get_output(task_id, self.height)
            .map_err(|e| ExecError::Revert(e.to_string()))
    }

    fn aicf_result_consumed(&self, task_id: &Hash32) -> Result<bool, ExecError> {
        if self.overlay.consumed_results.contains(task_id) {
            return Ok(true);
        }
        match self
            .executor
            .jobs
            .get_result(task_id)
            .map_err(|e| ExecError::Revert(e.to_string()))?
        {
            Some(result) => Ok(result.consumed),
            None => Ok(false),
        }
    }

    fn aicf_task_id(&self, caller: &Address, kind: &str, payload: &[u8]) -> Hash32 {
        let _ = kind;
        task::task_id(
            self.executor.chain_id,
            self.height,
            &self.tx_hash,
            caller,
            payload,
        )
    }
}

/// Contract address: `0x00 || SHA3-256("animica:contract" || deployer ||
/// nonce_be)`.
pub fn contract_address(deployer: &Address, nonce: u64) -> Address {
    let digest = sha3_256_concat(&[
        CONTRACT_ADDR_DOMAIN,
        deployer.as_bytes(),
        &nonce.to_be_bytes(),
    ]);
    let mut raw = [0u8; 33];
    raw[0] = animica_core::constants::CONTRACT_ALG_ID;
    raw[1..].copy_from_slice(&digest);
    Address::from_bytes(raw)
}

fn split_storage_key(full: &[u8]) -> (Address, &[u8]) {
    let mut addr = [0u8; 33];
    addr.copy_from_slice(&full[..33]);
    (Address::from_bytes(addr), &full[33..])
}
