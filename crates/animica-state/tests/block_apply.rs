//! Block application tests: transfers, deploys, calls, receipt ordering,
//! and all-or-nothing commit semantics.

use animica_aicf::queue::JobStore;
use animica_core::amount::Amount;
use animica_core::types::{Address, Hash32};
use animica_crypto::scheme::SigScheme;
use animica_state::exec::{contract_address, Executor, TRANSFER_GAS};
use animica_state::{Account, ChainStore, ReceiptStatus};
use animica_tx::{SignedTx, TxBody, TxKind, TxSignature};
use animica_vm::abi::{encode_calldata, selector};
use animica_vm::ir::{Instr, Program};
use animica_vm::manifest::{AbiEntry, Manifest, Resources};
use animica_vm::value::VmValue;
use animica_vm::{encode_deploy_payload, GasTable};
use num_bigint::BigInt;

fn addr(fill: u8) -> Address {
    let mut raw = [fill; 33];
    raw[0] = 1;
    Address::from_bytes(raw)
}

/// Envelope with a placeholder signature: the executor trusts admission
/// to have verified signatures, so block tests can fabricate them.
fn signed(body: TxBody) -> SignedTx {
    let tx_hash = animica_tx::tx_hash(&body);
    SignedTx {
        body,
        signature: TxSignature {
            scheme: SigScheme::Dilithium3,
            pubkey: vec![0; SigScheme::Dilithium3.public_key_bytes()],
            sig: vec![0; SigScheme::Dilithium3.signature_bytes()],
        },
        tx_hash,
    }
}

fn transfer(from: Address, to: Address, value: u64, nonce: u64) -> SignedTx {
    signed(TxBody {
        chain_id: 1,
        from,
        nonce,
        gas_limit: TRANSFER_GAS,
        max_fee: Amount::from_u64(1_000),
        memo: None,
        kind: TxKind::Transfer {
            to,
            value: Amount::from_u64(value),
        },
    })
}

struct Harness {
    _dir: tempfile::TempDir,
    store: ChainStore,
    jobs: JobStore,
    gas: GasTable,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let store = ChainStore::open(db).unwrap();
        let jobs = JobStore::open(store.db()).unwrap();
        Self {
            _dir: dir,
            store,
            jobs,
            gas: GasTable::default(),
        }
    }

    fn executor(&self) -> Executor<'_> {
        Executor::new(&self.store, &self.jobs, &self.gas, 1)
    }

    fn fund(&self, addr: &Address, amount: u64) {
        self.store
            .put_account(
                addr,
                &Account {
                    balance: Amount::from_u64(amount),
                    nonce: 0,
                },
            )
            .unwrap();
    }
}

#[test]
fn transfer_block_moves_value_and_tracks_nonce() {
    let h = Harness::new();
    let alice = addr(0xA1);
    let bob = addr(0xB1);
    h.fund(&alice, 1_000_000);

    let executor = h.executor();
    let staged = executor
        .execute_block(
            Hash32::ZERO,
            0,
            1_700_000_000,
            0,
            vec![
                transfer(alice, bob, 1_000, 0),
                transfer(alice, bob, 500, 1),
            ],
            Hash32::ZERO,
        )
        .unwrap();
    let block = executor.commit(staged).unwrap();

    assert_eq!(block.header.height, 0);
    let bob_acc = h.store.get_account(&bob).unwrap();
    assert_eq!(bob_acc.balance, Amount::from_u64(1_500));
    let alice_acc = h.store.get_account(&alice).unwrap();
    // 1500 value + 2 × 1000 fee.
    assert_eq!(alice_acc.balance, Amount::from_u64(1_000_000 - 1_500 - 2_000));
    assert_eq!(alice_acc.nonce, 2);

    // Receipts share inclusion order and are findable by hash.
    let r0 = h.store.get_receipt(&block.txs[0].tx_hash).unwrap().unwrap();
    assert_eq!(r0.index, 0);
    assert_eq!(r0.status, ReceiptStatus::Success);
    assert_eq!(r0.gas_used, TRANSFER_GAS);
    assert_eq!(r0.block_hash, block.hash());
}

#[test]
fn nonce_gap_is_invalid_and_stateless() {
    let h = Harness::new();
    let alice = addr(0xA2);
    let bob = addr(0xB2);
    h.fund(&alice, 10_000);

    let executor = h.executor();
    // Nonce 5 against an account at nonce 0.
    let staged = executor
        .execute_block(
            Hash32::ZERO,
            0,
            1,
            0,
            vec![transfer(alice, bob, 100, 5)],
            Hash32::ZERO,
        )
        .unwrap();
    assert_eq!(staged.receipts[0].status, ReceiptStatus::Invalid);
    let block = executor.commit(staged).unwrap();
    assert_eq!(block.txs.len(), 1);

    // No fee, no nonce bump, no value moved.
    let alice_acc = h.store.get_account(&alice).unwrap();
    assert_eq!(alice_acc.balance, Amount::from_u64(10_000));
    assert_eq!(alice_acc.nonce, 0);
    assert!(h.store.get_account(&bob).unwrap().balance.is_zero());
}

#[test]
fn duplicate_nonce_in_same_block_invalidates_second() {
    let h = Harness::new();
    let alice = addr(0xA3);
    let bob = addr(0xB3);
    h.fund(&alice, 100_000);

    let executor = h.executor();
    let staged = executor
        .execute_block(
            Hash32::ZERO,
            0,
            1,
            0,
            vec![
                transfer(alice, bob, 100, 0),
                transfer(alice, bob, 100, 0),
            ],
            Hash32::ZERO,
        )
        .unwrap();
    assert_eq!(staged.receipts[0].status, ReceiptStatus::Success);
    assert_eq!(staged.receipts[1].status, ReceiptStatus::Invalid);
}

fn counter_deploy_payload() -> Vec<u8> {
    let manifest = Manifest {
        name: "counter".into(),
        version: "1.0.0".into(),
        abi: vec![AbiEntry {
            name: "inc".into(),
            signature: "inc()->".into(),
        }],
        caps: vec![],
        resources: Resources::default(),
    };
    let program = Program {
        entries: vec![(selector("inc()->"), 0)],
        code: vec![
            Instr::Const(0, VmValue::Bytes(b"count".to_vec())),
            Instr::SGet(1, 0),
            Instr::Len(2, 1),
            Instr::Const(3, VmValue::Int(BigInt::from(0))),
            Instr::Eq(4, 2, 3),
            Instr::JumpI(4, 8),
            Instr::Dec(5, 1, animica_vm::value::TypeTag::Int),
            Instr::Jump(9),
            Instr::Const(5, VmValue::Int(BigInt::from(0))),
            Instr::Const(6, VmValue::Int(BigInt::from(1))),
            Instr::Add(7, 5, 6),
            Instr::Enc(8, 7),
            Instr::SSet(0, 8),
            Instr::Const(9, VmValue::Bytes(b"value".to_vec())),
            Instr::EvArg(9, 7),
            Instr::Const(10, VmValue::Bytes(b"Inc".to_vec())),
            Instr::Emit(10),
            Instr::RetUnit,
        ],
    };
    encode_deploy_payload(&manifest, &program)
}

#[test]
fn deploy_then_call_emits_event_and_persists_storage() {
    let h = Harness::new();
    let alice = addr(0xA4);
    h.fund(&alice, 100_000_000);

    let executor = h.executor();
    let payload = counter_deploy_payload();
    let deploy = signed(TxBody {
        chain_id: 1,
        from: alice,
        nonce: 0,
        gas_limit: 10_000_000,
        max_fee: Amount::from_u64(1_000),
        memo: None,
        kind: TxKind::Deploy {
            code: payload,
            init: None,
        },
    });
    let expected_addr = contract_address(&alice, 0);

    let staged = executor
        .execute_block(Hash32::ZERO, 0, 1, 0, vec![deploy], Hash32::ZERO)
        .unwrap();
    assert_eq!(staged.receipts[0].status, ReceiptStatus::Success);
    assert_eq!(staged.receipts[0].contract_address, Some(expected_addr));
    let genesis = executor.commit(staged).unwrap();

    // Call inc() in the next block.
    let call = signed(TxBody {
        chain_id: 1,
        from: alice,
        nonce: 1,
        gas_limit: 100_000,
        max_fee: Amount::from_u64(1_000),
        memo: None,
        kind: TxKind::Call {
            to: expected_addr,
            data: encode_calldata("inc()->", &[]).unwrap(),
            value: Amount::zero(),
        },
    });
    let staged = executor
        .execute_block(genesis.hash(), 1, 2, 0, vec![call], Hash32::ZERO)
        .unwrap();
    let receipt = &staged.receipts[0];
    assert_eq!(receipt.status, ReceiptStatus::Success);
    assert_eq!(receipt.logs.len(), 1);
    assert_eq!(receipt.logs[0].name, "Inc");
    assert_eq!(
        receipt.logs[0].data,
        vec![0x01, 0x05, 0x76, 0x61, 0x6C, 0x75, 0x65, 0x01, 0x01]
    );
    // The block header bloom carries the event topics.
    assert!(staged
        .header
        .logs_bloom
        .contains(receipt.logs[0].topics[0].as_bytes()));
    let block = executor.commit(staged).unwrap();

    // Storage survived the commit.
    let stored = h.store.storage_get(&expected_addr, b"count").unwrap().unwrap();
    assert_eq!(stored, vec![0x01, 0x01]); // ABI int 1
    assert_eq!(block.header.height, 1);
}

#[test]
fn identical_blocks_produce_identical_roots() {
    let build = || {
        let h = Harness::new();
        let alice = addr(0xA5);
        h.fund(&alice, 1_000_000);
        let executor = h.executor();
        let staged = executor
            .execute_block(
                Hash32::ZERO,
                0,
                42,
                0,
                vec![transfer(alice, addr(0xB5), 777, 0)],
                Hash32::ZERO,
            )
            .unwrap();
        (staged.header.state_root, staged.header.receipts_root, staged.header.hash())
    };
    assert_eq!(build(), build());
}

#[test]
fn external_block_with_wrong_state_root_is_rejected() {
    let h = Harness::new();
    let alice = addr(0xA6);
    h.fund(&alice, 1_000_000);
    let executor = h.executor();

    let staged = executor
        .execute_block(
            Hash32::ZERO,
            0,
            1,
            0,
            vec![transfer(alice, addr(0xB6), 1, 0)],
            Hash32::ZERO,
        )
        .unwrap();
    let mut block = animica_state::Block {
        header: staged.header.clone(),
        txs: staged.txs.clone(),
    };
    block.header.state_root = Hash32::from_bytes([0xBA; 32]);
    assert!(executor.apply_external(block).is_err());
    // Nothing committed.
    assert!(h.store.head_hash().unwrap().is_none());
}
