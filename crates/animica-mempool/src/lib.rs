//! animica-mempool — admission, priority ordering, eviction.
//!
//! Many writers (RPC admission) feed one reader (the block sealer). The
//! pool holds at most `capacity` transactions ordered by `(max_fee desc,
//! arrival seq asc)`; per-account transactions leave the pool only in
//! nonce order, so a batch drawn for a block is always applyable.
//!
//! Admission errors surface to the submitter and are never persisted.

use std::collections::{BTreeMap, HashMap};

use animica_core::amount::Amount;
use animica_core::constants::MAX_TX_BYTES;
use animica_core::error::AdmissionError;
use animica_core::types::{Address, Hash32};
use animica_tx::SignedTx;
use tracing::debug;

/// Chain state the pool consults during admission. The node backs this
/// with the current head's store.
pub trait AccountView {
    fn nonce(&self, addr: &Address) -> u64;
    fn balance(&self, addr: &Address) -> Amount;
    /// Whether the tx hash is already included in a block.
    fn tx_known(&self, hash: &Hash32) -> bool;
}

#[derive(Clone, Debug)]
pub struct MempoolConfig {
    pub capacity: usize,
    pub min_fee: Amount,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            capacity: 4_096,
            min_fee: Amount::from_u64(1),
        }
    }
}

struct Entry {
    tx: SignedTx,
    seq: u64,
}

pub struct Mempool {
    config: MempoolConfig,
    chain_id: u64,
    by_hash: HashMap<Hash32, Entry>,
    /// Per-account pending txs keyed by nonce.
    by_account: BTreeMap<Address, BTreeMap<u64, Hash32>>,
    seq: u64,
}

impl Mempool {
    pub fn new(chain_id: u64, config: MempoolConfig) -> Self {
        Self {
            config,
            chain_id,
            by_hash: HashMap::new(),
            by_account: BTreeMap::new(),
            seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    pub fn contains(&self, hash: &Hash32) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn get(&self, hash: &Hash32) -> Option<&SignedTx> {
        self.by_hash.get(hash).map(|e| &e.tx)
    }

    /// Admit a decoded envelope. `raw_len` is the wire size of the
    /// submitted CBOR.
    pub fn admit(
        &mut self,
        tx: SignedTx,
        raw_len: usize,
        view: &dyn AccountView,
    ) -> Result<Hash32, AdmissionError> {
        self.admit_inner(tx, raw_len, view, true)
    }

    fn admit_inner(
        &mut self,
        tx: SignedTx,
        raw_len: usize,
        view: &dyn AccountView,
        verify_crypto: bool,
    ) -> Result<Hash32, AdmissionError> {
        if raw_len > MAX_TX_BYTES {
            return Err(AdmissionError::Oversize {
                max: MAX_TX_BYTES,
                got: raw_len,
            });
        }
        if tx.body.chain_id != self.chain_id {
            return Err(AdmissionError::ChainIdMismatch {
                expected: self.chain_id,
                got: tx.body.chain_id,
            });
        }
        if self.by_hash.contains_key(&tx.tx_hash) || view.tx_known(&tx.tx_hash) {
            return Err(AdmissionError::Duplicate(tx.tx_hash.to_hex()));
        }

        // Cryptographic checks after the cheap structural ones. Tests of
        // ordering/eviction fabricate signatures and skip them.
        if verify_crypto {
            tx.verify_address_binding()?;
            tx.verify_signature()?;
        }

        if tx.body.max_fee < self.config.min_fee {
            return Err(AdmissionError::FeeTooLow {
                min: self.config.min_fee.to_dec_string(),
                got: tx.body.max_fee.to_dec_string(),
            });
        }

        // Nonce continuity: account nonce plus already-pending txs.
        let base = view.nonce(&tx.body.from);
        let pending = self
            .by_account
            .get(&tx.body.from)
            .map(|m| m.len() as u64)
            .unwrap_or(0);
        let expected = base + pending;
        if tx.body.nonce != expected {
            return Err(AdmissionError::NonceGap {
                expected,
                got: tx.body.nonce,
            });
        }

        // The sender must afford at least the fee.
        let balance = view.balance(&tx.body.from);
        if balance < tx.body.max_fee {
            return Err(AdmissionError::InsufficientBalance {
                need: tx.body.max_fee.to_dec_string(),
                have: balance.to_dec_string(),
            });
        }

        if self.by_hash.len() >= self.config.capacity {
            self.evict_for(&tx)?;
        }

        let hash = tx.tx_hash;
        let seq = self.seq;
        self.seq += 1;
        self.by_account
            .entry(tx.body.from)
            .or_default()
            .insert(tx.body.nonce, hash);
        self.by_hash.insert(hash, Entry { tx, seq });
        debug!(tx = %hash, pool = self.by_hash.len(), "tx admitted");
        Ok(hash)
    }

    /// Draw up to `max` transactions for a block: repeatedly pick, among
    /// each account's lowest-nonce pending tx, the one with the highest
    /// priority `(max_fee desc, seq asc)`. Drawn txs stay in the pool
    /// until `mark_included`.
    pub fn next_batch(&self, max: usize) -> Vec<SignedTx> {
        let mut cursors: BTreeMap<Address, Vec<(u64, Hash32)>> = self
            .by_account
            .iter()
            .map(|(addr, txs)| (*addr, txs.iter().map(|(n, h)| (*n, *h)).collect()))
            .collect();
        let mut positions: BTreeMap<Address, usize> = BTreeMap::new();
        let mut batch = Vec::with_capacity(max.min(self.by_hash.len()));

        while batch.len() < max {
            let mut best: Option<(&Amount, u64, Address)> = None;
            for (addr, txs) in &cursors {
                let pos = positions.get(addr).copied().unwrap_or(0);
                let Some((_, hash)) = txs.get(pos) else { continue };
                let entry = &self.by_hash[hash];
                let candidate = (&entry.tx.body.max_fee, entry.seq, *addr);
                let better = match &best {
                    None => true,
                    Some((fee, seq, _)) => {
                        candidate.0 > *fee || (candidate.0 == *fee && candidate.1 < *seq)
                    }
                };
                if better {
                    best = Some(candidate);
                }
            }
            let Some((_, _, addr)) = best else { break };
            let pos = positions.entry(addr).or_insert(0);
            let (_, hash) = cursors[&addr][*pos];
            *pos += 1;
            batch.push(self.by_hash[&hash].tx.clone());
        }
        batch
    }

    /// Remove transactions that made it into a block.
    pub fn mark_included(&mut self, hashes: &[Hash32]) {
        for hash in hashes {
            self.remove(hash);
        }
    }

    /// Drop pending txs whose nonce fell behind the committed account
    /// state (e.g. after an external block applied).
    pub fn drop_stale(&mut self, view: &dyn AccountView) {
        let stale: Vec<Hash32> = self
            .by_hash
            .values()
            .filter(|e| e.tx.body.nonce < view.nonce(&e.tx.body.from))
            .map(|e| e.tx.tx_hash)
            .collect();
        for hash in stale {
            self.remove(&hash);
        }
    }

    fn remove(&mut self, hash: &Hash32) {
        if let Some(entry) = self.by_hash.remove(hash) {
            if let Some(account) = self.by_account.get_mut(&entry.tx.body.from) {
                account.remove(&entry.tx.body.nonce);
                if account.is_empty() {
                    self.by_account.remove(&entry.tx.body.from);
                }
            }
        }
    }

    /// Make room by evicting the worst-paying tx, but only if the
    /// newcomer pays strictly more. Evicting mid-sequence would strand
    /// later nonces, so eviction always takes an account's highest
    /// pending nonce.
    fn evict_for(&mut self, incoming: &SignedTx) -> Result<(), AdmissionError> {
        let victim = self
            .by_account
            .iter()
            .filter_map(|(_, txs)| txs.values().last())
            .map(|hash| &self.by_hash[hash])
            .min_by(|a, b| {
                a.tx.body
                    .max_fee
                    .cmp(&b.tx.body.max_fee)
                    .then(b.seq.cmp(&a.seq))
            })
            .map(|e| (e.tx.tx_hash, e.tx.body.max_fee.clone()));
        match victim {
            Some((hash, fee)) if incoming.body.max_fee > fee => {
                debug!(evicted = %hash, "pool full; evicting lowest-fee tx");
                self.remove(&hash);
                Ok(())
            }
            _ => Err(AdmissionError::LimitExceeded(format!(
                "pool at capacity {}",
                self.config.capacity
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use animica_core::amount::Amount;
    use animica_crypto::hash::address_from_pubkey;
    use animica_crypto::scheme::SigScheme;
    use animica_tx::{TxBody, TxKind, TxSignature};
    use std::collections::HashMap;

    struct View {
        nonces: HashMap<Address, u64>,
        balances: HashMap<Address, Amount>,
    }

    impl AccountView for View {
        fn nonce(&self, addr: &Address) -> u64 {
            self.nonces.get(addr).copied().unwrap_or(0)
        }
        fn balance(&self, addr: &Address) -> Amount {
            self.balances
                .get(addr)
                .cloned()
                .unwrap_or_else(|| Amount::from_u64(1_000_000))
        }
        fn tx_known(&self, _hash: &Hash32) -> bool {
            false
        }
    }

    fn view() -> View {
        View {
            nonces: HashMap::new(),
            balances: HashMap::new(),
        }
    }

    // Signature checks pass for a pubkey-bound from-address with a dummy
    // sig only if we skip verification, so tests use a pool with the
    // crypto checks satisfied via a real scheme-derived address and a
    // pre-verified envelope is simulated by constructing with matching
    // pubkey and testing the other admission rules around it.
    fn tx_with(pubkey_fill: u8, nonce: u64, fee: u64) -> SignedTx {
        let scheme = SigScheme::Dilithium3;
        let pubkey = vec![pubkey_fill; scheme.public_key_bytes()];
        let from = address_from_pubkey(scheme.alg_id(), &pubkey);
        let mut to = [0x22; 33];
        to[0] = 1;
        let body = TxBody {
            chain_id: 1,
            from,
            nonce,
            gas_limit: 21_000,
            max_fee: Amount::from_u64(fee),
            memo: None,
            kind: TxKind::Transfer {
                to: Address::from_bytes(to),
                value: Amount::from_u64(1),
            },
        };
        let tx_hash = animica_tx::tx_hash(&body);
        SignedTx {
            body,
            signature: TxSignature {
                scheme,
                pubkey,
                sig: vec![0; scheme.signature_bytes()],
            },
            tx_hash,
        }
    }

    impl Mempool {
        /// Admission minus the signature verify, for tests exercising
        /// ordering/eviction with fabricated signatures.
        fn admit_unchecked(
            &mut self,
            tx: SignedTx,
            view: &dyn AccountView,
        ) -> Result<Hash32, AdmissionError> {
            self.admit_inner(tx, 100, view, false)
        }
    }

    #[test]
    fn wrong_chain_id_rejected() {
        let mut pool = Mempool::new(7, MempoolConfig::default());
        let err = pool.admit(tx_with(1, 0, 10), 100, &view());
        assert!(matches!(err, Err(AdmissionError::ChainIdMismatch { expected: 7, got: 1 })));
    }

    #[test]
    fn bad_signature_rejected() {
        let mut pool = Mempool::new(1, MempoolConfig::default());
        // The fabricated zero signature cannot verify.
        let err = pool.admit(tx_with(1, 0, 10), 100, &view());
        assert!(matches!(err, Err(AdmissionError::SignatureInvalid)));
    }

    #[test]
    fn nonce_gap_rejected() {
        let mut pool = Mempool::new(1, MempoolConfig::default());
        let err = pool.admit_unchecked(tx_with(1, 3, 10), &view());
        assert!(matches!(err, Err(AdmissionError::NonceGap { expected: 0, got: 3 })));
    }

    #[test]
    fn duplicate_rejected() {
        let mut pool = Mempool::new(1, MempoolConfig::default());
        pool.admit_unchecked(tx_with(1, 0, 10), &view()).unwrap();
        let err = pool.admit_unchecked(tx_with(1, 0, 10), &view());
        assert!(matches!(err, Err(AdmissionError::Duplicate(_))));
    }

    #[test]
    fn batch_orders_by_fee_then_arrival() {
        let mut pool = Mempool::new(1, MempoolConfig::default());
        pool.admit_unchecked(tx_with(1, 0, 10), &view()).unwrap(); // low, first
        pool.admit_unchecked(tx_with(2, 0, 50), &view()).unwrap(); // high
        pool.admit_unchecked(tx_with(3, 0, 10), &view()).unwrap(); // low, later

        let batch = pool.next_batch(10);
        let fees: Vec<u64> = batch
            .iter()
            .map(|t| t.body.max_fee.to_u128().unwrap() as u64)
            .collect();
        assert_eq!(fees, vec![50, 10, 10]);
        // Tie broken by arrival order.
        assert_eq!(batch[1].tx_hash, tx_with(1, 0, 10).tx_hash);
        assert_eq!(batch[2].tx_hash, tx_with(3, 0, 10).tx_hash);
    }

    #[test]
    fn batch_keeps_per_account_nonce_order() {
        let mut pool = Mempool::new(1, MempoolConfig::default());
        // Account 1: nonce 0 pays little, nonce 1 pays a lot.
        pool.admit_unchecked(tx_with(1, 0, 5), &view()).unwrap();
        pool.admit_unchecked(tx_with(1, 1, 500), &view()).unwrap();
        pool.admit_unchecked(tx_with(2, 0, 100), &view()).unwrap();

        let batch = pool.next_batch(10);
        let order: Vec<(u8, u64)> = batch
            .iter()
            .map(|t| (t.signature.pubkey[0], t.body.nonce))
            .collect();
        // Account 2's 100-fee tx leads, then account 1 in nonce order;
        // the 500-fee tx cannot jump its own nonce 0.
        assert_eq!(order, vec![(2, 0), (1, 0), (1, 1)]);
    }

    #[test]
    fn eviction_prefers_newcomer_with_higher_fee() {
        let mut pool = Mempool::new(
            1,
            MempoolConfig {
                capacity: 2,
                min_fee: Amount::from_u64(1),
            },
        );
        pool.admit_unchecked(tx_with(1, 0, 10), &view()).unwrap();
        pool.admit_unchecked(tx_with(2, 0, 20), &view()).unwrap();

        // Lower fee than everything in the pool: rejected.
        let err = pool.admit_unchecked(tx_with(3, 0, 5), &view());
        assert!(matches!(err, Err(AdmissionError::LimitExceeded(_))));

        // Higher fee: evicts the 10-fee tx.
        pool.admit_unchecked(tx_with(4, 0, 30), &view()).unwrap();
        assert_eq!(pool.len(), 2);
        assert!(!pool.contains(&tx_with(1, 0, 10).tx_hash));
    }

    #[test]
    fn mark_included_and_drop_stale() {
        let mut pool = Mempool::new(1, MempoolConfig::default());
        let h0 = pool.admit_unchecked(tx_with(1, 0, 10), &view()).unwrap();
        pool.admit_unchecked(tx_with(1, 1, 10), &view()).unwrap();
        pool.mark_included(&[h0]);
        assert_eq!(pool.len(), 1);

        // The account's committed nonce moved past the remaining tx.
        let mut v = view();
        let from = tx_with(1, 1, 10).body.from;
        v.nonces.insert(from, 5);
        pool.drop_stale(&v);
        assert!(pool.is_empty());
    }
}
