use animica_core::error::ExecError;
use serde::{Deserialize, Serialize};

/// Pinned per-operation gas prices. The defaults are the devnet schedule;
/// every network ships its own table in genesis params and all nodes must
/// agree byte for byte.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasTable {
    // Core
    pub const_op: u64,
    pub move_op: u64,
    pub add: u64,
    pub sub: u64,
    pub mul: u64,
    pub div: u64,
    pub modulo: u64,
    pub cmp: u64,
    pub jump: u64,
    pub jumpi: u64,
    // Bytes / ABI
    pub len: u64,
    pub concat_base: u64,
    pub concat_per_byte: u64,
    pub slice_base: u64,
    pub slice_per_byte: u64,
    pub enc_base: u64,
    pub enc_per_byte: u64,
    pub dec_base: u64,
    pub dec_per_byte: u64,
    // Hashing: base + slope per started 64-byte block
    pub sha3_256_base: u64,
    pub sha3_256_per_64b: u64,
    pub sha3_512_base: u64,
    pub sha3_512_per_64b: u64,
    pub keccak_base: u64,
    pub keccak_per_64b: u64,
    // Events
    pub event_base: u64,
    pub event_flat: u64,
    pub event_per_byte: u64,
    // Storage
    pub storage_get_base: u64,
    pub storage_get_per_key_byte: u64,
    pub storage_get_per_val_byte: u64,
    pub storage_set_base: u64,
    pub storage_set_per_key_byte: u64,
    pub storage_set_per_val_byte: u64,
    pub storage_del_base: u64,
    pub storage_del_per_key_byte: u64,
    // Treasury
    pub transfer: u64,
    // Capability surface (AICF enqueue / result read)
    pub cap_call_base: u64,
    pub cap_per_byte: u64,
    // Misc
    pub call_base: u64,
    pub env_read: u64,
    pub rand: u64,
}

impl Default for GasTable {
    fn default() -> Self {
        Self {
            const_op: 2,
            move_op: 2,
            add: 5,
            sub: 5,
            mul: 8,
            div: 12,
            modulo: 12,
            cmp: 4,
            jump: 6,
            jumpi: 8,
            len: 2,
            concat_base: 15,
            concat_per_byte: 1,
            slice_base: 12,
            slice_per_byte: 1,
            enc_base: 20,
            enc_per_byte: 1,
            dec_base: 25,
            dec_per_byte: 2,
            sha3_256_base: 30,
            sha3_256_per_64b: 6,
            sha3_512_base: 36,
            sha3_512_per_64b: 10,
            keccak_base: 24,
            keccak_per_64b: 6,
            event_base: 40,
            event_flat: 6,
            event_per_byte: 1,
            storage_get_base: 80,
            storage_get_per_key_byte: 1,
            storage_get_per_val_byte: 1,
            storage_set_base: 160,
            storage_set_per_key_byte: 1,
            storage_set_per_val_byte: 2,
            storage_del_base: 120,
            storage_del_per_key_byte: 1,
            transfer: 200,
            cap_call_base: 500,
            cap_per_byte: 2,
            call_base: 40,
            env_read: 2,
            rand: 10,
        }
    }
}

impl GasTable {
    /// Hash cost: base plus slope per started 64-byte block.
    pub fn hash_cost(&self, base: u64, per_64b: u64, input_len: usize) -> u64 {
        base + per_64b * (input_len as u64).div_ceil(64)
    }
}

/// Debit meter for one call. Exhaustion raises `OutOfGas`, which reverts
/// the entire call atomically.
#[derive(Debug)]
pub struct GasMeter {
    limit: u64,
    used: u64,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    pub fn charge(&mut self, amount: u64) -> Result<(), ExecError> {
        let next = self.used.saturating_add(amount);
        if next > self.limit {
            self.used = self.limit;
            return Err(ExecError::OutOfGas);
        }
        self.used = next;
        Ok(())
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn remaining(&self) -> u64 {
        self.limit - self.used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meter_debits_and_trips() {
        let mut meter = GasMeter::new(10);
        meter.charge(4).unwrap();
        meter.charge(6).unwrap();
        assert_eq!(meter.used(), 10);
        assert!(matches!(meter.charge(1), Err(ExecError::OutOfGas)));
        // Exhaustion pins used at the limit for the receipt.
        assert_eq!(meter.used(), 10);
    }

    #[test]
    fn hash_cost_rounds_up_blocks() {
        let t = GasTable::default();
        assert_eq!(t.hash_cost(30, 6, 0), 30);
        assert_eq!(t.hash_cost(30, 6, 1), 36);
        assert_eq!(t.hash_cost(30, 6, 64), 36);
        assert_eq!(t.hash_cost(30, 6, 65), 42);
    }
}
