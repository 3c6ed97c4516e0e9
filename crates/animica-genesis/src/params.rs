use animica_aicf::attest::AttestPolicy;
use animica_aicf::params::AicfParams;
use animica_beacon::round::BeaconParams;
use animica_core::amount::Amount;
use animica_core::types::{Address, Hash32};
use animica_crypto::hash::sha3_256;
use animica_crypto::scheme::SigScheme;
use animica_da::DaParams;
use animica_vm::GasTable;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenesisError {
    #[error("reading params file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parsing params JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid params: {0}")]
    Invalid(String),
}

/// Pinned byte widths per signature scheme. Validated at startup against
/// the compiled `pqcrypto` parameter sets so a mis-built binary cannot
/// silently accept off-size keys.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigParam {
    pub scheme: SigScheme,
    pub public_key_bytes: usize,
    pub signature_bytes: usize,
}

/// Mempool sizing (converted into the pool's config at boot).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MempoolParams {
    pub capacity: usize,
    pub min_fee: Amount,
}

/// One genesis balance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// bech32m `anim1…` address.
    pub address: String,
    pub amount: Amount,
}

impl Allocation {
    pub fn address(&self) -> Result<Address, GenesisError> {
        Address::from_bech32m(&self.address)
            .map_err(|e| GenesisError::Invalid(format!("allocation address: {e}")))
    }
}

/// The complete pinned network configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkParams {
    pub chain_id: u64,
    pub sig_params: Vec<SigParam>,
    pub gas: GasTable,
    pub da: DaParams,
    pub aicf: AicfParams,
    pub attest: AttestPolicy,
    pub beacon: BeaconParams,
    pub mempool: MempoolParams,
    /// Target seconds between sealed blocks.
    pub block_interval_secs: u64,
    pub allocations: Vec<Allocation>,
}

impl NetworkParams {
    /// Local development defaults: chain id 1, small windows, and a
    /// single faucet allocation derived from a well-known seed tag.
    pub fn devnet() -> Self {
        let faucet = {
            // Deterministic devnet faucet address (not a real key hash).
            let digest = sha3_256(b"animica:devnet:faucet");
            let mut raw = [0u8; 33];
            raw[0] = SigScheme::Dilithium3.alg_id();
            raw[1..].copy_from_slice(&digest);
            Address::from_bytes(raw)
        };
        Self {
            chain_id: 1,
            sig_params: vec![
                SigParam {
                    scheme: SigScheme::Dilithium3,
                    public_key_bytes: SigScheme::Dilithium3.public_key_bytes(),
                    signature_bytes: SigScheme::Dilithium3.signature_bytes(),
                },
                SigParam {
                    scheme: SigScheme::SphincsShake128s,
                    public_key_bytes: SigScheme::SphincsShake128s.public_key_bytes(),
                    signature_bytes: SigScheme::SphincsShake128s.signature_bytes(),
                },
            ],
            gas: GasTable::default(),
            da: DaParams::default(),
            aicf: AicfParams::default(),
            attest: AttestPolicy {
                pinned_roots: vec![Hash32::from_bytes(sha3_256(b"animica:devnet:attest-root"))],
                allowed_measurements: vec![Hash32::from_bytes(sha3_256(
                    b"animica:devnet:measurement",
                ))],
                max_age_secs: 86_400,
            },
            beacon: BeaconParams::default(),
            mempool: MempoolParams {
                capacity: 4_096,
                min_fee: Amount::from_u64(1),
            },
            block_interval_secs: 2,
            allocations: vec![Allocation {
                address: faucet.to_bech32m(),
                amount: Amount::from_dec_str("1000000000000000000").expect("literal"),
            }],
        }
    }

    pub fn load(path: &Path) -> Result<Self, GenesisError> {
        let json = std::fs::read_to_string(path)?;
        let params: NetworkParams = serde_json::from_str(&json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), GenesisError> {
        if self.sig_params.is_empty() {
            return Err(GenesisError::Invalid("no signature schemes pinned".into()));
        }
        for pin in &self.sig_params {
            if pin.public_key_bytes != pin.scheme.public_key_bytes()
                || pin.signature_bytes != pin.scheme.signature_bytes()
            {
                return Err(GenesisError::Invalid(format!(
                    "pinned sizes for {} disagree with the compiled parameter set",
                    pin.scheme.name()
                )));
            }
        }
        self.da
            .validate()
            .map_err(|e| GenesisError::Invalid(e.to_string()))?;
        let split = self.aicf.split_provider_bp as u32
            + self.aicf.split_miner_bp as u32
            + self.aicf.split_fund_bp as u32;
        if split != 10_000 {
            return Err(GenesisError::Invalid(format!(
                "AICF split must sum to 10000 bp, got {split}"
            )));
        }
        if self.beacon.commit_window_blocks == 0 || self.beacon.reveal_window_blocks == 0 {
            return Err(GenesisError::Invalid("beacon windows must be positive".into()));
        }
        for allocation in &self.allocations {
            allocation.address()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_json_roundtrip() {
        let params = NetworkParams::devnet();
        let json = serde_json::to_string_pretty(&params).unwrap();
        let back: NetworkParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn mismatched_sig_pin_is_rejected() {
        let mut params = NetworkParams::devnet();
        params.sig_params[0].signature_bytes = 1234;
        assert!(params.validate().is_err());
    }

    #[test]
    fn broken_split_is_rejected() {
        let mut params = NetworkParams::devnet();
        params.aicf.split_fund_bp = 9_999;
        assert!(params.validate().is_err());
    }
}
