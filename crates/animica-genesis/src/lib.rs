//! animica-genesis — pinned network parameters and genesis application.
//!
//! Everything a network could retune lives here, loaded from a JSON
//! params file at first boot and treated as immutable afterwards. In
//! production the file comes from a published network release; devnets
//! fall back to `NetworkParams::devnet()`.

pub mod params;

pub use params::{Allocation, GenesisError, MempoolParams, NetworkParams, SigParam};

use animica_core::error::BlockError;
use animica_state::{Account, ChainStore};
use tracing::info;

/// Write the genesis allocations into a fresh store. The caller seals
/// block 0 through the normal executor path afterwards.
pub fn apply_genesis(store: &ChainStore, params: &NetworkParams) -> Result<(), BlockError> {
    for allocation in &params.allocations {
        let address = allocation
            .address()
            .map_err(|e| BlockError::Serialization(e.to_string()))?;
        store.put_account(
            &address,
            &Account {
                balance: allocation.amount.clone(),
                nonce: 0,
            },
        )?;
        info!(%address, amount = %allocation.amount, "genesis allocation");
    }
    store.flush()?;
    Ok(())
}
