use animica_core::amount::Amount;
use animica_core::error::BlockError;
use animica_core::types::{Address, Hash32};
use animica_vm::Manifest;
use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::block::Block;
use crate::receipt::Receipt;

/// Deployed contract metadata (code bytes live under `contract_code`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractMeta {
    pub manifest: Manifest,
    pub code_hash: Hash32,
    pub deployer: Address,
    pub deployed_height: u64,
}

/// Persistent chain state backed by sled.
///
/// Named trees:
///   accounts         — address bytes            → bincode(Account)
///   contracts        — address bytes            → bincode(ContractMeta)
///   contract_code    — code hash bytes          → raw program bytes
///   contract_storage — address || key           → raw value bytes
///   blocks           — block hash bytes         → bincode(Block)
///   block_heights    — height be                → block hash bytes
///   receipts         — tx hash bytes            → bincode(Receipt)
///   tx_locations     — tx hash bytes            → (block hash, index) be
///   meta             — utf8 key                 → raw bytes
pub struct ChainStore {
    pub(crate) accounts: sled::Tree,
    pub(crate) contracts: sled::Tree,
    pub(crate) contract_code: sled::Tree,
    pub(crate) contract_storage: sled::Tree,
    blocks: sled::Tree,
    block_heights: sled::Tree,
    receipts: sled::Tree,
    tx_locations: sled::Tree,
    meta: sled::Tree,
    db: sled::Db,
}

const META_HEAD: &str = "head_hash";

impl ChainStore {
    pub fn open(db: sled::Db) -> Result<Self, BlockError> {
        Ok(Self {
            accounts: db.open_tree("accounts").map_err(BlockError::storage)?,
            contracts: db.open_tree("contracts").map_err(BlockError::storage)?,
            contract_code: db.open_tree("contract_code").map_err(BlockError::storage)?,
            contract_storage: db
                .open_tree("contract_storage")
                .map_err(BlockError::storage)?,
            blocks: db.open_tree("blocks").map_err(BlockError::storage)?,
            block_heights: db.open_tree("block_heights").map_err(BlockError::storage)?,
            receipts: db.open_tree("receipts").map_err(BlockError::storage)?,
            tx_locations: db.open_tree("tx_locations").map_err(BlockError::storage)?,
            meta: db.open_tree("meta").map_err(BlockError::storage)?,
            db,
        })
    }

    /// The shared sled handle (DA and AICF trees live in the same db).
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    // ── Accounts ─────────────────────────────────────────────────────────────

    pub fn get_account(&self, addr: &Address) -> Result<Account, BlockError> {
        match self
            .accounts
            .get(addr.as_bytes())
            .map_err(BlockError::storage)?
        {
            Some(bytes) => bincode::deserialize(&bytes)
                .map_err(|e| BlockError::Serialization(e.to_string())),
            None => Ok(Account::default()),
        }
    }

    pub fn put_account(&self, addr: &Address, account: &Account) -> Result<(), BlockError> {
        self.accounts
            .insert(
                addr.as_bytes(),
                bincode::serialize(account).map_err(|e| BlockError::Serialization(e.to_string()))?,
            )
            .map_err(BlockError::storage)?;
        Ok(())
    }

    pub fn balance(&self, addr: &Address) -> Result<Amount, BlockError> {
        Ok(self.get_account(addr)?.balance)
    }

    // ── Contracts ────────────────────────────────────────────────────────────

    pub fn get_contract(&self, addr: &Address) -> Result<Option<ContractMeta>, BlockError> {
        match self
            .contracts
            .get(addr.as_bytes())
            .map_err(BlockError::storage)?
        {
            Some(bytes) => Ok(Some(
                bincode::deserialize(&bytes)
                    .map_err(|e| BlockError::Serialization(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    pub fn put_contract(
        &self,
        addr: &Address,
        meta: &ContractMeta,
        program_bytes: &[u8],
    ) -> Result<(), BlockError> {
        self.contracts
            .insert(
                addr.as_bytes(),
                bincode::serialize(meta).map_err(|e| BlockError::Serialization(e.to_string()))?,
            )
            .map_err(BlockError::storage)?;
        self.contract_code
            .insert(meta.code_hash.as_bytes(), program_bytes)
            .map_err(BlockError::storage)?;
        Ok(())
    }

    pub fn get_program(&self, code_hash: &Hash32) -> Result<Option<Vec<u8>>, BlockError> {
        Ok(self
            .contract_code
            .get(code_hash.as_bytes())
            .map_err(BlockError::storage)?
            .map(|ivec| ivec.to_vec()))
    }

    // ── Contract storage ─────────────────────────────────────────────────────

    pub fn storage_get(
        &self,
        contract: &Address,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>, BlockError> {
        Ok(self
            .contract_storage
            .get(storage_key(contract, key))
            .map_err(BlockError::storage)?
            .map(|ivec| ivec.to_vec()))
    }

    pub fn storage_put(
        &self,
        contract: &Address,
        key: &[u8],
        value: Option<&[u8]>,
    ) -> Result<(), BlockError> {
        let k = storage_key(contract, key);
        match value {
            Some(v) => {
                self.contract_storage
                    .insert(k, v)
                    .map_err(BlockError::storage)?;
            }
            None => {
                self.contract_storage
                    .remove(k)
                    .map_err(BlockError::storage)?;
            }
        }
        Ok(())
    }

    // ── Blocks, receipts, lookups ────────────────────────────────────────────

    pub fn put_block(&self, block: &Block, receipts: &[Receipt]) -> Result<(), BlockError> {
        let hash = block.hash();
        self.blocks
            .insert(
                hash.as_bytes(),
                bincode::serialize(block).map_err(|e| BlockError::Serialization(e.to_string()))?,
            )
            .map_err(BlockError::storage)?;
        self.block_heights
            .insert(block.header.height.to_be_bytes(), hash.as_bytes().as_slice())
            .map_err(BlockError::storage)?;
        for receipt in receipts {
            self.receipts
                .insert(
                    receipt.tx_hash.as_bytes(),
                    bincode::serialize(receipt)
                        .map_err(|e| BlockError::Serialization(e.to_string()))?,
                )
                .map_err(BlockError::storage)?;
            let mut loc = hash.as_bytes().to_vec();
            loc.extend_from_slice(&receipt.index.to_be_bytes());
            self.tx_locations
                .insert(receipt.tx_hash.as_bytes(), loc)
                .map_err(BlockError::storage)?;
        }
        self.meta
            .insert(META_HEAD, hash.as_bytes().as_slice())
            .map_err(BlockError::storage)?;
        Ok(())
    }

    pub fn head_hash(&self) -> Result<Option<Hash32>, BlockError> {
        Ok(self
            .meta
            .get(META_HEAD)
            .map_err(BlockError::storage)?
            .map(|ivec| {
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&ivec);
                Hash32::from_bytes(arr)
            }))
    }

    pub fn head_block(&self) -> Result<Option<Block>, BlockError> {
        match self.head_hash()? {
            Some(hash) => self.get_block(&hash),
            None => Ok(None),
        }
    }

    pub fn get_block(&self, hash: &Hash32) -> Result<Option<Block>, BlockError> {
        match self.blocks.get(hash.as_bytes()).map_err(BlockError::storage)? {
            Some(bytes) => Ok(Some(
                bincode::deserialize(&bytes)
                    .map_err(|e| BlockError::Serialization(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    pub fn get_block_by_height(&self, height: u64) -> Result<Option<Block>, BlockError> {
        match self
            .block_heights
            .get(height.to_be_bytes())
            .map_err(BlockError::storage)?
        {
            Some(ivec) => {
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&ivec);
                self.get_block(&Hash32::from_bytes(arr))
            }
            None => Ok(None),
        }
    }

    pub fn get_receipt(&self, tx_hash: &Hash32) -> Result<Option<Receipt>, BlockError> {
        match self
            .receipts
            .get(tx_hash.as_bytes())
            .map_err(BlockError::storage)?
        {
            Some(bytes) => Ok(Some(
                bincode::deserialize(&bytes)
                    .map_err(|e| BlockError::Serialization(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Locate a transaction: `(block, index)`.
    pub fn get_tx_location(&self, tx_hash: &Hash32) -> Result<Option<(Hash32, u32)>, BlockError> {
        Ok(self
            .tx_locations
            .get(tx_hash.as_bytes())
            .map_err(BlockError::storage)?
            .map(|ivec| {
                let mut hash = [0u8; 32];
                hash.copy_from_slice(&ivec[..32]);
                let mut idx = [0u8; 4];
                idx.copy_from_slice(&ivec[32..36]);
                (Hash32::from_bytes(hash), u32::from_be_bytes(idx))
            }))
    }

    pub fn tx_exists(&self, tx_hash: &Hash32) -> bool {
        self.tx_locations
            .contains_key(tx_hash.as_bytes())
            .unwrap_or(false)
    }

    pub fn flush(&self) -> Result<(), BlockError> {
        self.db.flush().map_err(BlockError::storage)?;
        Ok(())
    }
}

pub(crate) fn storage_key(contract: &Address, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(33 + key.len());
    out.extend_from_slice(contract.as_bytes());
    out.extend_from_slice(key);
    out
}
