use animica_core::types::Hash32;
use sled::Tree;

use crate::engine::BlobCommitment;
use crate::error::DaError;

/// Persistent DA store backed by sled.
///
/// Named trees:
///   da_blobs   — commitment bytes         → bincode(BlobCommitment)
///   da_shares  — commitment || linear be  → raw share bytes
///
/// Shares are append-only: nothing is mutated after commit.
pub struct DaStore {
    blobs: Tree,
    shares: Tree,
}

impl DaStore {
    /// Open the DA trees inside an existing sled database.
    pub fn open(db: &sled::Db) -> Result<Self, DaError> {
        Ok(Self {
            blobs: db.open_tree("da_blobs").map_err(DaError::storage)?,
            shares: db.open_tree("da_shares").map_err(DaError::storage)?,
        })
    }

    /// Persist a committed blob: envelope plus all extended shares.
    pub fn put_blob(
        &self,
        commitment: &BlobCommitment,
        shares: &[Vec<u8>],
    ) -> Result<(), DaError> {
        let envelope = bincode::serialize(commitment)
            .map_err(|e| DaError::Serialization(e.to_string()))?;
        self.blobs
            .insert(commitment.commitment.as_bytes(), envelope)
            .map_err(DaError::storage)?;
        for (linear, share) in shares.iter().enumerate() {
            self.shares
                .insert(share_key(&commitment.commitment, linear as u64), share.clone())
                .map_err(DaError::storage)?;
        }
        Ok(())
    }

    pub fn get_commitment(&self, commitment: &Hash32) -> Result<Option<BlobCommitment>, DaError> {
        match self
            .blobs
            .get(commitment.as_bytes())
            .map_err(DaError::storage)?
        {
            Some(bytes) => Ok(Some(
                bincode::deserialize(&bytes).map_err(|e| DaError::Serialization(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Fetch one extended share by `(commitment, linear)`.
    pub fn get_share(&self, commitment: &Hash32, linear: u64) -> Result<Option<Vec<u8>>, DaError> {
        Ok(self
            .shares
            .get(share_key(commitment, linear))
            .map_err(DaError::storage)?
            .map(|ivec| ivec.to_vec()))
    }

    /// All extended shares for a blob, in linear order.
    pub fn get_shares(&self, commitment: &BlobCommitment) -> Result<Vec<Vec<u8>>, DaError> {
        let mut out = Vec::with_capacity(commitment.num_leaves as usize);
        for linear in 0..commitment.num_leaves {
            let share = self
                .get_share(&commitment.commitment, linear)?
                .ok_or(DaError::ShareUnavailable {
                    root: commitment.commitment.to_hex(),
                    index: linear,
                })?;
            out.push(share);
        }
        Ok(out)
    }

    pub fn count_blobs(&self) -> u64 {
        self.blobs.len() as u64
    }
}

fn share_key(commitment: &Hash32, linear: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(40);
    key.extend_from_slice(commitment.as_bytes());
    key.extend_from_slice(&linear.to_be_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{reconstruct, ExtendedBlob};
    use crate::namespace::Namespace;
    use crate::params::DaParams;
    use crate::Blob;

    #[test]
    fn put_then_reconstruct_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let store = DaStore::open(&db).unwrap();

        let params = DaParams::default();
        let blob = Blob {
            namespace: Namespace::from_id(3, 8),
            data: (0..3_000u32).map(|i| (i % 255) as u8).collect(),
        };
        let ext = ExtendedBlob::extend(&blob, &params).unwrap();
        let (_, commitment) = ext.commit().unwrap();
        store.put_blob(&commitment, &ext.shares).unwrap();

        let loaded = store.get_commitment(&commitment.commitment).unwrap().unwrap();
        assert_eq!(loaded, commitment);

        let shares = store.get_shares(&loaded).unwrap();
        let available: Vec<(u64, Vec<u8>)> = shares
            .into_iter()
            .enumerate()
            .map(|(i, s)| (i as u64, s))
            .collect();
        let decoded = reconstruct(&loaded, &available, &params).unwrap();
        assert_eq!(decoded, blob.data);
    }

    #[test]
    fn unknown_commitment_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let store = DaStore::open(&db).unwrap();
        assert!(store
            .get_commitment(&Hash32::from_bytes([9; 32]))
            .unwrap()
            .is_none());
    }
}
