use animica_core::types::Hash32;
use animica_crypto::hash::{sha3_256, sha3_256_concat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;

use crate::vdf::Vdf;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BeaconError {
    #[error("commit window closed at height {closes_at}")]
    CommitTooLate { closes_at: u64 },

    #[error("reveal window opens at height {opens_at}")]
    RevealTooEarly { opens_at: u64 },

    #[error("reveal window closed at height {closes_at}")]
    RevealTooLate { closes_at: u64 },

    #[error("reveal does not match the committed hashes")]
    RevealMismatch,

    #[error("no commitment with this salt hash in the current round")]
    UnknownCommit,

    #[error("this salt hash is already committed this round")]
    AlreadyCommitted,

    #[error("round {0} is not finalized")]
    NotFinalized(u64),
}

/// Network-pinned round timing and VDF difficulty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconParams {
    pub commit_window_blocks: u64,
    pub reveal_window_blocks: u64,
    pub vdf_iters: u64,
}

impl Default for BeaconParams {
    fn default() -> Self {
        Self {
            commit_window_blocks: 10,
            reveal_window_blocks: 10,
            vdf_iters: 10_000,
        }
    }
}

/// Where a round currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    Commit,
    Reveal,
    Finalized,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct CommitRecord {
    payload_hash: Hash32,
    revealed: bool,
}

/// Finalized beacon output for one round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconOutput {
    pub round: u64,
    pub randomness: Hash32,
    /// VDF input, so any party can re-verify the output.
    pub vdf_input: Hash32,
    pub reveals: u32,
    pub finalized_at_height: u64,
}

/// RPC-facing snapshot of the current round.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoundView {
    pub round: u64,
    pub phase: RoundPhase,
    pub commit_closes_at: u64,
    pub reveal_opens_at: u64,
    pub reveal_closes_at: u64,
    pub commits: u32,
    pub reveals: u32,
}

const AGG_DOMAIN: &[u8] = b"animica:beacon:agg/v1";

/// The beacon state machine. A commitment is identified by its salt
/// hash (the protocol carries no participant identity at this layer);
/// the reveal proves knowledge of both preimages. Single writer (the
/// sealer loop), snapshot readers.
pub struct Beacon {
    params: BeaconParams,
    round: u64,
    round_start: u64,
    /// Commitments keyed by salt hash; BTreeMap iteration gives the
    /// deterministic aggregation order.
    commits: BTreeMap<Hash32, CommitRecord>,
    finalized: BTreeMap<u64, BeaconOutput>,
}

impl Beacon {
    pub fn new(params: BeaconParams, start_height: u64) -> Self {
        Self {
            params,
            round: 0,
            round_start: start_height,
            commits: BTreeMap::new(),
            finalized: BTreeMap::new(),
        }
    }

    pub fn params(&self) -> &BeaconParams {
        &self.params
    }

    pub fn current_round(&self) -> u64 {
        self.round
    }

    fn commit_closes_at(&self) -> u64 {
        self.round_start + self.params.commit_window_blocks
    }

    fn reveal_closes_at(&self) -> u64 {
        self.commit_closes_at() + self.params.reveal_window_blocks
    }

    pub fn phase(&self, height: u64) -> RoundPhase {
        if height < self.commit_closes_at() {
            RoundPhase::Commit
        } else if height < self.reveal_closes_at() {
            RoundPhase::Reveal
        } else {
            RoundPhase::Finalized
        }
    }

    pub fn view(&self, height: u64) -> RoundView {
        RoundView {
            round: self.round,
            phase: self.phase(height),
            commit_closes_at: self.commit_closes_at(),
            reveal_opens_at: self.commit_closes_at(),
            reveal_closes_at: self.reveal_closes_at(),
            commits: self.commits.len() as u32,
            reveals: self.commits.values().filter(|c| c.revealed).count() as u32,
        }
    }

    /// Publish a commitment during the commit window.
    pub fn commit(
        &mut self,
        salt_hash: Hash32,
        payload_hash: Hash32,
        height: u64,
    ) -> Result<(), BeaconError> {
        if height >= self.commit_closes_at() {
            return Err(BeaconError::CommitTooLate {
                closes_at: self.commit_closes_at(),
            });
        }
        if self.commits.contains_key(&salt_hash) {
            return Err(BeaconError::AlreadyCommitted);
        }
        self.commits.insert(
            salt_hash,
            CommitRecord {
                payload_hash,
                revealed: false,
            },
        );
        Ok(())
    }

    /// Reveal the preimages once the reveal window is open.
    pub fn reveal(&mut self, salt: &[u8], payload: &[u8], height: u64) -> Result<(), BeaconError> {
        if height < self.commit_closes_at() {
            return Err(BeaconError::RevealTooEarly {
                opens_at: self.commit_closes_at(),
            });
        }
        if height >= self.reveal_closes_at() {
            return Err(BeaconError::RevealTooLate {
                closes_at: self.reveal_closes_at(),
            });
        }
        let salt_hash = Hash32::from_bytes(sha3_256(salt));
        let record = self
            .commits
            .get_mut(&salt_hash)
            .ok_or(BeaconError::UnknownCommit)?;
        if record.revealed {
            return Err(BeaconError::RevealMismatch);
        }
        if Hash32::from_bytes(sha3_256(payload)) != record.payload_hash {
            return Err(BeaconError::RevealMismatch);
        }
        record.revealed = true;
        Ok(())
    }

    /// Called once per sealed block. Finalizes the round when its reveal
    /// window has closed and opens the next one. Returns the output on
    /// the finalizing call.
    pub fn on_height(&mut self, height: u64, vdf: &dyn Vdf) -> Option<BeaconOutput> {
        if height < self.reveal_closes_at() {
            return None;
        }
        // Aggregate revealed commitments in salt-hash order; an empty
        // round still finalizes so consumers always have output.
        let mut preimage = AGG_DOMAIN.to_vec();
        preimage.extend_from_slice(&self.round.to_be_bytes());
        let mut reveals = 0u32;
        for (salt_hash, record) in &self.commits {
            if !record.revealed {
                continue;
            }
            reveals += 1;
            preimage.extend_from_slice(salt_hash.as_bytes());
            preimage.extend_from_slice(record.payload_hash.as_bytes());
        }
        let vdf_input = sha3_256_concat(&[&preimage]);
        let randomness = vdf.evaluate(&vdf_input, self.params.vdf_iters);

        let output = BeaconOutput {
            round: self.round,
            randomness: Hash32::from_bytes(randomness),
            vdf_input: Hash32::from_bytes(vdf_input),
            reveals,
            finalized_at_height: height,
        };
        info!(round = self.round, reveals = output.reveals, "beacon round finalized");
        self.finalized.insert(self.round, output.clone());

        self.round += 1;
        self.round_start = height;
        self.commits.clear();
        Some(output)
    }

    pub fn get_output(&self, round: u64) -> Result<&BeaconOutput, BeaconError> {
        self.finalized
            .get(&round)
            .ok_or(BeaconError::NotFinalized(round))
    }

    pub fn latest_output(&self) -> Option<&BeaconOutput> {
        self.finalized.values().next_back()
    }

    /// Current shuffle seed for the matcher: latest finalized randomness,
    /// or a genesis constant before the first round closes.
    pub fn current_seed(&self) -> Hash32 {
        self.latest_output()
            .map(|o| o.randomness)
            .unwrap_or_else(|| Hash32::from_bytes(sha3_256(b"animica:beacon:genesis")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vdf::IteratedSha3Vdf;

    fn beacon() -> Beacon {
        Beacon::new(
            BeaconParams {
                commit_window_blocks: 10,
                reveal_window_blocks: 10,
                vdf_iters: 16,
            },
            0,
        )
    }

    fn hashes(salt: &[u8], payload: &[u8]) -> (Hash32, Hash32) {
        (
            Hash32::from_bytes(sha3_256(salt)),
            Hash32::from_bytes(sha3_256(payload)),
        )
    }

    #[test]
    fn commit_reveal_finalize_happy_path() {
        let mut b = beacon();
        let (sh, ph) = hashes(b"salt-1", b"payload-1");
        b.commit(sh, ph, 3).unwrap();
        b.reveal(b"salt-1", b"payload-1", 12).unwrap();

        let out = b.on_height(20, &IteratedSha3Vdf).unwrap();
        assert_eq!(out.round, 0);
        assert_eq!(out.reveals, 1);
        assert!(IteratedSha3Vdf.verify(out.vdf_input.as_bytes(), 16, out.randomness.as_bytes()));
        // Next round opened.
        assert_eq!(b.current_round(), 1);
        assert_eq!(b.current_seed(), out.randomness);
    }

    #[test]
    fn late_commit_rejected() {
        let mut b = beacon();
        let err = b.commit(Hash32::ZERO, Hash32::ZERO, 10);
        assert_eq!(err, Err(BeaconError::CommitTooLate { closes_at: 10 }));
    }

    #[test]
    fn early_reveal_rejected() {
        let mut b = beacon();
        let (sh, ph) = hashes(b"s", b"p");
        b.commit(sh, ph, 0).unwrap();
        let err = b.reveal(b"s", b"p", 9);
        assert_eq!(err, Err(BeaconError::RevealTooEarly { opens_at: 10 }));
    }

    #[test]
    fn wrong_preimage_rejected() {
        let mut b = beacon();
        let (sh, ph) = hashes(b"s", b"p");
        b.commit(sh, ph, 0).unwrap();
        assert_eq!(b.reveal(b"s", b"other", 11), Err(BeaconError::RevealMismatch));
        // An unknown salt is its own error.
        assert_eq!(
            b.reveal(b"mystery", b"p", 11),
            Err(BeaconError::UnknownCommit)
        );
    }

    #[test]
    fn unrevealed_commit_does_not_aggregate() {
        let run = |reveal: bool| {
            let mut b = beacon();
            let (sh, ph) = hashes(b"s", b"p");
            b.commit(sh, ph, 0).unwrap();
            if reveal {
                b.reveal(b"s", b"p", 11).unwrap();
            }
            b.on_height(20, &IteratedSha3Vdf).unwrap()
        };
        let with = run(true);
        let without = run(false);
        assert_eq!(with.reveals, 1);
        assert_eq!(without.reveals, 0);
        assert_ne!(with.randomness, without.randomness);
    }

    #[test]
    fn output_depends_on_reveals() {
        let make = |payload: &[u8]| {
            let mut b = beacon();
            let (sh, ph) = hashes(b"s", payload);
            b.commit(sh, ph, 0).unwrap();
            b.reveal(b"s", payload, 11).unwrap();
            b.on_height(20, &IteratedSha3Vdf).unwrap().randomness
        };
        assert_ne!(make(b"p1"), make(b"p2"));
    }

    #[test]
    fn empty_round_still_finalizes() {
        let mut b = beacon();
        let out = b.on_height(25, &IteratedSha3Vdf).unwrap();
        assert_eq!(out.reveals, 0);
        assert!(b.get_output(0).is_ok());
        assert!(matches!(b.get_output(5), Err(BeaconError::NotFinalized(5))));
    }
}
