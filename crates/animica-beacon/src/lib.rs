//! animica-beacon — two-phase commit/reveal randomness with VDF
//! finalization.
//!
//! A round advances with block height: participants commit
//! `(salt_hash, payload_hash)` during the commit window, reveal the
//! preimages once the reveal window opens, and after it closes the
//! beacon folds all reveals (sorted by participant, so aggregation is
//! order-independent) and applies the pinned VDF. Outputs seed the AICF
//! matcher shuffle and DA trap selection.
//!
//! Late commits and early reveals are rejected outright; there is no
//! grace period to game.

pub mod round;
pub mod vdf;

pub use round::{Beacon, BeaconError, BeaconOutput, BeaconParams, RoundPhase, RoundView};
pub use vdf::{IteratedSha3Vdf, Vdf};
