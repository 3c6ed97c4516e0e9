//! Abstract delivery channels.
//!
//! Gossip transport is out of scope; its whole contract is these
//! channels. Sealed blocks go out on `blocks_out`, externally produced
//! blocks come in on `blocks_in`, and provider-side traffic (proof
//! envelopes with their claims and outputs, signed heartbeats) arrives
//! the same way. A transport implementation plugs in by holding the
//! opposite ends.

use animica_aicf::types::{Heartbeat, ProofClaim, ProofEnvelope};
use animica_state::Block;
use tokio::sync::mpsc;

/// A proof envelope delivered for resolution, with its claim and the raw
/// result output bytes.
pub struct ProofDelivery {
    pub envelope: ProofEnvelope,
    pub claim: ProofClaim,
    pub output: Vec<u8>,
}

/// Channel ends kept by the node.
pub struct NodeRelay {
    pub blocks_out: mpsc::Sender<Block>,
    pub blocks_in: mpsc::Receiver<Block>,
    pub proofs_in: mpsc::Receiver<ProofDelivery>,
    pub heartbeats_in: mpsc::Receiver<Heartbeat>,
}

/// Channel ends for a transport (or a test harness).
pub struct TransportHandle {
    pub blocks_in: mpsc::Receiver<Block>,
    pub blocks_out: mpsc::Sender<Block>,
    pub proofs_out: mpsc::Sender<ProofDelivery>,
    pub heartbeats_out: mpsc::Sender<Heartbeat>,
}

/// Build the paired channel ends.
pub fn channels(depth: usize) -> (NodeRelay, TransportHandle) {
    let (blocks_out_tx, blocks_out_rx) = mpsc::channel(depth);
    let (blocks_in_tx, blocks_in_rx) = mpsc::channel(depth);
    let (proofs_tx, proofs_rx) = mpsc::channel(depth);
    let (heartbeats_tx, heartbeats_rx) = mpsc::channel(depth);
    (
        NodeRelay {
            blocks_out: blocks_out_tx,
            blocks_in: blocks_in_rx,
            proofs_in: proofs_rx,
            heartbeats_in: heartbeats_rx,
        },
        TransportHandle {
            blocks_in: blocks_out_rx,
            blocks_out: blocks_in_tx,
            proofs_out: proofs_tx,
            heartbeats_out: heartbeats_tx,
        },
    )
}
