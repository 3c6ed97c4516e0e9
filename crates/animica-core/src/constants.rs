//! ─── Animica Protocol Constants ─────────────────────────────────────────────
//!
//! Domain-separation strings and consensus-level caps. Anything a network
//! could reasonably retune lives in `animica-genesis::NetworkParams`
//! instead; these are structural.

// ── Domain separation ────────────────────────────────────────────────────────

/// Sign-bytes wrapper tag: `CBOR(["animica:tx:sign/v1", signable(body)])`.
pub const TX_SIGN_DOMAIN: &str = "animica:tx:sign/v1";

/// Submission envelope tag: `CBOR(["animica:tx:v1", signable, sig_map])`.
pub const TX_ENVELOPE_TAG: &str = "animica:tx:v1";

/// AICF task-id preimage prefix.
pub const TASK_ID_DOMAIN: &[u8] = b"AICF_TASK_ID";

/// VM per-call PRNG seed domain.
pub const VM_PRNG_DOMAIN: &[u8] = b"animica:vm:prng";

/// Matcher shuffle seed domain.
pub const AICF_SHUFFLE_DOMAIN: &[u8] = b"animica:aicf:shuffle";

/// Contract address derivation domain.
pub const CONTRACT_ADDR_DOMAIN: &[u8] = b"animica:contract";

/// ABI function selector prefix.
pub const ABI_FN_DOMAIN: &str = "fn:";

/// Event topic-0 prefix.
pub const ABI_EVENT_DOMAIN: &str = "event:";

/// `alg_id` reserved for contract addresses (no signing key exists).
pub const CONTRACT_ALG_ID: u8 = 0;

// ── VM capacity caps (enforced in addition to gas) ───────────────────────────

/// Maximum interpreted IR steps per call.
pub const MAX_IR_STEPS: u64 = 1_000_000;

/// Maximum nested call depth.
pub const MAX_CALL_DEPTH: usize = 8;

/// Maximum bytes for a single ABI value.
pub const MAX_ABI_VALUE_BYTES: usize = 64 * 1024;

/// Maximum total event payload bytes per call.
pub const MAX_EVENT_DATA_BYTES: usize = 128 * 1024;

/// Maximum events emitted per call.
pub const MAX_EVENTS_PER_CALL: usize = 128;

/// Maximum storage key length.
pub const MAX_STORAGE_KEY_BYTES: usize = 256;

/// Maximum storage value length.
pub const MAX_STORAGE_VALUE_BYTES: usize = 64 * 1024;

// ── Transaction limits ───────────────────────────────────────────────────────

/// Hard cap on an encoded signed envelope.
pub const MAX_TX_BYTES: usize = 256 * 1024;

/// Hard cap on the optional memo field.
pub const MAX_MEMO_BYTES: usize = 256;

// ── Blocks ───────────────────────────────────────────────────────────────────

/// Maximum transactions drawn into one block.
pub const MAX_TXS_PER_BLOCK: usize = 1_024;

/// Logs bloom width in bytes (2048 bits).
pub const BLOOM_BYTES: usize = 256;
