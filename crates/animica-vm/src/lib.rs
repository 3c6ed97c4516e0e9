//! animica-vm — the deterministic script VM and gas meter.
//!
//! Bit-exact reproducibility across nodes is the whole contract: no
//! ambient I/O, no floats, no wall clock, integer arithmetic capped at
//! 256 bits, and a pinned gas table debited per operation. Anything the
//! platform could make nondeterministic is absorbed by this runtime, not
//! by contract code.
//!
//! A contract package is canonical CBOR `{0: manifest, 1: program}`. The
//! program is a register-machine instruction stream with a selector →
//! entry-point table; calls arrive as `selector(8) || args_tuple` and run
//! single-threaded, cooperatively, with an explicit step cap alongside
//! gas. All effects (storage writes, treasury transfers, events, AICF
//! enqueues/consumptions) accumulate in a buffered [`effects::Effects`]
//! set that commits only on success; revert and out-of-gas discard it
//! atomically.

pub mod abi;
pub mod effects;
pub mod exec;
pub mod gas;
pub mod host;
pub mod ir;
pub mod manifest;
pub mod prng;
pub mod value;

pub use abi::selector;
pub use effects::Effects;
pub use exec::{execute_call, CallContext, CallStatus, ExecOutcome, VmEvent};
pub use gas::{GasMeter, GasTable};
pub use host::Host;
pub use ir::{Instr, Program};
pub use manifest::{decode_deploy_payload, encode_deploy_payload, AbiEntry, Manifest};
pub use value::VmValue;
