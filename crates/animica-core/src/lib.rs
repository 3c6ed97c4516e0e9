//! animica-core — shared types, constants, and the three error tiers.
//!
//! Kept dependency-light so every other crate can sit on top of it.

pub mod amount;
pub mod constants;
pub mod error;
pub mod types;

pub use amount::Amount;
pub use error::{AdmissionError, BlockError, ExecError};
pub use types::{Address, BlockHeight, ChainId, Gas, Hash32, Nonce, Timestamp};
