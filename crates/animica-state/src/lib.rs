//! animica-state — execution state and block application.
//!
//! The execution core is strictly serialized: one block applies at a
//! time, transactions run in index order, and the whole block commits or
//! none of it does (receipts, logs bloom, state root, and DA root land
//! together under the block hash).

pub mod account;
pub mod block;
pub mod bloom;
pub mod exec;
pub mod receipt;
pub mod store;

pub use account::Account;
pub use block::{Block, BlockHeader};
pub use bloom::Bloom;
pub use exec::{Executor, StagedBlock};
pub use receipt::{EventLog, Receipt, ReceiptStatus};
pub use store::ChainStore;
