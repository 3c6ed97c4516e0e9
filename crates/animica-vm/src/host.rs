use animica_core::amount::Amount;
use animica_core::error::ExecError;
use animica_core::types::{Address, Hash32};

use crate::ir::Program;
use crate::manifest::Manifest;

/// Read-only world view the interpreter executes against.
///
/// The host never mutates during a call; every effect is buffered in
/// [`crate::effects::Effects`] and applied by the execution layer after a
/// successful commit. Implementations bind via explicit configuration,
/// not process-wide state.
pub trait Host {
    /// Committed contract storage (pre-call view).
    fn storage_get(&self, contract: &Address, key: &[u8]) -> Result<Option<Vec<u8>>, ExecError>;

    /// Committed balance (pre-call view).
    fn balance(&self, addr: &Address) -> Result<Amount, ExecError>;

    /// Deployed code for nested calls.
    fn contract(&self, addr: &Address) -> Result<Option<(Manifest, Program)>, ExecError>;

    /// A finalized AICF result's output bytes, if one exists and became
    /// readable at or before the executing block.
    fn aicf_result(&self, task_id: &Hash32) -> Result<Option<Vec<u8>>, ExecError>;

    /// Whether a prior transaction already consumed this result.
    fn aicf_result_consumed(&self, task_id: &Hash32) -> Result<bool, ExecError>;

    /// Deterministic task id the staged enqueue will resolve to, derived
    /// by the AICF pipeline from the executing transaction's context.
    fn aicf_task_id(&self, caller: &Address, kind: &str, payload: &[u8]) -> Hash32;
}
