use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaError {
    #[error("invalid DA params: {0}")]
    BadParams(String),

    #[error("namespace must be {expected} bytes, got {got}")]
    BadNamespace { expected: usize, got: usize },

    #[error("share must be {expected} bytes, got {got}")]
    BadShareSize { expected: usize, got: usize },

    #[error("insufficient shares for stripe {stripe}: need {need}, got {got}")]
    InsufficientShares {
        stripe: usize,
        need: usize,
        got: usize,
    },

    #[error("reconstruction failed: {0}")]
    ReconstructFailed(String),

    #[error("proof invalid: {0}")]
    ProofInvalid(String),

    #[error("leaves violate (namespace, index) sort order")]
    NamespaceOrder,

    #[error("empty tree has no root")]
    EmptyTree,

    #[error("unknown blob commitment: {0}")]
    UnknownBlob(String),

    #[error("share unavailable: root {root}, index {index}")]
    ShareUnavailable { root: String, index: u64 },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl DaError {
    pub fn storage(e: impl std::fmt::Display) -> Self {
        DaError::Storage(e.to_string())
    }
}
