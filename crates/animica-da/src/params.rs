use serde::{Deserialize, Serialize};

use crate::error::DaError;

/// Network-pinned DA parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaParams {
    /// Share width in bytes. Power of two: 512, 1024, or 2048.
    pub share_size: usize,
    /// Data shares per stripe.
    pub k: usize,
    /// Coded shares per stripe (`n > k`); `n - k` are parity.
    pub n: usize,
    /// Namespace width in bytes: 8 or 32.
    pub ns_size: usize,
}

impl DaParams {
    pub fn validate(&self) -> Result<(), DaError> {
        if !matches!(self.share_size, 512 | 1024 | 2048) {
            return Err(DaError::BadParams(format!(
                "share_size {} not in {{512, 1024, 2048}}",
                self.share_size
            )));
        }
        if self.k == 0 {
            return Err(DaError::BadParams("k must be positive".into()));
        }
        if self.n <= self.k {
            return Err(DaError::BadParams(format!("n {} must exceed k {}", self.n, self.k)));
        }
        // GF(2^8) Vandermonde rows stay independent only below field order.
        if self.n >= 256 {
            return Err(DaError::BadParams(format!("n {} must be < 256", self.n)));
        }
        if !matches!(self.ns_size, 8 | 32) {
            return Err(DaError::BadParams(format!(
                "ns_size {} not in {{8, 32}}",
                self.ns_size
            )));
        }
        Ok(())
    }

    pub fn parity(&self) -> usize {
        self.n - self.k
    }
}

impl Default for DaParams {
    fn default() -> Self {
        Self {
            share_size: 1024,
            k: 8,
            n: 12,
            ns_size: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_valid() {
        DaParams::default().validate().unwrap();
    }

    #[test]
    fn rejects_degenerate_params() {
        assert!(DaParams { share_size: 100, ..Default::default() }.validate().is_err());
        assert!(DaParams { k: 8, n: 8, ..Default::default() }.validate().is_err());
        assert!(DaParams { ns_size: 16, ..Default::default() }.validate().is_err());
    }
}
