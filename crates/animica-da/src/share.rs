//! Blob → share partition.
//!
//! A blob's bytes are sliced into `share_size` data shares (the last one
//! zero-padded to full width), then zero-shares are appended until the
//! count is a multiple of `k`. The original byte length travels in the
//! blob envelope so decode can trim exactly.

use crate::params::DaParams;

/// Slice `data` into padded data shares, count a multiple of `params.k`.
///
/// An empty blob still occupies one stripe of zero-shares so it has a
/// commitment.
pub fn partition(data: &[u8], params: &DaParams) -> Vec<Vec<u8>> {
    let share_size = params.share_size;
    let mut shares: Vec<Vec<u8>> = data
        .chunks(share_size)
        .map(|chunk| {
            let mut share = vec![0u8; share_size];
            share[..chunk.len()].copy_from_slice(chunk);
            share
        })
        .collect();
    if shares.is_empty() {
        shares.push(vec![0u8; share_size]);
    }
    while shares.len() % params.k != 0 {
        shares.push(vec![0u8; share_size]);
    }
    shares
}

/// Number of stripes a blob of `len` bytes occupies.
pub fn stripe_count(len: usize, params: &DaParams) -> usize {
    let data_shares = len.div_ceil(params.share_size).max(1);
    data_shares.div_ceil(params.k)
}

/// Row-major linear index of stripe `r`, column `c` in the extended
/// (`n`-wide) layout.
pub fn linear_index(stripe: usize, column: usize, params: &DaParams) -> usize {
    stripe * params.n + column
}
