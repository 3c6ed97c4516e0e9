//! Systematic Reed–Solomon over GF(2^8).
//!
//! The generator matrix is the identity stacked on Vandermonde parity
//! rows, so the first `k` coded shares equal the data shares verbatim.
//! Reconstruction solves the linear system from any `k` surviving coded
//! shares by Gaussian elimination. Field arithmetic uses const-built
//! exp/log tables over the 0x1d primitive polynomial.

use crate::error::DaError;

const PRIMITIVE_POLY: u8 = 0x1d;
const FIELD_SIZE: usize = 256;
const FIELD_ORDER: usize = FIELD_SIZE - 1;

struct GfTables {
    exp: [u8; FIELD_SIZE * 2],
    log: [u8; FIELD_SIZE],
}

impl GfTables {
    const fn build() -> Self {
        let mut exp = [0u8; FIELD_SIZE * 2];
        let mut log = [0u8; FIELD_SIZE];
        let mut value: u8 = 1;
        let mut i = 0usize;
        while i < FIELD_ORDER {
            exp[i] = value;
            log[value as usize] = i as u8;
            value = mul_no_tables(value, 2);
            i += 1;
        }
        let mut j = FIELD_ORDER;
        while j < FIELD_SIZE * 2 {
            exp[j] = exp[j - FIELD_ORDER];
            j += 1;
        }
        Self { exp, log }
    }
}

const TABLES: GfTables = GfTables::build();

const fn mul_no_tables(mut a: u8, mut b: u8) -> u8 {
    let mut product: u8 = 0;
    let mut i = 0;
    while i < 8 {
        if (b & 1) != 0 {
            product ^= a;
        }
        let carry = a & 0x80;
        a <<= 1;
        if carry != 0 {
            a ^= PRIMITIVE_POLY;
        }
        b >>= 1;
        i += 1;
    }
    product
}

#[inline]
fn gf_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let log_a = TABLES.log[a as usize] as usize;
    let log_b = TABLES.log[b as usize] as usize;
    TABLES.exp[log_a + log_b]
}

#[inline]
fn gf_inv(a: u8) -> Option<u8> {
    if a == 0 {
        None
    } else {
        Some(TABLES.exp[FIELD_ORDER - TABLES.log[a as usize] as usize])
    }
}

#[inline]
fn gf_axpy(target: &mut [u8], factor: u8, source: &[u8]) {
    if factor == 0 {
        return;
    }
    for (dst, src) in target.iter_mut().zip(source.iter()) {
        *dst ^= gf_mul(factor, *src);
    }
}

#[inline]
fn gf_scale(row: &mut [u8], factor: u8) {
    for v in row.iter_mut() {
        *v = gf_mul(*v, factor);
    }
}

/// RS(k, n) stripe codec.
pub struct ReedSolomon {
    k: usize,
    n: usize,
    /// `n` generator rows of width `k`; the first `k` are the identity.
    generator: Vec<Vec<u8>>,
}

impl ReedSolomon {
    pub fn new(k: usize, n: usize) -> Result<Self, DaError> {
        if k == 0 || n <= k || n >= FIELD_SIZE {
            return Err(DaError::BadParams(format!("RS({k}, {n}) out of range")));
        }
        let mut generator = vec![vec![0u8; k]; n];
        for (i, row) in generator.iter_mut().take(k).enumerate() {
            row[i] = 1;
        }
        for row in 0..(n - k) {
            let base = TABLES.exp[row];
            let mut coeff = 1u8;
            for col in 0..k {
                generator[k + row][col] = coeff;
                coeff = gf_mul(coeff, base);
            }
        }
        Ok(Self { k, n, generator })
    }

    /// Extend one stripe of `k` equal-length data shares to `n` coded
    /// shares. Systematic: `out[0..k]` are the inputs.
    pub fn encode_stripe(&self, data: &[Vec<u8>]) -> Result<Vec<Vec<u8>>, DaError> {
        if data.len() != self.k {
            return Err(DaError::BadParams(format!(
                "stripe needs {} data shares, got {}",
                self.k,
                data.len()
            )));
        }
        let width = data[0].len();
        if data.iter().any(|s| s.len() != width) {
            return Err(DaError::BadParams("ragged stripe".into()));
        }
        let mut out: Vec<Vec<u8>> = data.to_vec();
        for row in self.k..self.n {
            let mut parity = vec![0u8; width];
            for (col, coeff) in self.generator[row].iter().enumerate() {
                gf_axpy(&mut parity, *coeff, &data[col]);
            }
            out.push(parity);
        }
        Ok(out)
    }

    /// Recover the `k` data shares of one stripe from any `k` coded
    /// shares, given as `(column, bytes)` pairs.
    pub fn decode_stripe(
        &self,
        available: &[(usize, Vec<u8>)],
    ) -> Result<Vec<Vec<u8>>, DaError> {
        if available.len() < self.k {
            return Err(DaError::InsufficientShares {
                stripe: 0,
                need: self.k,
                got: available.len(),
            });
        }
        let width = available[0].1.len();
        let mut matrix: Vec<Vec<u8>> = Vec::with_capacity(available.len());
        let mut values: Vec<Vec<u8>> = Vec::with_capacity(available.len());
        for (col, bytes) in available {
            if *col >= self.n {
                return Err(DaError::ReconstructFailed(format!("column {col} out of range")));
            }
            if bytes.len() != width {
                return Err(DaError::ReconstructFailed("ragged shares".into()));
            }
            matrix.push(self.generator[*col].clone());
            values.push(bytes.clone());
        }

        // Gauss-Jordan over GF(2^8).
        let mut rank = 0usize;
        for col in 0..self.k {
            let Some(pivot_row) = (rank..matrix.len()).find(|&r| matrix[r][col] != 0) else {
                continue;
            };
            matrix.swap(rank, pivot_row);
            values.swap(rank, pivot_row);
            let inv = gf_inv(matrix[rank][col])
                .ok_or_else(|| DaError::ReconstructFailed("singular pivot".into()))?;
            gf_scale(&mut matrix[rank], inv);
            gf_scale(&mut values[rank], inv);
            let pivot_m = matrix[rank].clone();
            let pivot_v = values[rank].clone();
            for row in 0..matrix.len() {
                if row == rank {
                    continue;
                }
                let factor = matrix[row][col];
                if factor == 0 {
                    continue;
                }
                gf_axpy(&mut matrix[row], factor, &pivot_m);
                gf_axpy(&mut values[row], factor, &pivot_v);
            }
            rank += 1;
            if rank == self.k {
                break;
            }
        }
        if rank < self.k {
            return Err(DaError::ReconstructFailed(
                "insufficient independent shares".into(),
            ));
        }
        Ok(values.into_iter().take(self.k).collect())
    }
}
