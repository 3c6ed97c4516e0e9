//! Attestation bundles.
//!
//! A bundle carries vendor evidence (TEE quote plus certificate chain),
//! which the registry validates against pinned roots and a measurement
//! allowlist. Only the latest valid attestation gates eligibility;
//! updates are versioned, never edited in place.

use animica_core::types::{Hash32, Timestamp};
use animica_crypto::hash::sha3_256;
use serde::{Deserialize, Serialize};

use crate::error::AicfError;

/// Vendor evidence submitted by a provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationBundle {
    pub provider_id: String,
    pub version: u32,
    /// Vendor tag, e.g. `"sev-snp"`, `"tdx"`, `"sgx"`.
    pub vendor: String,
    /// Opaque TEE quote bytes.
    pub quote: Vec<u8>,
    /// Runtime measurement the quote commits to.
    pub measurement: Hash32,
    /// Certificate chain, leaf first; each entry is hashed against the
    /// pinned roots.
    pub cert_chain: Vec<Vec<u8>>,
    pub signed_at: Timestamp,
}

impl AttestationBundle {
    /// Content hash recorded on the provider as `attest_hash`.
    pub fn attest_hash(&self) -> Hash32 {
        let bytes = bincode::serialize(self).expect("bundle serializes");
        Hash32::from_bytes(sha3_256(&bytes))
    }
}

/// Pinned verification policy from network params.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestPolicy {
    /// SHA3-256 hashes of trusted vendor root certificates.
    pub pinned_roots: Vec<Hash32>,
    /// Allowed runtime measurements.
    pub allowed_measurements: Vec<Hash32>,
    pub max_age_secs: u64,
}

/// Validate a bundle. Returns the `attest_hash` to record.
pub fn validate(
    bundle: &AttestationBundle,
    policy: &AttestPolicy,
    now: Timestamp,
) -> Result<Hash32, AicfError> {
    if bundle.quote.is_empty() {
        return Err(AicfError::Attestation("empty quote".into()));
    }
    if bundle.cert_chain.is_empty() {
        return Err(AicfError::Attestation("empty certificate chain".into()));
    }
    let age = now - bundle.signed_at;
    if age < 0 || age as u64 > policy.max_age_secs {
        return Err(AicfError::Attestation(format!(
            "bundle age {age}s outside 0..={}s",
            policy.max_age_secs
        )));
    }

    // Chain anchoring: the last (root) certificate must hash to a pinned
    // root, and every link must commit to its parent.
    let root_cert = bundle.cert_chain.last().expect("non-empty");
    let root_hash = Hash32::from_bytes(sha3_256(root_cert));
    if !policy.pinned_roots.contains(&root_hash) {
        return Err(AicfError::Attestation(format!(
            "root certificate {root_hash} not pinned"
        )));
    }
    for pair in bundle.cert_chain.windows(2) {
        let parent_hash = sha3_256(&pair[1]);
        // Each non-root cert must embed its issuer's hash.
        if !contains_subslice(&pair[0], &parent_hash) {
            return Err(AicfError::Attestation("certificate chain broken".into()));
        }
    }

    // Measurement policy.
    if !policy.allowed_measurements.contains(&bundle.measurement) {
        return Err(AicfError::Attestation(format!(
            "measurement {} not allowed",
            bundle.measurement
        )));
    }

    // The quote must embed the measurement it claims.
    if !contains_subslice(&bundle.quote, bundle.measurement.as_bytes()) {
        return Err(AicfError::Attestation(
            "quote does not commit to measurement".into(),
        ));
    }

    Ok(bundle.attest_hash())
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy_for(bundle: &AttestationBundle) -> AttestPolicy {
        AttestPolicy {
            pinned_roots: vec![Hash32::from_bytes(sha3_256(
                bundle.cert_chain.last().unwrap(),
            ))],
            allowed_measurements: vec![bundle.measurement],
            max_age_secs: 3_600,
        }
    }

    fn sample_bundle() -> AttestationBundle {
        let root = b"vendor-root-cert".to_vec();
        let root_hash = sha3_256(&root);
        let mut leaf = b"leaf-cert:".to_vec();
        leaf.extend_from_slice(&root_hash);
        let measurement = Hash32::from_bytes([0x33; 32]);
        let mut quote = b"quote:".to_vec();
        quote.extend_from_slice(measurement.as_bytes());
        AttestationBundle {
            provider_id: "provider:aabbccddeeff001122334455".into(),
            version: 1,
            vendor: "sev-snp".into(),
            quote,
            measurement,
            cert_chain: vec![leaf, root],
            signed_at: 1_000,
        }
    }

    #[test]
    fn valid_bundle_passes() {
        let bundle = sample_bundle();
        let policy = policy_for(&bundle);
        let hash = validate(&bundle, &policy, 1_100).unwrap();
        assert_eq!(hash, bundle.attest_hash());
    }

    #[test]
    fn unpinned_root_fails() {
        let bundle = sample_bundle();
        let mut policy = policy_for(&bundle);
        policy.pinned_roots = vec![Hash32::from_bytes([0xEE; 32])];
        assert!(validate(&bundle, &policy, 1_100).is_err());
    }

    #[test]
    fn broken_chain_fails() {
        let mut bundle = sample_bundle();
        bundle.cert_chain[0] = b"leaf without issuer hash".to_vec();
        let policy = policy_for(&bundle);
        assert!(validate(&bundle, &policy, 1_100).is_err());
    }

    #[test]
    fn disallowed_measurement_fails() {
        let bundle = sample_bundle();
        let mut policy = policy_for(&bundle);
        policy.allowed_measurements = vec![Hash32::from_bytes([0x44; 32])];
        assert!(validate(&bundle, &policy, 1_100).is_err());
    }

    #[test]
    fn stale_bundle_fails() {
        let bundle = sample_bundle();
        let policy = policy_for(&bundle);
        assert!(validate(&bundle, &policy, 1_000 + 3_601).is_err());
        // From the future is also invalid.
        assert!(validate(&bundle, &policy, 999).is_err());
    }
}
