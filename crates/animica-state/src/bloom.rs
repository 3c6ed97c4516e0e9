use animica_core::constants::BLOOM_BYTES;
use animica_crypto::hash::keccak256;
use serde::{Deserialize, Serialize};

/// 2048-bit logs bloom. Each topic sets three bits derived from the
/// first six bytes of its Keccak-256 digest (pairs of bytes, each
/// masked to 11 bits).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bloom(#[serde(with = "serde_bytes_array")] pub [u8; BLOOM_BYTES]);

impl Default for Bloom {
    fn default() -> Self {
        Self([0u8; BLOOM_BYTES])
    }
}

impl Bloom {
    pub fn add(&mut self, data: &[u8]) {
        let digest = keccak256(data);
        for pair in digest.chunks(2).take(3) {
            let bit = (((pair[0] as u16) << 8) | pair[1] as u16) & 0x07FF;
            self.0[(bit / 8) as usize] |= 1 << (bit % 8);
        }
    }

    pub fn contains(&self, data: &[u8]) -> bool {
        let digest = keccak256(data);
        digest.chunks(2).take(3).all(|pair| {
            let bit = (((pair[0] as u16) << 8) | pair[1] as u16) & 0x07FF;
            self.0[(bit / 8) as usize] & (1 << (bit % 8)) != 0
        })
    }

    pub fn union(&mut self, other: &Bloom) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a |= b;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl std::fmt::Debug for Bloom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = self.0.iter().map(|b| b.count_ones()).sum::<u32>();
        write!(f, "Bloom({set} bits set)")
    }
}

// serde stops deriving array impls past 32 elements; store the bloom as
// a byte buffer.
mod serde_bytes_array {
    use super::BLOOM_BYTES;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(arr: &[u8; BLOOM_BYTES], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(arr)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; BLOOM_BYTES], D::Error> {
        let v: Vec<u8> = serde_bytes_like(d)?;
        v.try_into()
            .map_err(|v: Vec<u8>| D::Error::custom(format!("bloom must be 256 bytes, got {}", v.len())))
    }

    fn serde_bytes_like<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        struct V;
        impl<'de> serde::de::Visitor<'de> for V {
            type Value = Vec<u8>;
            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("bloom bytes")
            }
            fn visit_bytes<E: Error>(self, v: &[u8]) -> Result<Vec<u8>, E> {
                Ok(v.to_vec())
            }
            fn visit_seq<A: serde::de::SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<u8>, A::Error> {
                let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(b) = seq.next_element()? {
                    out.push(b);
                }
                Ok(out)
            }
        }
        d.deserialize_bytes(V)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn added_topics_are_contained() {
        let mut bloom = Bloom::default();
        bloom.add(b"topic-a");
        bloom.add(b"topic-b");
        assert!(bloom.contains(b"topic-a"));
        assert!(bloom.contains(b"topic-b"));
    }

    #[test]
    fn absent_topic_is_probably_absent() {
        let mut bloom = Bloom::default();
        bloom.add(b"topic-a");
        assert!(!bloom.contains(b"never-added"));
    }

    #[test]
    fn union_merges_bits() {
        let mut a = Bloom::default();
        a.add(b"one");
        let mut b = Bloom::default();
        b.add(b"two");
        a.union(&b);
        assert!(a.contains(b"one") && a.contains(b"two"));
    }
}
