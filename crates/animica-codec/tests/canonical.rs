//! Property tests: encode∘decode is the identity on canonical values, and
//! re-encoding a decoded item reproduces the input bytes exactly.

use animica_codec::{decode, encode, Value};
use proptest::collection::vec;
use proptest::prelude::*;

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        any::<u64>().prop_map(Value::Uint),
        any::<u64>().prop_map(Value::Neg),
        vec(any::<u8>(), 0..48).prop_map(Value::Bytes),
        "[a-z_][a-z0-9_]{0,15}".prop_map(Value::Text),
        any::<bool>().prop_map(Value::Bool),
        Just(Value::Null),
    ];
    leaf.prop_recursive(3, 24, 6, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..6).prop_map(Value::Array),
            vec(("[a-z]{1,8}", inner), 0..6).prop_map(|pairs| {
                // Deduplicate keys so the canonical sort cannot collide.
                let mut seen = std::collections::BTreeSet::new();
                let entries = pairs
                    .into_iter()
                    .filter(|(k, _)| seen.insert(k.clone()))
                    .map(|(k, v)| (Value::Text(k), v))
                    .collect();
                Value::Map(entries)
            }),
        ]
    })
}

proptest! {
    #[test]
    fn roundtrip_preserves_value(v in arb_value()) {
        let bytes = encode(&v).unwrap();
        let back = decode(&bytes).unwrap();
        prop_assert_eq!(back.canonicalized().unwrap(), v.canonicalized().unwrap());
    }

    #[test]
    fn reencode_is_byte_identical(v in arb_value()) {
        let bytes = encode(&v).unwrap();
        let back = decode(&bytes).unwrap();
        let again = encode(&back).unwrap();
        prop_assert_eq!(again, bytes);
    }

    #[test]
    fn decode_never_panics(bytes in vec(any::<u8>(), 0..256)) {
        let _ = decode(&bytes);
    }
}
