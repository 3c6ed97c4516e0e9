//! Contract manifest and the deploy package codec.
//!
//! A deploy payload is canonical CBOR `{0: manifest, 1: program_bytes}`
//! (integer-keyed for cross-SDK stability). The manifest is an enumerated
//! record, never an ad-hoc dictionary: every field below is required
//! except `resources`, and unknown keys fail the deploy.

use animica_codec::{decode, encode, Value};
use animica_core::error::ExecError;
use serde::{Deserialize, Serialize};

use crate::abi::selector;
use crate::ir::Program;
use crate::value::TypeTag;

/// One exported function: human name plus the full ABI signature the
/// selector derives from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiEntry {
    pub name: String,
    /// e.g. `"inc()->"` or `"transfer(address,int)->bool"`.
    pub signature: String,
}

impl AbiEntry {
    pub fn selector(&self) -> [u8; 8] {
        selector(&self.signature)
    }

    /// Parse the parameter type list out of the signature.
    pub fn param_types(&self) -> Result<Vec<TypeTag>, ExecError> {
        let open = self
            .signature
            .find('(')
            .ok_or_else(|| ExecError::InvalidProgram("signature missing '('".into()))?;
        let close = self
            .signature
            .find(')')
            .ok_or_else(|| ExecError::InvalidProgram("signature missing ')'".into()))?;
        let inner = &self.signature[open + 1..close];
        if inner.is_empty() {
            return Ok(Vec::new());
        }
        inner
            .split(',')
            .map(|t| match t.trim() {
                "int" => Ok(TypeTag::Int),
                "bool" => Ok(TypeTag::Bool),
                "bytes" => Ok(TypeTag::Bytes),
                "address" => Ok(TypeTag::Address),
                other => Err(ExecError::InvalidProgram(format!(
                    "unknown ABI type {other:?}"
                ))),
            })
            .collect()
    }
}

/// Declared resource ceilings (advisory; consensus caps still apply).
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Resources {
    pub max_storage_bytes: u64,
}

/// The enumerated contract manifest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    pub abi: Vec<AbiEntry>,
    /// Capability sets the contract may invoke: `"ai"`, `"quantum"`.
    pub caps: Vec<String>,
    pub resources: Resources,
}

impl Manifest {
    /// Locate an ABI entry by selector.
    pub fn entry_for(&self, sel: &[u8; 8]) -> Option<&AbiEntry> {
        self.abi.iter().find(|e| &e.selector() == sel)
    }

    fn to_value(&self) -> Value {
        Value::Map(vec![
            (text("name"), Value::Text(self.name.clone())),
            (text("version"), Value::Text(self.version.clone())),
            (
                text("abi"),
                Value::Array(
                    self.abi
                        .iter()
                        .map(|e| {
                            Value::Map(vec![
                                (text("name"), Value::Text(e.name.clone())),
                                (text("signature"), Value::Text(e.signature.clone())),
                            ])
                        })
                        .collect(),
                ),
            ),
            (
                text("caps"),
                Value::Array(self.caps.iter().map(|c| Value::Text(c.clone())).collect()),
            ),
            (
                text("resources"),
                Value::Map(vec![(
                    text("max_storage_bytes"),
                    Value::Uint(self.resources.max_storage_bytes),
                )]),
            ),
        ])
    }

    fn from_value(v: &Value) -> Result<Self, ExecError> {
        let map = v
            .as_map()
            .ok_or_else(|| invalid("manifest must be a map"))?;
        if map.len() != 5 {
            return Err(invalid("manifest must have exactly 5 fields"));
        }
        let name = req_text(v, "name")?;
        let version = req_text(v, "version")?;
        let abi_items = v
            .get("abi")
            .and_then(|x| x.as_array())
            .ok_or_else(|| invalid("missing abi array"))?;
        let mut abi = Vec::with_capacity(abi_items.len());
        for item in abi_items {
            abi.push(AbiEntry {
                name: req_text(item, "name")?,
                signature: req_text(item, "signature")?,
            });
        }
        let caps_items = v
            .get("caps")
            .and_then(|x| x.as_array())
            .ok_or_else(|| invalid("missing caps array"))?;
        let mut caps = Vec::with_capacity(caps_items.len());
        for item in caps_items {
            caps.push(
                item.as_text()
                    .ok_or_else(|| invalid("cap must be text"))?
                    .to_string(),
            );
        }
        let resources = v
            .get("resources")
            .ok_or_else(|| invalid("missing resources"))?;
        let resources = Resources {
            max_storage_bytes: resources
                .get("max_storage_bytes")
                .and_then(|x| x.as_uint())
                .ok_or_else(|| invalid("missing resources.max_storage_bytes"))?,
        };
        Ok(Self {
            name,
            version,
            abi,
            caps,
            resources,
        })
    }
}

/// Encode a deploy package: `{0: manifest, 1: program_bytes}`.
pub fn encode_deploy_payload(manifest: &Manifest, program: &Program) -> Vec<u8> {
    let map = Value::Map(vec![
        (Value::Uint(0), manifest.to_value()),
        (Value::Uint(1), Value::Bytes(program.encode())),
    ]);
    encode(&map).expect("deploy map keys are unique")
}

/// Decode and validate a deploy package.
///
/// Beyond the codec checks, every ABI signature must resolve to an entry
/// in the program's dispatch table.
pub fn decode_deploy_payload(bytes: &[u8]) -> Result<(Manifest, Program), ExecError> {
    let value = decode(bytes).map_err(|e| invalid(&e.to_string()))?;
    let map = value
        .as_map()
        .ok_or_else(|| invalid("deploy payload must be a map"))?;
    if map.len() != 2 {
        return Err(invalid("deploy payload must have exactly 2 fields"));
    }
    let manifest_value = map
        .iter()
        .find(|(k, _)| k.as_uint() == Some(0))
        .map(|(_, v)| v)
        .ok_or_else(|| invalid("missing manifest (key 0)"))?;
    let code = map
        .iter()
        .find(|(k, _)| k.as_uint() == Some(1))
        .and_then(|(_, v)| v.as_bytes())
        .ok_or_else(|| invalid("missing code (key 1)"))?;

    let manifest = Manifest::from_value(manifest_value)?;
    let program = Program::decode(code)?;
    for entry in &manifest.abi {
        entry.param_types()?;
        if program.entry_pc(&entry.selector()).is_none() {
            return Err(invalid(&format!(
                "abi function {:?} has no program entry",
                entry.name
            )));
        }
    }
    Ok((manifest, program))
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn invalid(msg: &str) -> ExecError {
    ExecError::InvalidProgram(msg.to_string())
}

fn req_text(v: &Value, key: &str) -> Result<String, ExecError> {
    Ok(v.get(key)
        .and_then(|x| x.as_text())
        .ok_or_else(|| invalid(&format!("missing text field {key:?}")))?
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Instr;

    fn counter_manifest() -> Manifest {
        Manifest {
            name: "counter".into(),
            version: "1.0.0".into(),
            abi: vec![AbiEntry {
                name: "inc".into(),
                signature: "inc()->".into(),
            }],
            caps: vec![],
            resources: Resources::default(),
        }
    }

    fn counter_program() -> Program {
        Program {
            entries: vec![(selector("inc()->"), 0)],
            code: vec![Instr::RetUnit],
        }
    }

    #[test]
    fn deploy_payload_roundtrip() {
        let m = counter_manifest();
        let p = counter_program();
        let bytes = encode_deploy_payload(&m, &p);
        let (m2, p2) = decode_deploy_payload(&bytes).unwrap();
        assert_eq!(m2, m);
        assert_eq!(p2, p);
    }

    #[test]
    fn abi_without_program_entry_is_rejected() {
        let mut m = counter_manifest();
        m.abi.push(AbiEntry {
            name: "dec".into(),
            signature: "dec()->".into(),
        });
        let bytes = encode_deploy_payload(&m, &counter_program());
        assert!(decode_deploy_payload(&bytes).is_err());
    }

    #[test]
    fn param_types_parse() {
        let entry = AbiEntry {
            name: "transfer".into(),
            signature: "transfer(address,int)->bool".into(),
        };
        assert_eq!(
            entry.param_types().unwrap(),
            vec![TypeTag::Address, TypeTag::Int]
        );
        let bad = AbiEntry {
            name: "x".into(),
            signature: "x(float)->".into(),
        };
        assert!(bad.param_types().is_err());
    }
}
