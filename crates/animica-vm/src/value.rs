use animica_core::error::ExecError;
use animica_core::types::Address;
use num_bigint::BigInt;
use num_traits::{Signed, Zero};

/// Bit width cap for VM integers.
pub const INT_BITS: u64 = 256;

/// A VM register value. Integers are arbitrary-precision internally but
/// every arithmetic result is checked against the 256-bit cap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VmValue {
    Int(BigInt),
    Bool(bool),
    Bytes(Vec<u8>),
    Addr(Address),
}

/// ABI type tags (also used by the `DEC` instruction).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeTag {
    Int = 0,
    Bool = 1,
    Bytes = 2,
    Address = 3,
}

impl TypeTag {
    pub fn from_u8(b: u8) -> Result<Self, ExecError> {
        match b {
            0 => Ok(TypeTag::Int),
            1 => Ok(TypeTag::Bool),
            2 => Ok(TypeTag::Bytes),
            3 => Ok(TypeTag::Address),
            other => Err(ExecError::TypeMismatch(format!("unknown type tag {other}"))),
        }
    }
}

impl VmValue {
    pub fn zero() -> Self {
        VmValue::Int(BigInt::zero())
    }

    pub fn type_tag(&self) -> TypeTag {
        match self {
            VmValue::Int(_) => TypeTag::Int,
            VmValue::Bool(_) => TypeTag::Bool,
            VmValue::Bytes(_) => TypeTag::Bytes,
            VmValue::Addr(_) => TypeTag::Address,
        }
    }

    pub fn as_int(&self) -> Result<&BigInt, ExecError> {
        match self {
            VmValue::Int(i) => Ok(i),
            other => Err(ExecError::TypeMismatch(format!(
                "expected int, got {:?}",
                other.type_tag()
            ))),
        }
    }

    pub fn as_bool(&self) -> Result<bool, ExecError> {
        match self {
            VmValue::Bool(b) => Ok(*b),
            other => Err(ExecError::TypeMismatch(format!(
                "expected bool, got {:?}",
                other.type_tag()
            ))),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], ExecError> {
        match self {
            VmValue::Bytes(b) => Ok(b),
            other => Err(ExecError::TypeMismatch(format!(
                "expected bytes, got {:?}",
                other.type_tag()
            ))),
        }
    }

    pub fn as_addr(&self) -> Result<&Address, ExecError> {
        match self {
            VmValue::Addr(a) => Ok(a),
            other => Err(ExecError::TypeMismatch(format!(
                "expected address, got {:?}",
                other.type_tag()
            ))),
        }
    }

    /// Byte footprint used for per-byte gas components.
    pub fn byte_len(&self) -> usize {
        match self {
            VmValue::Int(i) => (i.bits() as usize).div_ceil(8).max(1),
            VmValue::Bool(_) => 1,
            VmValue::Bytes(b) => b.len(),
            VmValue::Addr(_) => 33,
        }
    }
}

/// Enforce the 256-bit magnitude cap on an arithmetic result.
pub fn check_int_cap(v: BigInt) -> Result<BigInt, ExecError> {
    if v.abs().bits() > INT_BITS {
        return Err(ExecError::Arithmetic("256-bit overflow".into()));
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    #[test]
    fn cap_allows_full_256_bit_magnitudes() {
        let max = BigInt::from(1u8) << 256u32;
        assert!(check_int_cap(max.clone() - 1u32).is_ok());
        assert!(check_int_cap(-(max.clone() - 1u32)).is_ok());
        assert!(check_int_cap(max).is_err());
    }

    #[test]
    fn type_mismatch_is_typed() {
        let v = VmValue::Bool(true);
        assert!(matches!(v.as_int(), Err(ExecError::TypeMismatch(_))));
    }
}
