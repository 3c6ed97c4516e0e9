//! Register-machine IR and its byte codec.
//!
//! A program is `AVM1 || uvarint(n_entries) || entries || uvarint(n_instrs)
//! || instrs`, where each entry is an 8-byte ABI selector plus a u32-le
//! entry pc. Decoding is schema-directed and rejects unknown opcodes,
//! truncated operands, and out-of-range entry points at deploy time, so
//! the interpreter never sees malformed code.

use animica_codec::varint::{read_uvarint, write_uvarint};
use animica_core::error::ExecError;
use animica_core::types::Address;
use num_bigint::{BigInt, Sign};
use num_traits::Zero;

use crate::value::{TypeTag, VmValue};

/// Magic prefix of encoded programs.
pub const PROGRAM_MAGIC: &[u8; 4] = b"AVM1";

/// Register index (each frame owns 256 registers).
pub type Reg = u8;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instr {
    // Core
    Halt,
    Const(Reg, VmValue),
    Move(Reg, Reg),
    Add(Reg, Reg, Reg),
    Sub(Reg, Reg, Reg),
    Mul(Reg, Reg, Reg),
    Div(Reg, Reg, Reg),
    Mod(Reg, Reg, Reg),
    Eq(Reg, Reg, Reg),
    Lt(Reg, Reg, Reg),
    Le(Reg, Reg, Reg),
    Gt(Reg, Reg, Reg),
    Ge(Reg, Reg, Reg),
    Not(Reg, Reg),
    Jump(u32),
    JumpI(Reg, u32),
    // Bytes / ABI
    Len(Reg, Reg),
    Concat(Reg, Reg, Reg),
    Slice(Reg, Reg, Reg, Reg),
    Enc(Reg, Reg),
    Dec(Reg, Reg, TypeTag),
    // Hashing
    Sha3_256(Reg, Reg),
    Sha3_512(Reg, Reg),
    Keccak256(Reg, Reg),
    // Events: EvArg stages one key/value pair, Emit flushes the builder.
    EvArg(Reg, Reg),
    Emit(Reg),
    // Storage
    SGet(Reg, Reg),
    SSet(Reg, Reg),
    SDel(Reg),
    // Treasury
    Transfer(Reg, Reg),
    // Environment
    Caller(Reg),
    SelfAddr(Reg),
    Height(Reg),
    CallValue(Reg),
    Arg(Reg, u8),
    NumArgs(Reg),
    Rand(Reg),
    // Flow out
    Ret(Reg),
    RetUnit,
    Revert(Reg),
    // Nested contract call: `data` holds full calldata, result is the
    // callee's return bytes.
    Call(Reg, Reg, Reg),
    // Capability surface
    CapEnqueue(Reg, Reg, Reg),
    CapResult(Reg, Reg),
}

/// A deployable program: selector dispatch table plus instruction stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program {
    pub entries: Vec<([u8; 8], u32)>,
    pub code: Vec<Instr>,
}

impl Program {
    pub fn entry_pc(&self, selector: &[u8; 8]) -> Option<u32> {
        self.entries
            .iter()
            .find(|(sel, _)| sel == selector)
            .map(|(_, pc)| *pc)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 + self.code.len() * 4);
        out.extend_from_slice(PROGRAM_MAGIC);
        write_uvarint(self.entries.len() as u64, &mut out);
        for (sel, pc) in &self.entries {
            out.extend_from_slice(sel);
            out.extend_from_slice(&pc.to_le_bytes());
        }
        write_uvarint(self.code.len() as u64, &mut out);
        for instr in &self.code {
            encode_instr(instr, &mut out);
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ExecError> {
        let mut r = ByteReader::new(bytes);
        let magic = r.take(4)?;
        if magic != PROGRAM_MAGIC {
            return Err(ExecError::InvalidProgram("bad magic".into()));
        }
        let n_entries = r.uvarint()? as usize;
        let mut entries = Vec::with_capacity(n_entries.min(1024));
        for _ in 0..n_entries {
            let sel: [u8; 8] = r.take(8)?.try_into().unwrap();
            let pc = u32::from_le_bytes(r.take(4)?.try_into().unwrap());
            entries.push((sel, pc));
        }
        let n_instrs = r.uvarint()? as usize;
        let mut code = Vec::with_capacity(n_instrs.min(65_536));
        for _ in 0..n_instrs {
            code.push(decode_instr(&mut r)?);
        }
        if !r.done() {
            return Err(ExecError::InvalidProgram("trailing bytes".into()));
        }
        for (sel, pc) in &entries {
            if *pc as usize >= code.len() {
                return Err(ExecError::InvalidProgram(format!(
                    "entry {} points past code end",
                    hex_sel(sel)
                )));
            }
        }
        for instr in &code {
            let target = match instr {
                Instr::Jump(t) | Instr::JumpI(_, t) => Some(*t),
                _ => None,
            };
            if let Some(t) = target {
                if t as usize >= code.len() {
                    return Err(ExecError::InvalidProgram(format!(
                        "jump target {t} out of range"
                    )));
                }
            }
        }
        Ok(Self { entries, code })
    }
}

fn hex_sel(sel: &[u8; 8]) -> String {
    sel.iter().map(|b| format!("{b:02x}")).collect()
}

// ── Instruction byte codec ───────────────────────────────────────────────────

fn encode_instr(instr: &Instr, out: &mut Vec<u8>) {
    use Instr::*;
    match instr {
        Halt => out.push(0x00),
        Const(d, v) => {
            out.push(0x01);
            out.push(*d);
            encode_literal(v, out);
        }
        Move(d, s) => op2(out, 0x02, *d, *s),
        Add(d, a, b) => op3(out, 0x10, *d, *a, *b),
        Sub(d, a, b) => op3(out, 0x11, *d, *a, *b),
        Mul(d, a, b) => op3(out, 0x12, *d, *a, *b),
        Div(d, a, b) => op3(out, 0x13, *d, *a, *b),
        Mod(d, a, b) => op3(out, 0x14, *d, *a, *b),
        Eq(d, a, b) => op3(out, 0x18, *d, *a, *b),
        Lt(d, a, b) => op3(out, 0x19, *d, *a, *b),
        Le(d, a, b) => op3(out, 0x1a, *d, *a, *b),
        Gt(d, a, b) => op3(out, 0x1b, *d, *a, *b),
        Ge(d, a, b) => op3(out, 0x1c, *d, *a, *b),
        Not(d, s) => op2(out, 0x1d, *d, *s),
        Jump(t) => {
            out.push(0x20);
            out.extend_from_slice(&t.to_le_bytes());
        }
        JumpI(c, t) => {
            out.push(0x21);
            out.push(*c);
            out.extend_from_slice(&t.to_le_bytes());
        }
        Len(d, s) => op2(out, 0x28, *d, *s),
        Concat(d, a, b) => op3(out, 0x29, *d, *a, *b),
        Slice(d, s, start, len) => {
            out.push(0x2a);
            out.extend_from_slice(&[*d, *s, *start, *len]);
        }
        Enc(d, s) => op2(out, 0x2c, *d, *s),
        Dec(d, s, tag) => {
            out.push(0x2d);
            out.extend_from_slice(&[*d, *s, *tag as u8]);
        }
        Sha3_256(d, s) => op2(out, 0x30, *d, *s),
        Sha3_512(d, s) => op2(out, 0x31, *d, *s),
        Keccak256(d, s) => op2(out, 0x32, *d, *s),
        EvArg(k, v) => op2(out, 0x38, *k, *v),
        Emit(n) => {
            out.push(0x39);
            out.push(*n);
        }
        SGet(d, k) => op2(out, 0x40, *d, *k),
        SSet(k, v) => op2(out, 0x41, *k, *v),
        SDel(k) => {
            out.push(0x42);
            out.push(*k);
        }
        Transfer(to, amt) => op2(out, 0x48, *to, *amt),
        Caller(d) => op1(out, 0x50, *d),
        SelfAddr(d) => op1(out, 0x51, *d),
        Height(d) => op1(out, 0x52, *d),
        CallValue(d) => op1(out, 0x53, *d),
        Arg(d, i) => op2(out, 0x54, *d, *i),
        NumArgs(d) => op1(out, 0x55, *d),
        Rand(d) => op1(out, 0x58, *d),
        Ret(s) => op1(out, 0x60, *s),
        RetUnit => out.push(0x61),
        Revert(m) => op1(out, 0x62, *m),
        Call(d, a, data) => op3(out, 0x68, *d, *a, *data),
        CapEnqueue(d, k, p) => op3(out, 0x70, *d, *k, *p),
        CapResult(d, t) => op2(out, 0x71, *d, *t),
    }
}

fn op1(out: &mut Vec<u8>, opcode: u8, a: u8) {
    out.push(opcode);
    out.push(a);
}

fn op2(out: &mut Vec<u8>, opcode: u8, a: u8, b: u8) {
    out.push(opcode);
    out.extend_from_slice(&[a, b]);
}

fn op3(out: &mut Vec<u8>, opcode: u8, a: u8, b: u8, c: u8) {
    out.push(opcode);
    out.extend_from_slice(&[a, b, c]);
}

fn decode_instr(r: &mut ByteReader<'_>) -> Result<Instr, ExecError> {
    use Instr::*;
    let opcode = r.byte()?;
    Ok(match opcode {
        0x00 => Halt,
        0x01 => {
            let d = r.byte()?;
            let v = decode_literal(r)?;
            Const(d, v)
        }
        0x02 => Move(r.byte()?, r.byte()?),
        0x10 => Add(r.byte()?, r.byte()?, r.byte()?),
        0x11 => Sub(r.byte()?, r.byte()?, r.byte()?),
        0x12 => Mul(r.byte()?, r.byte()?, r.byte()?),
        0x13 => Div(r.byte()?, r.byte()?, r.byte()?),
        0x14 => Mod(r.byte()?, r.byte()?, r.byte()?),
        0x18 => Eq(r.byte()?, r.byte()?, r.byte()?),
        0x19 => Lt(r.byte()?, r.byte()?, r.byte()?),
        0x1a => Le(r.byte()?, r.byte()?, r.byte()?),
        0x1b => Gt(r.byte()?, r.byte()?, r.byte()?),
        0x1c => Ge(r.byte()?, r.byte()?, r.byte()?),
        0x1d => Not(r.byte()?, r.byte()?),
        0x20 => Jump(r.u32_le()?),
        0x21 => JumpI(r.byte()?, r.u32_le()?),
        0x28 => Len(r.byte()?, r.byte()?),
        0x29 => Concat(r.byte()?, r.byte()?, r.byte()?),
        0x2a => Slice(r.byte()?, r.byte()?, r.byte()?, r.byte()?),
        0x2c => Enc(r.byte()?, r.byte()?),
        0x2d => {
            let d = r.byte()?;
            let s = r.byte()?;
            let tag = TypeTag::from_u8(r.byte()?)?;
            Dec(d, s, tag)
        }
        0x30 => Sha3_256(r.byte()?, r.byte()?),
        0x31 => Sha3_512(r.byte()?, r.byte()?),
        0x32 => Keccak256(r.byte()?, r.byte()?),
        0x38 => EvArg(r.byte()?, r.byte()?),
        0x39 => Emit(r.byte()?),
        0x40 => SGet(r.byte()?, r.byte()?),
        0x41 => SSet(r.byte()?, r.byte()?),
        0x42 => SDel(r.byte()?),
        0x48 => Transfer(r.byte()?, r.byte()?),
        0x50 => Caller(r.byte()?),
        0x51 => SelfAddr(r.byte()?),
        0x52 => Height(r.byte()?),
        0x53 => CallValue(r.byte()?),
        0x54 => Arg(r.byte()?, r.byte()?),
        0x55 => NumArgs(r.byte()?),
        0x58 => Rand(r.byte()?),
        0x60 => Ret(r.byte()?),
        0x61 => RetUnit,
        0x62 => Revert(r.byte()?),
        0x68 => Call(r.byte()?, r.byte()?, r.byte()?),
        0x70 => CapEnqueue(r.byte()?, r.byte()?, r.byte()?),
        0x71 => CapResult(r.byte()?, r.byte()?),
        other => {
            return Err(ExecError::InvalidProgram(format!(
                "unknown opcode {other:#04x}"
            )))
        }
    })
}

// ── Literal codec (Const operands) ───────────────────────────────────────────

fn encode_literal(v: &VmValue, out: &mut Vec<u8>) {
    match v {
        VmValue::Int(i) => {
            out.push(0);
            let (sign, mag) = i.to_bytes_be();
            out.push(if sign == Sign::Minus { 1 } else { 0 });
            let mag = if i.is_zero() { Vec::new() } else { mag };
            write_uvarint(mag.len() as u64, out);
            out.extend_from_slice(&mag);
        }
        VmValue::Bool(b) => {
            out.push(1);
            out.push(*b as u8);
        }
        VmValue::Bytes(b) => {
            out.push(2);
            write_uvarint(b.len() as u64, out);
            out.extend_from_slice(b);
        }
        VmValue::Addr(a) => {
            out.push(3);
            out.extend_from_slice(a.as_bytes());
        }
    }
}

fn decode_literal(r: &mut ByteReader<'_>) -> Result<VmValue, ExecError> {
    match r.byte()? {
        0 => {
            let negative = match r.byte()? {
                0 => false,
                1 => true,
                other => {
                    return Err(ExecError::InvalidProgram(format!("bad sign byte {other}")))
                }
            };
            let len = r.uvarint()? as usize;
            if len > 32 {
                return Err(ExecError::InvalidProgram("int literal over 256 bits".into()));
            }
            let mag = r.take(len)?;
            let sign = if negative { Sign::Minus } else { Sign::Plus };
            let value = if len == 0 {
                BigInt::zero()
            } else {
                BigInt::from_bytes_be(sign, mag)
            };
            Ok(VmValue::Int(value))
        }
        1 => match r.byte()? {
            0 => Ok(VmValue::Bool(false)),
            1 => Ok(VmValue::Bool(true)),
            other => Err(ExecError::InvalidProgram(format!("bad bool byte {other}"))),
        },
        2 => {
            let len = r.uvarint()? as usize;
            Ok(VmValue::Bytes(r.take(len)?.to_vec()))
        }
        3 => {
            let raw: [u8; 33] = r.take(33)?.try_into().unwrap();
            Ok(VmValue::Addr(Address::from_bytes(raw)))
        }
        other => Err(ExecError::InvalidProgram(format!(
            "unknown literal tag {other}"
        ))),
    }
}

// ── Byte reader ──────────────────────────────────────────────────────────────

struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn byte(&mut self) -> Result<u8, ExecError> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| ExecError::InvalidProgram("truncated".into()))?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ExecError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&e| e <= self.buf.len())
            .ok_or_else(|| ExecError::InvalidProgram("truncated".into()))?;
        let s = &self.buf[self.pos..end];
        self.pos = end;
        Ok(s)
    }

    fn u32_le(&mut self) -> Result<u32, ExecError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn uvarint(&mut self) -> Result<u64, ExecError> {
        let (v, used) = read_uvarint(&self.buf[self.pos..])
            .map_err(|e| ExecError::InvalidProgram(e.to_string()))?;
        self.pos += used;
        Ok(v)
    }

    fn done(&self) -> bool {
        self.pos == self.buf.len()
    }
}
