//! The interpreter: single-threaded, cooperative, step- and gas-capped.
//!
//! Per call: `IDLE → VALIDATE → EXEC → (COMMIT | REVERT | OOG | FAIL)`.
//! A failing nested call fails its outer call too: the whole transaction
//! call commits or rolls back as one unit, so the buffered effects never
//! need partial unwinding.

use animica_core::amount::Amount;
use animica_core::constants::{
    MAX_CALL_DEPTH, MAX_EVENTS_PER_CALL, MAX_EVENT_DATA_BYTES, MAX_IR_STEPS,
    MAX_STORAGE_KEY_BYTES, MAX_STORAGE_VALUE_BYTES,
};
use animica_core::error::ExecError;
use animica_core::types::{Address, Hash32};
use animica_crypto::hash::{keccak256, sha3_256, sha3_512};
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use rand_chacha::ChaCha20Rng;

use crate::abi;
use crate::effects::Effects;
use crate::gas::{GasMeter, GasTable};
use crate::host::Host;
use crate::ir::{Instr, Program};
use crate::manifest::Manifest;
use crate::prng;
use crate::value::{check_int_cap, TypeTag, VmValue};

/// Immutable context of one top-level contract call.
#[derive(Clone, Debug)]
pub struct CallContext {
    pub chain_id: u64,
    pub height: u64,
    pub tx_hash: Hash32,
    /// Index of this call within its transaction (reseeds the PRNG).
    pub call_index: u32,
    pub caller: Address,
    pub contract: Address,
    pub value: Amount,
    pub gas_limit: u64,
}

/// An emitted event, pending conversion into a receipt log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VmEvent {
    pub address: Address,
    pub name: String,
    /// Canonical args bytes (also hashed into `topics[1]`).
    pub data: Vec<u8>,
    pub topics: Vec<Hash32>,
    pub index: u32,
}

/// Terminal state of a call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallStatus {
    Success,
    Revert(String),
    OutOfGas,
    Failed(String),
}

/// Everything the execution layer needs to build a receipt.
#[derive(Debug)]
pub struct ExecOutcome {
    pub status: CallStatus,
    pub gas_used: u64,
    pub return_data: Option<Vec<u8>>,
    pub events: Vec<VmEvent>,
    /// Buffered effects; empty unless `status == Success`.
    pub effects: Effects,
}

/// Execute one contract call to completion.
pub fn execute_call(
    host: &dyn Host,
    gas: &GasTable,
    ctx: &CallContext,
    manifest: &Manifest,
    program: &Program,
    calldata: &[u8],
) -> ExecOutcome {
    let mut interp = Interp {
        host,
        gas,
        meter: GasMeter::new(ctx.gas_limit),
        steps: 0,
        effects: Effects::new(),
        events: Vec::new(),
        event_data_total: 0,
        rng: prng::call_rng(&ctx.tx_hash, ctx.call_index),
        ctx,
    };

    let result = interp.top_level(manifest, program, calldata);
    let gas_used = interp.meter.used();
    match result {
        Ok(return_data) => ExecOutcome {
            status: CallStatus::Success,
            gas_used,
            return_data,
            events: interp.events,
            effects: interp.effects,
        },
        Err(err) => {
            let status = match err {
                ExecError::Revert(msg) => CallStatus::Revert(msg),
                ExecError::OutOfGas => CallStatus::OutOfGas,
                other => CallStatus::Failed(other.to_string()),
            };
            ExecOutcome {
                status,
                gas_used,
                return_data: None,
                events: Vec::new(),
                effects: Effects::new(),
            }
        }
    }
}

struct Interp<'a> {
    host: &'a dyn Host,
    gas: &'a GasTable,
    meter: GasMeter,
    steps: u64,
    effects: Effects,
    events: Vec<VmEvent>,
    event_data_total: usize,
    rng: ChaCha20Rng,
    ctx: &'a CallContext,
}

impl<'a> Interp<'a> {
    fn top_level(
        &mut self,
        manifest: &Manifest,
        program: &Program,
        calldata: &[u8],
    ) -> Result<Option<Vec<u8>>, ExecError> {
        if !self.ctx.value.is_zero() {
            let (caller, contract, value) =
                (self.ctx.caller, self.ctx.contract, self.ctx.value.clone());
            self.effects.transfer(self.host, caller, contract, value)?;
        }
        self.run_frame(
            self.ctx.contract,
            self.ctx.caller,
            manifest,
            program,
            calldata,
            0,
        )
    }

    fn run_frame(
        &mut self,
        contract: Address,
        caller: Address,
        manifest: &Manifest,
        program: &Program,
        calldata: &[u8],
        depth: usize,
    ) -> Result<Option<Vec<u8>>, ExecError> {
        if depth >= MAX_CALL_DEPTH {
            return Err(ExecError::DepthLimit);
        }

        // VALIDATE: selector dispatch + typed argument decode.
        if calldata.len() < 8 {
            return Err(ExecError::UnknownSelector);
        }
        let sel: [u8; 8] = calldata[..8].try_into().unwrap();
        let entry = manifest.entry_for(&sel).ok_or(ExecError::UnknownSelector)?;
        let pc_start = program.entry_pc(&sel).ok_or(ExecError::UnknownSelector)?;
        let args_raw = &calldata[8..];
        self.meter.charge(
            self.gas.dec_base + self.gas.dec_per_byte * args_raw.len() as u64,
        )?;
        let args = abi::decode_args(&entry.param_types()?, args_raw)?;

        // EXEC.
        let mut regs: Vec<VmValue> = vec![VmValue::zero(); 256];
        let mut ev_args: Vec<(String, VmValue)> = Vec::new();
        let mut pc = pc_start as usize;

        loop {
            let instr = program
                .code
                .get(pc)
                .ok_or_else(|| ExecError::InvalidProgram("pc past code end".into()))?;
            self.steps += 1;
            if self.steps > MAX_IR_STEPS {
                return Err(ExecError::StepLimit);
            }
            pc += 1;

            match instr {
                Instr::Halt => return Ok(None),
                Instr::Const(d, v) => {
                    self.meter.charge(self.gas.const_op)?;
                    regs[*d as usize] = v.clone();
                }
                Instr::Move(d, s) => {
                    self.meter.charge(self.gas.move_op)?;
                    regs[*d as usize] = regs[*s as usize].clone();
                }
                Instr::Add(d, a, b) => {
                    self.meter.charge(self.gas.add)?;
                    let r = regs[*a as usize].as_int()? + regs[*b as usize].as_int()?;
                    regs[*d as usize] = VmValue::Int(check_int_cap(r)?);
                }
                Instr::Sub(d, a, b) => {
                    self.meter.charge(self.gas.sub)?;
                    let r = regs[*a as usize].as_int()? - regs[*b as usize].as_int()?;
                    regs[*d as usize] = VmValue::Int(check_int_cap(r)?);
                }
                Instr::Mul(d, a, b) => {
                    self.meter.charge(self.gas.mul)?;
                    let r = regs[*a as usize].as_int()? * regs[*b as usize].as_int()?;
                    regs[*d as usize] = VmValue::Int(check_int_cap(r)?);
                }
                Instr::Div(d, a, b) => {
                    self.meter.charge(self.gas.div)?;
                    let rhs = regs[*b as usize].as_int()?;
                    if rhs.is_zero() {
                        return Err(ExecError::Arithmetic("division by zero".into()));
                    }
                    let r = regs[*a as usize].as_int()? / rhs;
                    regs[*d as usize] = VmValue::Int(r);
                }
                Instr::Mod(d, a, b) => {
                    self.meter.charge(self.gas.modulo)?;
                    let rhs = regs[*b as usize].as_int()?;
                    if rhs.is_zero() {
                        return Err(ExecError::Arithmetic("modulo by zero".into()));
                    }
                    let r = regs[*a as usize].as_int()? % rhs;
                    regs[*d as usize] = VmValue::Int(r);
                }
                Instr::Eq(d, a, b) => {
                    self.meter.charge(self.gas.cmp)?;
                    regs[*d as usize] = VmValue::Bool(regs[*a as usize] == regs[*b as usize]);
                }
                Instr::Lt(d, a, b) => {
                    self.meter.charge(self.gas.cmp)?;
                    let r = regs[*a as usize].as_int()? < regs[*b as usize].as_int()?;
                    regs[*d as usize] = VmValue::Bool(r);
                }
                Instr::Le(d, a, b) => {
                    self.meter.charge(self.gas.cmp)?;
                    let r = regs[*a as usize].as_int()? <= regs[*b as usize].as_int()?;
                    regs[*d as usize] = VmValue::Bool(r);
                }
                Instr::Gt(d, a, b) => {
                    self.meter.charge(self.gas.cmp)?;
                    let r = regs[*a as usize].as_int()? > regs[*b as usize].as_int()?;
                    regs[*d as usize] = VmValue::Bool(r);
                }
                Instr::Ge(d, a, b) => {
                    self.meter.charge(self.gas.cmp)?;
                    let r = regs[*a as usize].as_int()? >= regs[*b as usize].as_int()?;
                    regs[*d as usize] = VmValue::Bool(r);
                }
                Instr::Not(d, s) => {
                    self.meter.charge(self.gas.cmp)?;
                    let b = regs[*s as usize].as_bool()?;
                    regs[*d as usize] = VmValue::Bool(!b);
                }
                Instr::Jump(t) => {
                    self.meter.charge(self.gas.jump)?;
                    pc = *t as usize;
                }
                Instr::JumpI(c, t) => {
                    self.meter.charge(self.gas.jumpi)?;
                    if regs[*c as usize].as_bool()? {
                        pc = *t as usize;
                    }
                }
                Instr::Len(d, s) => {
                    self.meter.charge(self.gas.len)?;
                    let n = regs[*s as usize].as_bytes()?.len();
                    regs[*d as usize] = VmValue::Int(BigInt::from(n));
                }
                Instr::Concat(d, a, b) => {
                    let left = regs[*a as usize].as_bytes()?.to_vec();
                    let right = regs[*b as usize].as_bytes()?.to_vec();
                    self.meter.charge(
                        self.gas.concat_base
                            + self.gas.concat_per_byte * (left.len() + right.len()) as u64,
                    )?;
                    let mut out = left;
                    out.extend_from_slice(&right);
                    check_abi_bytes(out.len())?;
                    regs[*d as usize] = VmValue::Bytes(out);
                }
                Instr::Slice(d, s, start, len) => {
                    let src = regs[*s as usize].as_bytes()?.to_vec();
                    let start = usize_from_int(regs[*start as usize].as_int()?)?;
                    let len = usize_from_int(regs[*len as usize].as_int()?)?;
                    self.meter
                        .charge(self.gas.slice_base + self.gas.slice_per_byte * len as u64)?;
                    let end = start
                        .checked_add(len)
                        .filter(|&e| e <= src.len())
                        .ok_or_else(|| ExecError::Arithmetic("slice out of bounds".into()))?;
                    regs[*d as usize] = VmValue::Bytes(src[start..end].to_vec());
                }
                Instr::Enc(d, s) => {
                    let v = regs[*s as usize].clone();
                    self.meter.charge(
                        self.gas.enc_base + self.gas.enc_per_byte * v.byte_len() as u64,
                    )?;
                    let mut out = Vec::new();
                    abi::encode_value(&v, &mut out)?;
                    regs[*d as usize] = VmValue::Bytes(out);
                }
                Instr::Dec(d, s, tag) => {
                    let src = regs[*s as usize].as_bytes()?.to_vec();
                    self.meter.charge(
                        self.gas.dec_base + self.gas.dec_per_byte * src.len() as u64,
                    )?;
                    let (v, used) = abi::decode_value(*tag, &src)?;
                    if used != src.len() {
                        return Err(ExecError::TypeMismatch("trailing bytes in DEC".into()));
                    }
                    regs[*d as usize] = v;
                }
                Instr::Sha3_256(d, s) => {
                    let src = regs[*s as usize].as_bytes()?;
                    self.meter.charge(self.gas.hash_cost(
                        self.gas.sha3_256_base,
                        self.gas.sha3_256_per_64b,
                        src.len(),
                    ))?;
                    regs[*d as usize] = VmValue::Bytes(sha3_256(src).to_vec());
                }
                Instr::Sha3_512(d, s) => {
                    let src = regs[*s as usize].as_bytes()?;
                    self.meter.charge(self.gas.hash_cost(
                        self.gas.sha3_512_base,
                        self.gas.sha3_512_per_64b,
                        src.len(),
                    ))?;
                    regs[*d as usize] = VmValue::Bytes(sha3_512(src).to_vec());
                }
                Instr::Keccak256(d, s) => {
                    let src = regs[*s as usize].as_bytes()?;
                    self.meter.charge(self.gas.hash_cost(
                        self.gas.keccak_base,
                        self.gas.keccak_per_64b,
                        src.len(),
                    ))?;
                    regs[*d as usize] = VmValue::Bytes(keccak256(src).to_vec());
                }
                Instr::EvArg(k, v) => {
                    self.meter.charge(self.gas.move_op)?;
                    let key = String::from_utf8(regs[*k as usize].as_bytes()?.to_vec())
                        .map_err(|_| ExecError::TypeMismatch("event key not UTF-8".into()))?;
                    ev_args.push((key, regs[*v as usize].clone()));
                }
                Instr::Emit(n) => {
                    let name = String::from_utf8(regs[*n as usize].as_bytes()?.to_vec())
                        .map_err(|_| ExecError::TypeMismatch("event name not UTF-8".into()))?;
                    let payload = abi::canonical_event_bytes(&ev_args)?;
                    ev_args.clear();
                    self.emit_event(contract, name, payload)?;
                }
                Instr::SGet(d, k) => {
                    let key = regs[*k as usize].as_bytes()?.to_vec();
                    check_storage_key(&key)?;
                    let found = self.effects.storage_get(self.host, &contract, &key)?;
                    let val_len = found.as_ref().map(|v| v.len()).unwrap_or(0);
                    self.meter.charge(
                        self.gas.storage_get_base
                            + self.gas.storage_get_per_key_byte * key.len() as u64
                            + self.gas.storage_get_per_val_byte * val_len as u64,
                    )?;
                    regs[*d as usize] = VmValue::Bytes(found.unwrap_or_default());
                }
                Instr::SSet(k, v) => {
                    let key = regs[*k as usize].as_bytes()?.to_vec();
                    let val = regs[*v as usize].as_bytes()?.to_vec();
                    check_storage_key(&key)?;
                    if val.len() > MAX_STORAGE_VALUE_BYTES {
                        return Err(ExecError::CapExceeded(format!(
                            "storage value {} bytes exceeds {}",
                            val.len(),
                            MAX_STORAGE_VALUE_BYTES
                        )));
                    }
                    self.meter.charge(
                        self.gas.storage_set_base
                            + self.gas.storage_set_per_key_byte * key.len() as u64
                            + self.gas.storage_set_per_val_byte * val.len() as u64,
                    )?;
                    self.effects.storage_set(contract, key, val);
                }
                Instr::SDel(k) => {
                    let key = regs[*k as usize].as_bytes()?.to_vec();
                    check_storage_key(&key)?;
                    self.meter.charge(
                        self.gas.storage_del_base
                            + self.gas.storage_del_per_key_byte * key.len() as u64,
                    )?;
                    self.effects.storage_delete(contract, key);
                }
                Instr::Transfer(to, amt) => {
                    self.meter.charge(self.gas.transfer)?;
                    let to = *regs[*to as usize].as_addr()?;
                    let amount = amount_from_int(regs[*amt as usize].as_int()?)?;
                    self.effects.transfer(self.host, contract, to, amount)?;
                }
                Instr::Caller(d) => {
                    self.meter.charge(self.gas.env_read)?;
                    regs[*d as usize] = VmValue::Addr(caller);
                }
                Instr::SelfAddr(d) => {
                    self.meter.charge(self.gas.env_read)?;
                    regs[*d as usize] = VmValue::Addr(contract);
                }
                Instr::Height(d) => {
                    self.meter.charge(self.gas.env_read)?;
                    regs[*d as usize] = VmValue::Int(BigInt::from(self.ctx.height));
                }
                Instr::CallValue(d) => {
                    self.meter.charge(self.gas.env_read)?;
                    let v = BigInt::from(self.ctx.value.as_biguint().clone());
                    regs[*d as usize] = VmValue::Int(v);
                }
                Instr::Arg(d, i) => {
                    self.meter.charge(self.gas.env_read)?;
                    let v = args
                        .get(*i as usize)
                        .ok_or_else(|| ExecError::TypeMismatch("arg index out of range".into()))?
                        .clone();
                    regs[*d as usize] = v;
                }
                Instr::NumArgs(d) => {
                    self.meter.charge(self.gas.env_read)?;
                    regs[*d as usize] = VmValue::Int(BigInt::from(args.len()));
                }
                Instr::Rand(d) => {
                    self.meter.charge(self.gas.rand)?;
                    regs[*d as usize] = VmValue::Int(BigInt::from(prng::next_u64(&mut self.rng)));
                }
                Instr::Ret(s) => {
                    self.meter.charge(self.gas.env_read)?;
                    let mut out = Vec::new();
                    abi::encode_value(&regs[*s as usize], &mut out)?;
                    return Ok(Some(out));
                }
                Instr::RetUnit => return Ok(None),
                Instr::Revert(m) => {
                    let msg = String::from_utf8_lossy(regs[*m as usize].as_bytes()?).into_owned();
                    return Err(ExecError::Revert(msg));
                }
                Instr::Call(d, a, data) => {
                    self.meter.charge(self.gas.call_base)?;
                    let callee = *regs[*a as usize].as_addr()?;
                    let calldata = regs[*data as usize].as_bytes()?.to_vec();
                    let (callee_manifest, callee_program) = self
                        .host
                        .contract(&callee)?
                        .ok_or_else(|| ExecError::UnknownContract(callee.to_bech32m()))?;
                    let ret = self.run_frame(
                        callee,
                        contract,
                        &callee_manifest,
                        &callee_program,
                        &calldata,
                        depth + 1,
                    )?;
                    regs[*d as usize] = VmValue::Bytes(ret.unwrap_or_default());
                }
                Instr::CapEnqueue(d, k, p) => {
                    let kind = String::from_utf8(regs[*k as usize].as_bytes()?.to_vec())
                        .map_err(|_| ExecError::TypeMismatch("capability kind not UTF-8".into()))?;
                    let payload = regs[*p as usize].as_bytes()?.to_vec();
                    self.meter.charge(
                        self.gas.cap_call_base
                            + self.gas.cap_per_byte * payload.len() as u64,
                    )?;
                    if !manifest.caps.iter().any(|c| c == &kind) {
                        return Err(ExecError::Revert(format!(
                            "capability {kind:?} not declared in manifest"
                        )));
                    }
                    let task_id = self.host.aicf_task_id(&contract, &kind, &payload);
                    self.effects.enqueue(contract, kind, payload);
                    regs[*d as usize] = VmValue::Bytes(task_id.as_bytes().to_vec());
                }
                Instr::CapResult(d, t) => {
                    let raw = regs[*t as usize].as_bytes()?;
                    let task_id = Hash32::from_bytes(
                        raw.try_into()
                            .map_err(|_| ExecError::TypeMismatch("task id must be 32 bytes".into()))?,
                    );
                    self.meter.charge(self.gas.cap_call_base)?;
                    if self.host.aicf_result_consumed(&task_id)? {
                        return Err(ExecError::AlreadyConsumed(task_id.to_hex()));
                    }
                    let output = self
                        .host
                        .aicf_result(&task_id)?
                        .ok_or_else(|| ExecError::NoResultYet(task_id.to_hex()))?;
                    self.meter
                        .charge(self.gas.cap_per_byte * output.len() as u64)?;
                    self.effects.consume_result(task_id)?;
                    regs[*d as usize] = VmValue::Bytes(output);
                }
            }
        }
    }

    fn emit_event(
        &mut self,
        address: Address,
        name: String,
        payload: Vec<u8>,
    ) -> Result<(), ExecError> {
        if self.events.len() >= MAX_EVENTS_PER_CALL {
            return Err(ExecError::CapExceeded("event count cap".into()));
        }
        if self.event_data_total + payload.len() > MAX_EVENT_DATA_BYTES {
            return Err(ExecError::CapExceeded("event data cap".into()));
        }
        let topic0_cost = self.gas.hash_cost(
            self.gas.sha3_256_base,
            self.gas.sha3_256_per_64b,
            name.len(),
        );
        let topic1_cost = self.gas.hash_cost(
            self.gas.sha3_256_base,
            self.gas.sha3_256_per_64b,
            payload.len(),
        );
        self.meter.charge(
            self.gas.event_base
                + topic0_cost
                + topic1_cost
                + self.gas.event_flat
                + self.gas.event_per_byte * payload.len() as u64,
        )?;
        let topics = vec![abi::event_topic0(&name), abi::event_topic1(&payload)];
        self.event_data_total += payload.len();
        let index = self.events.len() as u32;
        self.events.push(VmEvent {
            address,
            name,
            data: payload,
            topics,
            index,
        });
        Ok(())
    }
}

fn check_storage_key(key: &[u8]) -> Result<(), ExecError> {
    if key.is_empty() || key.len() > MAX_STORAGE_KEY_BYTES {
        return Err(ExecError::CapExceeded(format!(
            "storage key {} bytes outside 1..={}",
            key.len(),
            MAX_STORAGE_KEY_BYTES
        )));
    }
    Ok(())
}

fn check_abi_bytes(len: usize) -> Result<(), ExecError> {
    if len > animica_core::constants::MAX_ABI_VALUE_BYTES {
        return Err(ExecError::CapExceeded("bytes value over 64 KiB".into()));
    }
    Ok(())
}

fn usize_from_int(v: &BigInt) -> Result<usize, ExecError> {
    if v.is_negative() {
        return Err(ExecError::Arithmetic("negative index".into()));
    }
    v.to_usize()
        .ok_or_else(|| ExecError::Arithmetic("index overflows usize".into()))
}

fn amount_from_int(v: &BigInt) -> Result<Amount, ExecError> {
    let magnitude = v
        .to_biguint()
        .ok_or_else(|| ExecError::Arithmetic("negative amount".into()))?;
    Ok(Amount::from_biguint(magnitude))
}
