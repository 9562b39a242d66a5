use crate::error::{EvmError, EvmResult};
use crate::execution::{ExecutionContext, ExecutionResult, ExecutionStatus, HaltReason, Log};
use crate::gas::{
    self, copy_cost, exp_cost, log_cost, memory_cost, num_words, sha3_cost, GasMeter,
};
use crate::hardfork::{ForkConfig, Hardfork};
use crate::inspector::{Inspector, StepInfo};
use crate::jumpdest::CodeAnalysis;
use crate::memory::Memory;
use crate::opcodes::Opcode;
use crate::precompiles;
use crate::stack::Stack;
use crate::state::StateDB;
use ember_crypto::{keccak256, keccak256_concat};
use ember_rlp::Encoder;
use ember_types::{Address, H256, U256};
use tracing::trace;

const CALL_DEPTH_LIMIT: u32 = 1024;
const RETURN_STACK_LIMIT: usize = 1023;

/// One call frame: fetch-decode-execute over an immutable program with
/// its own stack, memory and gas meter. Sub-calls recurse with a fresh
/// frame over the shared state.
pub struct Interpreter<'a, S: StateDB, I: Inspector> {
    context: ExecutionContext,
    config: &'a ForkConfig,
    state: &'a mut S,
    inspector: &'a mut I,
    stack: Stack,
    memory: Memory,
    gas: GasMeter,
    analysis: CodeAnalysis,
    pc: usize,
    memory_word_count: u64,
    highest_mem_cost: u64,
    return_data: Vec<u8>,
    logs: Vec<Log>,
    return_stack: Vec<usize>,
    result: Option<ExecutionResult>,
}

impl<'a, S: StateDB, I: Inspector> Interpreter<'a, S, I> {
    pub fn new(
        context: ExecutionContext,
        config: &'a ForkConfig,
        state: &'a mut S,
        inspector: &'a mut I,
    ) -> Self {
        let analysis = CodeAnalysis::analyze(&context.code, config.is_active_eip(2315));
        let gas = GasMeter::new(context.gas_limit);
        Self {
            context,
            config,
            state,
            inspector,
            stack: Stack::new(),
            memory: Memory::new(),
            gas,
            analysis,
            pc: 0,
            memory_word_count: 0,
            highest_mem_cost: 0,
            return_data: Vec::new(),
            logs: Vec::new(),
            return_stack: Vec::new(),
            result: None,
        }
    }

    /// Run to completion. `Ok` carries every consensus outcome including
    /// traps; `Err` is reserved for fatal conditions (hook abort, broken
    /// invariants) that unwind the whole execution.
    pub fn run(&mut self) -> EvmResult<ExecutionResult> {
        while self.result.is_none() && self.pc < self.context.code.len() {
            let byte = self.context.code[self.pc];
            let op = match Opcode::from_u8(byte).filter(|op| op.enabled(self.config)) {
                Some(op) => op,
                None => return Ok(self.trap(EvmError::InvalidOpcode(byte))),
            };

            let fee = op.base_fee(self.config.schedule());
            if let Err(e) = self.inspector.on_step(StepInfo {
                pc: self.pc,
                opcode: op,
                name: op.name(),
                fee,
                gas_left: self.gas.left(),
                depth: self.context.depth,
                address: self.context.address,
                stack: self.stack.as_slice(),
            }) {
                return Err(EvmError::Hook(e.to_string()));
            }

            if let Err(e) = self.step(op, fee) {
                if e.is_fatal() {
                    return Err(e);
                }
                return Ok(self.trap(e));
            }
        }

        // Running off the end of the code is an implicit STOP
        let result = self
            .result
            .take()
            .unwrap_or_else(|| ExecutionResult::success(Vec::new(), self.gas.used()));
        Ok(self.finalize(result))
    }

    fn step(&mut self, op: Opcode, fee: u64) -> EvmResult<()> {
        self.stack.require(op.stack_inputs())?;
        self.stack
            .limit_check(op.stack_outputs().saturating_sub(op.stack_inputs()))?;
        self.gas.use_gas(fee)?;
        self.execute(op)
    }

    fn finalize(&mut self, mut result: ExecutionResult) -> ExecutionResult {
        if result.is_success() {
            result.logs = std::mem::take(&mut self.logs);
            result.gas_refund = self.gas.refund();
        }
        result
    }

    /// Frame-terminal traps consume all gas; only REVERT preserves it.
    fn trap(&mut self, error: EvmError) -> ExecutionResult {
        let reason = match error {
            EvmError::OutOfGas => HaltReason::OutOfGas,
            EvmError::StackUnderflow => HaltReason::StackUnderflow,
            EvmError::StackOverflow => HaltReason::StackOverflow,
            EvmError::InvalidOpcode(byte) => HaltReason::InvalidOpcode(byte),
            EvmError::InvalidJump(_) => HaltReason::InvalidJump,
            EvmError::InvalidSubroutine => HaltReason::InvalidSubroutine,
            EvmError::StaticStateChange => HaltReason::StateModificationInStatic,
            EvmError::CreateCollision => HaltReason::CreateCollision,
            EvmError::CallDepthExceeded => HaltReason::CallDepthExceeded,
            EvmError::InsufficientBalance => HaltReason::InsufficientBalance,
            EvmError::CodeSizeExceeded => HaltReason::CodeSizeExceeded,
            EvmError::OutOfRange => HaltReason::OutOfRange,
            EvmError::PrecompileFailed(_) => HaltReason::PrecompileFailed,
            EvmError::Internal(_) | EvmError::Hook(_) => HaltReason::OutOfGas,
        };
        ExecutionResult::halt(reason, self.gas.limit())
    }

    fn execute(&mut self, op: Opcode) -> EvmResult<()> {
        let byte = op as u8;
        match op {
            Opcode::STOP => {
                self.result = Some(ExecutionResult::success(Vec::new(), self.gas.used()));
                Ok(())
            }

            // Arithmetic; all operations are total, division by zero is
            // zero by consensus rule
            Opcode::ADD => self.binary_op(|a, b| a.overflowing_add(b).0),
            Opcode::MUL => self.binary_op(|a, b| a.overflowing_mul(b).0),
            Opcode::SUB => self.binary_op(|a, b| a.overflowing_sub(b).0),
            Opcode::DIV => self.binary_op(|a, b| if b.is_zero() { U256::zero() } else { a / b }),
            Opcode::SDIV => self.binary_op(signed_div),
            Opcode::MOD => self.binary_op(|a, b| if b.is_zero() { U256::zero() } else { a % b }),
            Opcode::SMOD => self.binary_op(signed_mod),
            Opcode::ADDMOD => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                let n = self.stack.pop()?;
                let result = if n.is_zero() {
                    U256::zero()
                } else {
                    let sum = ember_types::U512::from(a) + ember_types::U512::from(b);
                    let rem = sum % ember_types::U512::from(n);
                    U256::try_from(rem).unwrap_or_else(|_| U256::zero())
                };
                self.stack.push(result)?;
                self.pc += 1;
                Ok(())
            }
            Opcode::MULMOD => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                let n = self.stack.pop()?;
                let result = if n.is_zero() {
                    U256::zero()
                } else {
                    let product = a.full_mul(b);
                    let rem = product % ember_types::U512::from(n);
                    U256::try_from(rem).unwrap_or_else(|_| U256::zero())
                };
                self.stack.push(result)?;
                self.pc += 1;
                Ok(())
            }
            Opcode::EXP => {
                let base = self.stack.pop()?;
                let exponent = self.stack.pop()?;
                self.gas
                    .use_gas(exp_cost(self.config.schedule(), &exponent))?;
                self.stack.push(base.overflowing_pow(exponent).0)?;
                self.pc += 1;
                Ok(())
            }
            Opcode::SIGNEXTEND => self.binary_op(sign_extend),

            // Comparison and bitwise
            Opcode::LT => self.binary_op(|a, b| bool_word(a < b)),
            Opcode::GT => self.binary_op(|a, b| bool_word(a > b)),
            Opcode::SLT => self.binary_op(|a, b| bool_word(signed_lt(a, b))),
            Opcode::SGT => self.binary_op(|a, b| bool_word(signed_lt(b, a))),
            Opcode::EQ => self.binary_op(|a, b| bool_word(a == b)),
            Opcode::ISZERO => {
                let a = self.stack.pop()?;
                self.stack.push(bool_word(a.is_zero()))?;
                self.pc += 1;
                Ok(())
            }
            Opcode::AND => self.binary_op(|a, b| a & b),
            Opcode::OR => self.binary_op(|a, b| a | b),
            Opcode::XOR => self.binary_op(|a, b| a ^ b),
            Opcode::NOT => {
                let a = self.stack.pop()?;
                self.stack.push(!a)?;
                self.pc += 1;
                Ok(())
            }
            Opcode::BYTE => self.binary_op(|i, x| {
                if i < U256::from(32) {
                    U256::from(x.byte(31 - i.as_u64() as usize))
                } else {
                    U256::zero()
                }
            }),
            Opcode::SHL => self.binary_op(|shift, value| {
                if shift >= U256::from(256) {
                    U256::zero()
                } else {
                    value << shift.as_u64() as usize
                }
            }),
            Opcode::SHR => self.binary_op(|shift, value| {
                if shift >= U256::from(256) {
                    U256::zero()
                } else {
                    value >> shift.as_u64() as usize
                }
            }),
            Opcode::SAR => self.binary_op(arithmetic_shr),

            Opcode::KECCAK256 => {
                let offset = self.stack.pop()?;
                let size = self.stack.pop()?;
                self.extend_memory(offset, size)?;
                self.gas
                    .use_gas(sha3_cost(self.config.schedule(), low_u64(size)))?;
                let data = self.memory_slice(offset, size)?;
                self.stack
                    .push(U256::from_big_endian(keccak256(&data).as_bytes()))?;
                self.pc += 1;
                Ok(())
            }

            // Environment
            Opcode::ADDRESS => self.push_value(self.context.address.to_word()),
            Opcode::BALANCE => {
                let address = Address::from_word(self.stack.pop()?);
                self.stack.push(self.state.get_balance(&address))?;
                self.pc += 1;
                Ok(())
            }
            Opcode::ORIGIN => self.push_value(self.context.origin.to_word()),
            Opcode::CALLER => self.push_value(self.context.caller.to_word()),
            Opcode::CALLVALUE => self.push_value(self.context.value),
            Opcode::CALLDATALOAD => {
                let offset = self.stack.pop()?;
                let word = slice_padded(&self.context.data, offset, 32);
                self.stack.push(U256::from_big_endian(&word))?;
                self.pc += 1;
                Ok(())
            }
            Opcode::CALLDATASIZE => self.push_value(U256::from(self.context.data.len())),
            Opcode::CALLDATACOPY => {
                let data = std::mem::take(&mut self.context.data);
                let result = self.copy_to_memory(&data);
                self.context.data = data;
                result
            }
            Opcode::CODESIZE => self.push_value(U256::from(self.context.code.len())),
            Opcode::CODECOPY => {
                let code = std::mem::take(&mut self.context.code);
                let result = self.copy_to_memory(&code);
                self.context.code = code;
                result
            }
            Opcode::GASPRICE => self.push_value(self.context.gas_price),
            Opcode::EXTCODESIZE => {
                let address = Address::from_word(self.stack.pop()?);
                let size = self.state.get_code(&address).len();
                self.stack.push(U256::from(size))?;
                self.pc += 1;
                Ok(())
            }
            Opcode::EXTCODECOPY => {
                let address = Address::from_word(self.stack.pop()?);
                let code = self.state.get_code(&address);
                self.copy_to_memory(&code)
            }
            Opcode::RETURNDATASIZE => self.push_value(U256::from(self.return_data.len())),
            Opcode::RETURNDATACOPY => {
                let mem_offset = self.stack.pop()?;
                let data_offset = self.stack.pop()?;
                let size = self.stack.pop()?;

                // Reads past the return buffer are a hard trap, unlike
                // the zero-extending copies
                let end = data_offset
                    .checked_add(size)
                    .ok_or(EvmError::OutOfRange)?;
                if end > U256::from(self.return_data.len()) {
                    return Err(EvmError::OutOfRange);
                }

                self.extend_memory(mem_offset, size)?;
                self.gas
                    .use_gas(copy_cost(self.config.schedule(), low_u64(size)))?;
                if !size.is_zero() {
                    let start = self.as_usize(data_offset)?;
                    let len = self.as_usize(size)?;
                    let data = self.return_data[start..start + len].to_vec();
                    let offset = self.as_usize(mem_offset)?;
                    self.memory.set(offset, &data)?;
                }
                self.pc += 1;
                Ok(())
            }
            Opcode::EXTCODEHASH => {
                let address = Address::from_word(self.stack.pop()?);
                let hash = if self.state.is_empty(&address) {
                    U256::zero()
                } else {
                    U256::from_big_endian(keccak256(&self.state.get_code(&address)).as_bytes())
                };
                self.stack.push(hash)?;
                self.pc += 1;
                Ok(())
            }

            // Block information
            Opcode::BLOCKHASH => {
                let number = self.stack.pop()?;
                let block = &self.context.block;
                let hash = if number >= block.number
                    || block.number - number > U256::from(256)
                {
                    H256::zero()
                } else {
                    block
                        .block_hashes
                        .get(number.as_u64() as usize)
                        .copied()
                        .unwrap_or_default()
                };
                self.stack.push(U256::from_big_endian(hash.as_bytes()))?;
                self.pc += 1;
                Ok(())
            }
            Opcode::COINBASE => self.push_value(self.context.block.coinbase.to_word()),
            Opcode::TIMESTAMP => self.push_value(self.context.block.timestamp),
            Opcode::NUMBER => self.push_value(self.context.block.number),
            Opcode::DIFFICULTY => self.push_value(self.context.block.difficulty),
            Opcode::GASLIMIT => self.push_value(self.context.block.gas_limit),
            Opcode::CHAINID => self.push_value(self.context.block.chain_id),
            Opcode::SELFBALANCE => {
                let balance = self.state.get_balance(&self.context.address);
                self.push_value(balance)
            }

            // Stack, memory, storage, flow
            Opcode::POP => {
                self.stack.pop()?;
                self.pc += 1;
                Ok(())
            }
            Opcode::MLOAD => {
                let offset = self.stack.pop()?;
                self.extend_memory(offset, U256::from(32))?;
                let value = self.memory.get_word(self.as_usize(offset)?);
                self.stack.push(value)?;
                self.pc += 1;
                Ok(())
            }
            Opcode::MSTORE => {
                let offset = self.stack.pop()?;
                let value = self.stack.pop()?;
                self.extend_memory(offset, U256::from(32))?;
                let offset = self.as_usize(offset)?;
                self.memory.set_word(offset, value)?;
                self.pc += 1;
                Ok(())
            }
            Opcode::MSTORE8 => {
                let offset = self.stack.pop()?;
                let value = self.stack.pop()?;
                self.extend_memory(offset, U256::one())?;
                let offset = self.as_usize(offset)?;
                self.memory.set_byte(offset, value.byte(0))?;
                self.pc += 1;
                Ok(())
            }
            Opcode::SLOAD => {
                let key = word_to_h256(self.stack.pop()?);
                let value = self.state.get_storage(&self.context.address, &key);
                self.stack.push(U256::from_big_endian(value.as_bytes()))?;
                self.pc += 1;
                Ok(())
            }
            Opcode::SSTORE => {
                if self.context.is_static {
                    return Err(EvmError::StaticStateChange);
                }
                let key = word_to_h256(self.stack.pop()?);
                let new = word_to_h256(self.stack.pop()?);

                let address = self.context.address;
                let current = self.state.get_storage(&address, &key);
                let original = self.state.get_original_storage(&address, &key);

                let (cost, refund_delta) = gas::sstore_gas_and_refund(
                    self.config,
                    original,
                    current,
                    new,
                    self.gas.left(),
                )?;
                self.gas.use_gas(cost)?;
                self.gas.apply_refund_delta(refund_delta)?;

                self.state.set_storage(address, key, new);
                self.pc += 1;
                Ok(())
            }
            Opcode::JUMP => {
                let dest = self.stack.pop()?;
                self.jump(dest)
            }
            Opcode::JUMPI => {
                let dest = self.stack.pop()?;
                let condition = self.stack.pop()?;
                if condition.is_zero() {
                    self.pc += 1;
                    Ok(())
                } else {
                    self.jump(dest)
                }
            }
            Opcode::PC => self.push_value(U256::from(self.pc)),
            Opcode::MSIZE => self.push_value(U256::from(self.memory_word_count * 32)),
            Opcode::GAS => self.push_value(U256::from(self.gas.left())),
            Opcode::JUMPDEST => {
                self.pc += 1;
                Ok(())
            }

            // EIP-2315 subroutines
            Opcode::BEGINSUB => Err(EvmError::InvalidSubroutine),
            Opcode::JUMPSUB => {
                let dest = self.stack.pop()?;
                let dest = self.as_usize(dest)?;
                if !self.analysis.is_valid_jump_sub(dest) {
                    return Err(EvmError::InvalidSubroutine);
                }
                if self.return_stack.len() >= RETURN_STACK_LIMIT {
                    return Err(EvmError::StackOverflow);
                }
                self.return_stack.push(self.pc + 1);
                self.pc = dest + 1;
                Ok(())
            }
            Opcode::RETURNSUB => {
                let return_pc = self
                    .return_stack
                    .pop()
                    .ok_or(EvmError::InvalidSubroutine)?;
                self.pc = return_pc;
                Ok(())
            }

            // Logging
            Opcode::LOG0 | Opcode::LOG1 | Opcode::LOG2 | Opcode::LOG3 | Opcode::LOG4 => {
                if self.context.is_static {
                    return Err(EvmError::StaticStateChange);
                }
                let topic_count = (byte - Opcode::LOG0 as u8) as usize;
                let offset = self.stack.pop()?;
                let size = self.stack.pop()?;

                let mut topics = Vec::with_capacity(topic_count);
                for _ in 0..topic_count {
                    topics.push(word_to_h256(self.stack.pop()?));
                }

                self.extend_memory(offset, size)?;
                self.gas.use_gas(log_cost(
                    self.config.schedule(),
                    topic_count as u64,
                    low_u64(size),
                ))?;

                let data = self.memory_slice(offset, size)?;
                self.logs.push(Log {
                    address: self.context.address,
                    topics,
                    data,
                });
                self.pc += 1;
                Ok(())
            }

            // System
            Opcode::CREATE => self.do_create(false),
            Opcode::CREATE2 => self.do_create(true),
            Opcode::CALL | Opcode::CALLCODE | Opcode::DELEGATECALL | Opcode::STATICCALL => {
                self.do_call(op)
            }
            Opcode::RETURN => {
                let offset = self.stack.pop()?;
                let size = self.stack.pop()?;
                self.extend_memory(offset, size)?;
                let data = self.memory_slice(offset, size)?;
                self.result = Some(ExecutionResult::success(data, self.gas.used()));
                Ok(())
            }
            Opcode::REVERT => {
                let offset = self.stack.pop()?;
                let size = self.stack.pop()?;
                self.extend_memory(offset, size)?;
                let data = self.memory_slice(offset, size)?;
                // Unlike other traps, remaining gas is preserved
                self.result = Some(ExecutionResult::revert(data, self.gas.used()));
                Ok(())
            }
            Opcode::INVALID => Err(EvmError::InvalidOpcode(byte)),
            Opcode::SELFDESTRUCT => self.do_selfdestruct(),

            _ if op.is_push() => {
                let n = op.push_bytes().unwrap_or(0);
                let start = self.pc + 1;
                let end = (start + n).min(self.context.code.len());
                let mut bytes = [0u8; 32];
                let data = &self.context.code[start..end];
                bytes[32 - n..32 - n + data.len()].copy_from_slice(data);
                self.stack.push(U256::from_big_endian(&bytes[32 - n..]))?;
                self.pc = start + n;
                Ok(())
            }

            _ if (Opcode::DUP1 as u8..=Opcode::DUP16 as u8).contains(&byte) => {
                self.stack.dup((byte - Opcode::DUP1 as u8) as usize)?;
                self.pc += 1;
                Ok(())
            }

            _ if (Opcode::SWAP1 as u8..=Opcode::SWAP16 as u8).contains(&byte) => {
                self.stack.swap((byte - Opcode::SWAP1 as u8 + 1) as usize)?;
                self.pc += 1;
                Ok(())
            }

            _ => Err(EvmError::InvalidOpcode(byte)),
        }
    }

    fn binary_op<F: FnOnce(U256, U256) -> U256>(&mut self, f: F) -> EvmResult<()> {
        let a = self.stack.pop()?;
        let b = self.stack.pop()?;
        self.stack.push(f(a, b))?;
        self.pc += 1;
        Ok(())
    }

    fn push_value(&mut self, value: U256) -> EvmResult<()> {
        self.stack.push(value)?;
        self.pc += 1;
        Ok(())
    }

    fn jump(&mut self, dest: U256) -> EvmResult<()> {
        if dest > U256::from(usize::MAX as u64) {
            return Err(EvmError::InvalidJump(usize::MAX));
        }
        let dest = dest.as_u64() as usize;
        if !self.analysis.is_valid_jump(dest) {
            return Err(EvmError::InvalidJump(dest));
        }
        self.pc = dest;
        Ok(())
    }

    /// Word-aligned expansion billed as the positive delta over the
    /// highest cost already paid. Zero-length accesses never extend.
    fn extend_memory(&mut self, offset: U256, len: U256) -> EvmResult<()> {
        if len.is_zero() {
            return Ok(());
        }

        let end = offset.checked_add(len).ok_or(EvmError::OutOfGas)?;
        if end > U256::from(u32::MAX) {
            return Err(EvmError::OutOfGas);
        }

        let new_words = num_words(end.as_u64());
        if new_words > self.memory_word_count {
            let cost = memory_cost(self.config.schedule(), new_words);
            let delta = cost.saturating_sub(self.highest_mem_cost);
            self.gas.use_gas(delta)?;
            self.highest_mem_cost = self.highest_mem_cost.max(cost);
            self.memory_word_count = new_words;
            self.memory.resize((new_words * 32) as usize);
        }
        Ok(())
    }

    fn as_usize(&self, value: U256) -> EvmResult<usize> {
        if value > U256::from(usize::MAX as u64) {
            Err(EvmError::OutOfRange)
        } else {
            Ok(value.as_u64() as usize)
        }
    }

    /// Read a billed memory range; callers extend first.
    fn memory_slice(&self, offset: U256, size: U256) -> EvmResult<Vec<u8>> {
        if size.is_zero() {
            return Ok(Vec::new());
        }
        Ok(self
            .memory
            .get(self.as_usize(offset)?, self.as_usize(size)?))
    }

    /// Shared body of the *COPY opcodes: (mem_offset, src_offset, len)
    /// popped, source zero-extended.
    fn copy_to_memory(&mut self, source: &[u8]) -> EvmResult<()> {
        let mem_offset = self.stack.pop()?;
        let src_offset = self.stack.pop()?;
        let size = self.stack.pop()?;

        self.extend_memory(mem_offset, size)?;
        self.gas
            .use_gas(copy_cost(self.config.schedule(), low_u64(size)))?;

        if !size.is_zero() {
            let data = slice_padded(source, src_offset, self.as_usize(size)?);
            let offset = self.as_usize(mem_offset)?;
            self.memory.set(offset, &data)?;
        }
        self.pc += 1;
        Ok(())
    }

    /// At or after Tangerine Whistle a caller retains one 64th of its
    /// remaining gas; the requested amount is capped, not rejected.
    fn forwardable_gas(&self, requested: u64) -> u64 {
        if self.config.gte(Hardfork::TangerineWhistle) {
            let left = self.gas.left();
            requested.min(left - left / 64)
        } else {
            requested
        }
    }

    fn call_failed(&mut self, returned_gas: u64) -> EvmResult<()> {
        self.gas.return_gas(returned_gas);
        self.return_data.clear();
        self.stack.push(U256::zero())?;
        self.pc += 1;
        Ok(())
    }

    fn write_call_output(&mut self, out_offset: U256, out_len: U256, data: &[u8]) -> EvmResult<()> {
        if out_len.is_zero() || data.is_empty() {
            return Ok(());
        }
        let offset = self.as_usize(out_offset)?;
        let len = self.as_usize(out_len)?.min(data.len());
        self.memory.set(offset, &data[..len])
    }

    fn transfer(&mut self, from: Address, to: Address, value: U256) {
        if value.is_zero() || from == to {
            return;
        }
        let from_balance = self.state.get_balance(&from);
        let to_balance = self.state.get_balance(&to);
        self.state.set_balance(from, from_balance - value);
        self.state.set_balance(to, to_balance + value);
    }

    fn do_call(&mut self, op: Opcode) -> EvmResult<()> {
        let g = self.config.schedule().clone();

        let gas_word = self.stack.pop()?;
        let to = Address::from_word(self.stack.pop()?);
        let value = if matches!(op, Opcode::CALL | Opcode::CALLCODE) {
            self.stack.pop()?
        } else {
            U256::zero()
        };
        let in_offset = self.stack.pop()?;
        let in_len = self.stack.pop()?;
        let out_offset = self.stack.pop()?;
        let out_len = self.stack.pop()?;

        if op == Opcode::CALL && self.context.is_static && !value.is_zero() {
            return Err(EvmError::StaticStateChange);
        }

        // Dynamic charges come out before the 63/64 cap is computed
        let mut extra = 0u64;
        if !value.is_zero() {
            extra += g.call_value;
        }
        if op == Opcode::CALL {
            if self.config.gte(Hardfork::SpuriousDragon) {
                if !value.is_zero() && self.state.is_empty(&to) {
                    extra += g.new_account;
                }
            } else if !self.state.exists(&to) {
                extra += g.new_account;
            }
        }
        self.gas.use_gas(extra)?;

        self.extend_memory(in_offset, in_len)?;
        self.extend_memory(out_offset, out_len)?;

        let requested = if gas_word > U256::from(u64::MAX) {
            u64::MAX
        } else {
            gas_word.as_u64()
        };
        let forward = self.forwardable_gas(requested);
        self.gas.use_gas(forward)?;

        let stipend = if value.is_zero() { 0 } else { g.call_stipend };
        let child_limit = forward + stipend;

        let input = self.memory_slice(in_offset, in_len)?;

        // Only the charged portion comes back; the stipend was never paid
        if self.context.depth >= CALL_DEPTH_LIMIT {
            return self.call_failed(forward);
        }
        if !value.is_zero() && self.state.get_balance(&self.context.address) < value {
            return self.call_failed(forward);
        }

        trace!(target: "evm", op = %op.name(), to = %format!("{:x}", to), gas = forward, "message call");

        self.state.checkpoint();

        if op == Opcode::CALL {
            self.transfer(self.context.address, to, value);
        }

        // Precompiles execute natively, no child frame
        if let Some(precompile) = precompiles::precompile_at(&to, self.config) {
            match precompile.execute(&input, child_limit) {
                Ok((output, cost)) => {
                    self.state.commit();
                    self.gas.return_gas(child_limit - cost);
                    self.return_data = output.clone();
                    self.write_call_output(out_offset, out_len, &output)?;
                    self.stack.push(U256::one())?;
                }
                Err(_) => {
                    self.state.revert();
                    self.return_data.clear();
                    self.stack.push(U256::zero())?;
                }
            }
            self.pc += 1;
            return Ok(());
        }

        let (child_address, child_caller, child_value, is_static) = match op {
            Opcode::CALL => (to, self.context.address, value, self.context.is_static),
            Opcode::CALLCODE => (
                self.context.address,
                self.context.address,
                value,
                self.context.is_static,
            ),
            Opcode::DELEGATECALL => (
                self.context.address,
                self.context.caller,
                self.context.value,
                self.context.is_static,
            ),
            _ => (to, self.context.address, U256::zero(), true),
        };

        let child_context = ExecutionContext {
            caller: child_caller,
            address: child_address,
            origin: self.context.origin,
            value: child_value,
            code: self.state.get_code(&to),
            data: input,
            gas_price: self.context.gas_price,
            gas_limit: child_limit,
            block: self.context.block.clone(),
            is_static,
            depth: self.context.depth + 1,
        };

        let result =
            Interpreter::new(child_context, self.config, &mut *self.state, &mut *self.inspector)
                .run()?;

        match result.status {
            ExecutionStatus::Success => {
                self.state.commit();
                self.gas.return_gas(child_limit - result.gas_used);
                self.gas.refund_gas(result.gas_refund);
                self.logs.extend(result.logs);
                self.return_data = result.return_data.clone();
                self.write_call_output(out_offset, out_len, &result.return_data)?;
                self.stack.push(U256::one())?;
            }
            ExecutionStatus::Revert => {
                self.state.revert();
                self.gas.return_gas(child_limit - result.gas_used);
                self.return_data = result.return_data.clone();
                self.write_call_output(out_offset, out_len, &result.return_data)?;
                self.stack.push(U256::zero())?;
            }
            ExecutionStatus::Halt(_) => {
                self.state.revert();
                self.return_data.clear();
                self.stack.push(U256::zero())?;
            }
        }
        self.pc += 1;
        Ok(())
    }

    fn do_create(&mut self, is_create2: bool) -> EvmResult<()> {
        if self.context.is_static {
            return Err(EvmError::StaticStateChange);
        }
        let g = self.config.schedule().clone();

        let value = self.stack.pop()?;
        let offset = self.stack.pop()?;
        let length = self.stack.pop()?;
        let salt = if is_create2 {
            Some(self.stack.pop()?)
        } else {
            None
        };

        self.extend_memory(offset, length)?;
        if is_create2 {
            // Hashing the init code for the address derivation
            self.gas.use_gas(sha3_cost(&g, low_u64(length)))?;
        }
        let init_code = self.memory_slice(offset, length)?;

        let forward = self.forwardable_gas(self.gas.left());
        self.gas.use_gas(forward)?;

        if self.context.depth >= CALL_DEPTH_LIMIT {
            return self.call_failed(forward);
        }
        if self.state.get_balance(&self.context.address) < value {
            return self.call_failed(forward);
        }

        let creator = self.context.address;
        let new_address = match salt {
            None => create_address(&creator, self.state.get_nonce(&creator)),
            Some(salt) => create2_address(&creator, salt, &init_code),
        };

        self.state.increment_nonce(creator);

        // A live account at the target address aborts the creation and
        // swallows the forwarded gas
        if let Some(existing) = self.state.get_account(&new_address) {
            if existing.nonce > 0 || !existing.code.is_empty() {
                trace!(target: "evm", address = %format!("{:x}", new_address), "create collision");
                self.return_data.clear();
                self.stack.push(U256::zero())?;
                self.pc += 1;
                return Ok(());
            }
        }

        trace!(target: "evm", address = %format!("{:x}", new_address), gas = forward, "contract creation");

        self.state.checkpoint();

        let mut account = self.state.get_account(&new_address).unwrap_or_default();
        account.nonce = if self.config.gte(Hardfork::SpuriousDragon) {
            1
        } else {
            0
        };
        account.code = Vec::new();
        self.state.set_account(new_address, account);
        self.transfer(creator, new_address, value);

        let child_context = ExecutionContext {
            caller: creator,
            address: new_address,
            origin: self.context.origin,
            value,
            code: init_code,
            data: Vec::new(),
            gas_price: self.context.gas_price,
            gas_limit: forward,
            block: self.context.block.clone(),
            is_static: false,
            depth: self.context.depth + 1,
        };

        let result =
            Interpreter::new(child_context, self.config, &mut *self.state, &mut *self.inspector)
                .run()?;

        match result.status {
            ExecutionStatus::Success => {
                let code = result.return_data;
                if code.len() > g.max_code_size {
                    self.state.revert();
                    self.return_data.clear();
                    self.stack.push(U256::zero())?;
                    self.pc += 1;
                    return Ok(());
                }

                let deposit = g.code_deposit.saturating_mul(code.len() as u64);
                let child_left = forward - result.gas_used;

                if deposit <= child_left {
                    self.state.set_code(new_address, code);
                    self.state.commit();
                    self.gas.return_gas(child_left - deposit);
                    self.gas.refund_gas(result.gas_refund);
                    self.logs.extend(result.logs);
                    self.return_data.clear();
                    self.stack.push(new_address.to_word())?;
                } else if !self.config.gte(Hardfork::Homestead) {
                    // Frontier kept the account, minus the code it could
                    // not pay to deposit
                    self.state.commit();
                    self.gas.return_gas(child_left);
                    self.gas.refund_gas(result.gas_refund);
                    self.logs.extend(result.logs);
                    self.return_data.clear();
                    self.stack.push(new_address.to_word())?;
                } else {
                    self.state.revert();
                    self.return_data.clear();
                    self.stack.push(U256::zero())?;
                }
            }
            ExecutionStatus::Revert => {
                self.state.revert();
                self.gas.return_gas(forward - result.gas_used);
                self.return_data = result.return_data;
                self.stack.push(U256::zero())?;
            }
            ExecutionStatus::Halt(_) => {
                self.state.revert();
                self.return_data.clear();
                self.stack.push(U256::zero())?;
            }
        }
        self.pc += 1;
        Ok(())
    }

    fn do_selfdestruct(&mut self) -> EvmResult<()> {
        if self.context.is_static {
            return Err(EvmError::StaticStateChange);
        }
        let g = self.config.schedule();

        let beneficiary = Address::from_word(self.stack.pop()?);
        let address = self.context.address;
        let balance = self.state.get_balance(&address);

        let mut extra = 0u64;
        if self.config.gte(Hardfork::SpuriousDragon) {
            if !balance.is_zero() && self.state.is_empty(&beneficiary) {
                extra = g.new_account;
            }
        } else if self.config.gte(Hardfork::TangerineWhistle) && !self.state.exists(&beneficiary) {
            extra = g.new_account;
        }
        let refund = g.selfdestruct_refund;
        self.gas.use_gas(extra)?;

        if !self.state.is_destroyed(&address) {
            self.gas.refund_gas(refund);
        }

        // The whole balance moves; a self-beneficiary burns it
        self.state.set_balance(address, U256::zero());
        if beneficiary != address {
            let beneficiary_balance = self.state.get_balance(&beneficiary);
            self.state
                .set_balance(beneficiary, beneficiary_balance + balance);
        }
        self.state.mark_destroyed(address);

        self.result = Some(ExecutionResult::success(Vec::new(), self.gas.used()));
        Ok(())
    }
}

fn bool_word(b: bool) -> U256 {
    if b {
        U256::one()
    } else {
        U256::zero()
    }
}

fn low_u64(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.as_u64()
    }
}

fn word_to_h256(word: U256) -> H256 {
    let mut bytes = [0u8; 32];
    word.to_big_endian(&mut bytes);
    H256::from(bytes)
}

/// Zero-extended read of `size` bytes at a word offset.
fn slice_padded(data: &[u8], offset: U256, size: usize) -> Vec<u8> {
    if size == 0 {
        return Vec::new();
    }
    if offset > U256::from(data.len()) {
        return vec![0; size];
    }
    let offset = offset.as_u64() as usize;
    let end = (offset + size).min(data.len());
    let mut out = data[offset..end].to_vec();
    out.resize(size, 0);
    out
}

fn is_negative(value: U256) -> bool {
    value.bit(255)
}

fn twos_complement(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

fn signed_lt(a: U256, b: U256) -> bool {
    match (is_negative(a), is_negative(b)) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

fn signed_div(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }

    let a_negative = is_negative(a);
    let b_negative = is_negative(b);

    let a_abs = if a_negative { twos_complement(a) } else { a };
    let b_abs = if b_negative { twos_complement(b) } else { b };

    // -2^255 / -1 wraps back to -2^255
    let quotient = a_abs / b_abs;

    if a_negative != b_negative {
        twos_complement(quotient)
    } else {
        quotient
    }
}

fn signed_mod(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }

    let a_negative = is_negative(a);

    let a_abs = if a_negative { twos_complement(a) } else { a };
    let b_abs = if is_negative(b) { twos_complement(b) } else { b };

    let remainder = a_abs % b_abs;

    if a_negative && !remainder.is_zero() {
        twos_complement(remainder)
    } else {
        remainder
    }
}

/// SIGNEXTEND: extend `x` from bit 8k+7.
fn sign_extend(k: U256, x: U256) -> U256 {
    if k >= U256::from(32) {
        return x;
    }

    let bit_index = k.as_u64() as usize * 8 + 7;
    let mask = (U256::one() << (bit_index + 1)) - U256::one();
    if x.bit(bit_index) {
        x | !mask
    } else {
        x & mask
    }
}

fn arithmetic_shr(shift: U256, value: U256) -> U256 {
    if shift >= U256::from(256) {
        if is_negative(value) {
            return U256::MAX;
        }
        return U256::zero();
    }

    let shift = shift.as_u64() as usize;
    let shifted = value >> shift;
    if is_negative(value) && shift > 0 {
        shifted | (U256::MAX << (256 - shift))
    } else {
        shifted
    }
}

/// CREATE address: low 160 bits of keccak256(rlp([sender, nonce])).
pub fn create_address(sender: &Address, nonce: u64) -> Address {
    let mut encoder = Encoder::new();
    encoder.encode_list_with(|e| {
        e.encode_bytes(sender.as_bytes());
        e.encode_u64(nonce);
    });
    let hash = keccak256(&encoder.finish());
    Address::from_word(U256::from_big_endian(hash.as_bytes()))
}

/// CREATE2 address: low 160 bits of
/// keccak256(0xff || sender || salt || keccak256(init_code)).
pub fn create2_address(sender: &Address, salt: U256, init_code: &[u8]) -> Address {
    let mut salt_bytes = [0u8; 32];
    salt.to_big_endian(&mut salt_bytes);
    let code_hash = keccak256(init_code);
    let hash = keccak256_concat(&[
        &[0xff],
        sender.as_bytes(),
        &salt_bytes,
        code_hash.as_bytes(),
    ]);
    Address::from_word(U256::from_big_endian(hash.as_bytes()))
}
