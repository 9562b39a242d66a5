use crate::error::EvmResult;
use crate::opcodes::Opcode;
use ember_types::{Address, U256};

/// Snapshot handed to the step hook before each opcode dispatch.
#[derive(Debug)]
pub struct StepInfo<'a> {
    pub pc: usize,
    pub opcode: Opcode,
    pub name: String,
    pub fee: u64,
    pub gas_left: u64,
    pub depth: u32,
    pub address: Address,
    pub stack: &'a [U256],
}

/// Synchronous step observer. Returning an error aborts the whole
/// execution as a fatal trap, not a frame-local one.
pub trait Inspector {
    fn on_step(&mut self, _step: StepInfo<'_>) -> EvmResult<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct NoopInspector;

impl Inspector for NoopInspector {}

/// Collects one record per executed opcode; the field layout mirrors the
/// structured trace logs served by debug tooling.
#[derive(Debug, Default)]
pub struct StructLogCollector {
    pub logs: Vec<StructLog>,
}

#[derive(Debug, Clone)]
pub struct StructLog {
    pub pc: u64,
    pub op: String,
    pub gas: u64,
    pub gas_cost: u64,
    pub depth: u32,
    pub stack: Vec<U256>,
}

impl Inspector for StructLogCollector {
    fn on_step(&mut self, step: StepInfo<'_>) -> EvmResult<()> {
        self.logs.push(StructLog {
            pc: step.pc as u64,
            op: step.name.clone(),
            gas: step.gas_left,
            gas_cost: step.fee,
            depth: step.depth,
            stack: step.stack.to_vec(),
        });
        Ok(())
    }
}
