pub mod error;
pub mod execution;
pub mod gas;
pub mod hardfork;
pub mod inspector;
pub mod interpreter;
pub mod jumpdest;
pub mod memory;
pub mod opcodes;
pub mod precompiles;
pub mod stack;
pub mod state;

#[cfg(test)]
mod tests;

pub use error::{EvmError, EvmResult};
pub use execution::{
    BlockContext, ExecutionContext, ExecutionResult, ExecutionStatus, HaltReason, Log,
};
pub use hardfork::{ForkConfig, GasSchedule, Hardfork};
pub use inspector::{Inspector, NoopInspector, StepInfo, StructLogCollector};
pub use interpreter::{create2_address, create_address, Interpreter};
pub use opcodes::Opcode;
pub use state::{Account, MemoryState, StateDB};

use tracing::debug;

/// EVM over an in-memory world state. Each `execute` runs one outer
/// message call inside its own checkpoint.
#[derive(Debug, Default)]
pub struct Evm {
    state: MemoryState,
    config: ForkConfig,
}

impl Evm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ForkConfig) -> Self {
        Self {
            state: MemoryState::new(),
            config,
        }
    }

    pub fn config(&self) -> &ForkConfig {
        &self.config
    }

    pub fn state(&self) -> &MemoryState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut MemoryState {
        &mut self.state
    }

    pub fn execute(&mut self, context: ExecutionContext) -> EvmResult<ExecutionResult> {
        self.execute_with_inspector(context, &mut NoopInspector)
    }

    pub fn execute_with_inspector<I: Inspector>(
        &mut self,
        context: ExecutionContext,
        inspector: &mut I,
    ) -> EvmResult<ExecutionResult> {
        debug!(target: "evm", address = %format!("{:x}", context.address), gas = context.gas_limit, "executing call");

        self.state.begin_transaction();
        self.state.checkpoint();

        let result =
            Interpreter::new(context, &self.config, &mut self.state, inspector).run();

        match &result {
            Ok(outcome) if outcome.is_success() => {
                self.state.commit();
                self.state.delete_destroyed();
            }
            _ => self.state.revert(),
        }

        result
    }
}
