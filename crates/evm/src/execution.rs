use ember_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

/// Per-call inputs: the immutable program plus the message context.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub caller: Address,
    pub address: Address,
    pub origin: Address,
    pub value: U256,
    pub code: Vec<u8>,
    pub data: Vec<u8>,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub block: BlockContext,
    pub is_static: bool,
    pub depth: u32,
}

#[derive(Debug, Clone)]
pub struct BlockContext {
    pub coinbase: Address,
    pub number: U256,
    pub timestamp: U256,
    pub difficulty: U256,
    pub gas_limit: U256,
    pub chain_id: U256,
    /// Hashes of recent blocks, indexed by block number.
    pub block_hashes: Vec<H256>,
}

impl Default for BlockContext {
    fn default() -> Self {
        Self {
            coinbase: Address::ZERO,
            number: U256::zero(),
            timestamp: U256::zero(),
            difficulty: U256::zero(),
            gas_limit: U256::zero(),
            chain_id: U256::one(),
            block_hashes: Vec::new(),
        }
    }
}

impl ExecutionContext {
    pub fn new(
        caller: Address,
        address: Address,
        value: U256,
        code: Vec<u8>,
        data: Vec<u8>,
        gas_limit: u64,
        block: BlockContext,
    ) -> Self {
        Self {
            caller,
            address,
            origin: caller,
            value,
            code,
            data,
            gas_price: U256::zero(),
            gas_limit,
            block,
            is_static: false,
            depth: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub gas_used: u64,
    /// Uncapped refund counter; the end-of-transaction cap is applied by
    /// the outer layer.
    pub gas_refund: u64,
    pub return_data: Vec<u8>,
    pub logs: Vec<Log>,
    pub created_address: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    Revert,
    Halt(HaltReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    OutOfGas,
    StackUnderflow,
    StackOverflow,
    InvalidOpcode(u8),
    InvalidJump,
    InvalidSubroutine,
    StateModificationInStatic,
    CreateCollision,
    CallDepthExceeded,
    InsufficientBalance,
    CodeSizeExceeded,
    OutOfRange,
    PrecompileFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Vec<u8>,
}

impl Default for ExecutionResult {
    fn default() -> Self {
        Self {
            status: ExecutionStatus::Success,
            gas_used: 0,
            gas_refund: 0,
            return_data: Vec::new(),
            logs: Vec::new(),
            created_address: None,
        }
    }
}

impl ExecutionResult {
    pub fn success(return_data: Vec<u8>, gas_used: u64) -> Self {
        Self {
            status: ExecutionStatus::Success,
            gas_used,
            return_data,
            ..Default::default()
        }
    }

    pub fn revert(return_data: Vec<u8>, gas_used: u64) -> Self {
        Self {
            status: ExecutionStatus::Revert,
            gas_used,
            return_data,
            ..Default::default()
        }
    }

    pub fn halt(reason: HaltReason, gas_used: u64) -> Self {
        Self {
            status: ExecutionStatus::Halt(reason),
            gas_used,
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    pub fn is_revert(&self) -> bool {
        self.status == ExecutionStatus::Revert
    }
}
