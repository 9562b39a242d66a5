use thiserror::Error;

pub type EvmResult<T> = Result<T, EvmError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvmError {
    #[error("Out of gas")]
    OutOfGas,

    #[error("Stack underflow")]
    StackUnderflow,

    #[error("Stack overflow")]
    StackOverflow,

    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    #[error("Invalid jump destination: {0}")]
    InvalidJump(usize),

    #[error("Invalid subroutine entry or return")]
    InvalidSubroutine,

    #[error("State modification in static frame")]
    StaticStateChange,

    #[error("Address collision on contract creation")]
    CreateCollision,

    #[error("Slice out of range")]
    OutOfRange,

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Call depth exceeded")]
    CallDepthExceeded,

    #[error("Contract code size exceeded")]
    CodeSizeExceeded,

    #[error("Precompile failed: {0}")]
    PrecompileFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Step hook error: {0}")]
    Hook(String),
}

impl EvmError {
    /// Fatal errors unwind the whole execution rather than the current
    /// frame: a broken invariant or an aborting step hook.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EvmError::Internal(_) | EvmError::Hook(_))
    }
}
