use crate::hardfork::{ForkConfig, GasSchedule, Hardfork};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    // 0x00 - 0x0F: Stop and Arithmetic Operations
    STOP = 0x00,
    ADD = 0x01,
    MUL = 0x02,
    SUB = 0x03,
    DIV = 0x04,
    SDIV = 0x05,
    MOD = 0x06,
    SMOD = 0x07,
    ADDMOD = 0x08,
    MULMOD = 0x09,
    EXP = 0x0a,
    SIGNEXTEND = 0x0b,

    // 0x10 - 0x1F: Comparison & Bitwise Logic Operations
    LT = 0x10,
    GT = 0x11,
    SLT = 0x12,
    SGT = 0x13,
    EQ = 0x14,
    ISZERO = 0x15,
    AND = 0x16,
    OR = 0x17,
    XOR = 0x18,
    NOT = 0x19,
    BYTE = 0x1a,
    SHL = 0x1b,
    SHR = 0x1c,
    SAR = 0x1d,

    // 0x20 - 0x2F: SHA3
    KECCAK256 = 0x20,

    // 0x30 - 0x3F: Environmental Information
    ADDRESS = 0x30,
    BALANCE = 0x31,
    ORIGIN = 0x32,
    CALLER = 0x33,
    CALLVALUE = 0x34,
    CALLDATALOAD = 0x35,
    CALLDATASIZE = 0x36,
    CALLDATACOPY = 0x37,
    CODESIZE = 0x38,
    CODECOPY = 0x39,
    GASPRICE = 0x3a,
    EXTCODESIZE = 0x3b,
    EXTCODECOPY = 0x3c,
    RETURNDATASIZE = 0x3d,
    RETURNDATACOPY = 0x3e,
    EXTCODEHASH = 0x3f,

    // 0x40 - 0x4F: Block Information
    BLOCKHASH = 0x40,
    COINBASE = 0x41,
    TIMESTAMP = 0x42,
    NUMBER = 0x43,
    DIFFICULTY = 0x44,
    GASLIMIT = 0x45,
    CHAINID = 0x46,
    SELFBALANCE = 0x47,

    // 0x50 - 0x5F: Stack, Memory, Storage and Flow Operations
    POP = 0x50,
    MLOAD = 0x51,
    MSTORE = 0x52,
    MSTORE8 = 0x53,
    SLOAD = 0x54,
    SSTORE = 0x55,
    JUMP = 0x56,
    JUMPI = 0x57,
    PC = 0x58,
    MSIZE = 0x59,
    GAS = 0x5a,
    JUMPDEST = 0x5b,
    // EIP-2315 subroutine opcodes
    BEGINSUB = 0x5c,
    RETURNSUB = 0x5d,
    JUMPSUB = 0x5e,

    // 0x60 - 0x7F: Push Operations
    PUSH1 = 0x60,
    PUSH2 = 0x61,
    PUSH3 = 0x62,
    PUSH4 = 0x63,
    PUSH5 = 0x64,
    PUSH6 = 0x65,
    PUSH7 = 0x66,
    PUSH8 = 0x67,
    PUSH9 = 0x68,
    PUSH10 = 0x69,
    PUSH11 = 0x6a,
    PUSH12 = 0x6b,
    PUSH13 = 0x6c,
    PUSH14 = 0x6d,
    PUSH15 = 0x6e,
    PUSH16 = 0x6f,
    PUSH17 = 0x70,
    PUSH18 = 0x71,
    PUSH19 = 0x72,
    PUSH20 = 0x73,
    PUSH21 = 0x74,
    PUSH22 = 0x75,
    PUSH23 = 0x76,
    PUSH24 = 0x77,
    PUSH25 = 0x78,
    PUSH26 = 0x79,
    PUSH27 = 0x7a,
    PUSH28 = 0x7b,
    PUSH29 = 0x7c,
    PUSH30 = 0x7d,
    PUSH31 = 0x7e,
    PUSH32 = 0x7f,

    // 0x80 - 0x8F: Duplication Operations
    DUP1 = 0x80,
    DUP2 = 0x81,
    DUP3 = 0x82,
    DUP4 = 0x83,
    DUP5 = 0x84,
    DUP6 = 0x85,
    DUP7 = 0x86,
    DUP8 = 0x87,
    DUP9 = 0x88,
    DUP10 = 0x89,
    DUP11 = 0x8a,
    DUP12 = 0x8b,
    DUP13 = 0x8c,
    DUP14 = 0x8d,
    DUP15 = 0x8e,
    DUP16 = 0x8f,

    // 0x90 - 0x9F: Exchange Operations
    SWAP1 = 0x90,
    SWAP2 = 0x91,
    SWAP3 = 0x92,
    SWAP4 = 0x93,
    SWAP5 = 0x94,
    SWAP6 = 0x95,
    SWAP7 = 0x96,
    SWAP8 = 0x97,
    SWAP9 = 0x98,
    SWAP10 = 0x99,
    SWAP11 = 0x9a,
    SWAP12 = 0x9b,
    SWAP13 = 0x9c,
    SWAP14 = 0x9d,
    SWAP15 = 0x9e,
    SWAP16 = 0x9f,

    // 0xA0 - 0xAF: Logging Operations
    LOG0 = 0xa0,
    LOG1 = 0xa1,
    LOG2 = 0xa2,
    LOG3 = 0xa3,
    LOG4 = 0xa4,

    // 0xF0 - 0xFF: System Operations
    CREATE = 0xf0,
    CALL = 0xf1,
    CALLCODE = 0xf2,
    RETURN = 0xf3,
    DELEGATECALL = 0xf4,
    CREATE2 = 0xf5,
    STATICCALL = 0xfa,
    REVERT = 0xfd,
    INVALID = 0xfe,
    SELFDESTRUCT = 0xff,
}

impl Opcode {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00..=0x0b | 0x10..=0x1d | 0x20 | 0x30..=0x3f | 0x40..=0x47 | 0x50..=0x5e => {
                Some(unsafe { std::mem::transmute::<u8, Opcode>(byte) })
            }
            0x60..=0xa4 => Some(unsafe { std::mem::transmute::<u8, Opcode>(byte) }),
            0xf0..=0xf5 => Some(unsafe { std::mem::transmute::<u8, Opcode>(byte) }),
            0xfa => Some(Self::STATICCALL),
            0xfd => Some(Self::REVERT),
            0xfe => Some(Self::INVALID),
            0xff => Some(Self::SELFDESTRUCT),
            _ => None,
        }
    }

    /// Availability under the active rule set.
    pub fn enabled(&self, config: &ForkConfig) -> bool {
        match self {
            Self::DELEGATECALL => config.gte(Hardfork::Homestead),
            Self::RETURNDATASIZE | Self::RETURNDATACOPY | Self::STATICCALL | Self::REVERT => {
                config.gte(Hardfork::Byzantium)
            }
            Self::SHL | Self::SHR | Self::SAR | Self::CREATE2 | Self::EXTCODEHASH => {
                config.gte(Hardfork::Constantinople)
            }
            Self::CHAINID | Self::SELFBALANCE => config.gte(Hardfork::Istanbul),
            Self::BEGINSUB | Self::RETURNSUB | Self::JUMPSUB => config.is_active_eip(2315),
            _ => true,
        }
    }

    pub fn is_push(&self) -> bool {
        let byte = *self as u8;
        (Self::PUSH1 as u8..=Self::PUSH32 as u8).contains(&byte)
    }

    pub fn push_bytes(&self) -> Option<usize> {
        if self.is_push() {
            Some((*self as u8 - Self::PUSH1 as u8 + 1) as usize)
        } else {
            None
        }
    }

    /// Bytes of immediate data following the opcode in the code stream.
    pub fn immediate_len(&self) -> usize {
        self.push_bytes().unwrap_or(0)
    }

    /// Display name. The multi-valent suffixes are computed from the byte
    /// for the trace path only.
    pub fn name(&self) -> String {
        let byte = *self as u8;
        match byte {
            0x60..=0x7f => format!("PUSH{}", byte - 0x5f),
            0x80..=0x8f => format!("DUP{}", byte - 0x7f),
            0x90..=0x9f => format!("SWAP{}", byte - 0x8f),
            0xa0..=0xa4 => format!("LOG{}", byte - 0xa0),
            _ => format!("{:?}", self),
        }
    }

    /// The constant part of the fee; handlers charge dynamic remainders.
    pub fn base_fee(&self, g: &GasSchedule) -> u64 {
        match self {
            Self::STOP | Self::RETURN | Self::REVERT | Self::INVALID => 0,

            Self::ADD
            | Self::SUB
            | Self::LT
            | Self::GT
            | Self::SLT
            | Self::SGT
            | Self::EQ
            | Self::ISZERO
            | Self::AND
            | Self::OR
            | Self::XOR
            | Self::NOT
            | Self::BYTE
            | Self::SHL
            | Self::SHR
            | Self::SAR
            | Self::CALLDATALOAD
            | Self::MLOAD
            | Self::MSTORE
            | Self::MSTORE8
            | Self::CALLDATACOPY
            | Self::CODECOPY
            | Self::RETURNDATACOPY => g.very_low,

            Self::MUL | Self::DIV | Self::SDIV | Self::MOD | Self::SMOD | Self::SIGNEXTEND => {
                g.low
            }

            Self::ADDMOD | Self::MULMOD | Self::JUMP => g.mid,
            Self::JUMPI => g.high,
            Self::EXP => g.exp,

            Self::ADDRESS
            | Self::ORIGIN
            | Self::CALLER
            | Self::CALLVALUE
            | Self::CALLDATASIZE
            | Self::CODESIZE
            | Self::GASPRICE
            | Self::RETURNDATASIZE
            | Self::COINBASE
            | Self::TIMESTAMP
            | Self::NUMBER
            | Self::DIFFICULTY
            | Self::GASLIMIT
            | Self::CHAINID
            | Self::POP
            | Self::PC
            | Self::MSIZE
            | Self::GAS => g.base,

            Self::SELFBALANCE => g.low,
            Self::BALANCE => g.balance,
            Self::EXTCODESIZE | Self::EXTCODECOPY => g.ext_code,
            Self::EXTCODEHASH => g.ext_code_hash,
            Self::BLOCKHASH => g.blockhash,
            Self::KECCAK256 => g.sha3,

            Self::SLOAD => g.sload,
            // SSTORE pricing is entirely rule-set dependent
            Self::SSTORE => 0,
            Self::JUMPDEST => g.jumpdest,

            Self::BEGINSUB => g.begin_sub,
            Self::RETURNSUB => g.return_sub,
            Self::JUMPSUB => g.jump_sub,

            Self::LOG0 | Self::LOG1 | Self::LOG2 | Self::LOG3 | Self::LOG4 => g.log,

            Self::CREATE | Self::CREATE2 => g.create,
            Self::CALL | Self::CALLCODE | Self::DELEGATECALL | Self::STATICCALL => g.call,
            Self::SELFDESTRUCT => g.selfdestruct,

            _ if self.is_push() => g.very_low,
            _ => g.very_low, // DUPn / SWAPn
        }
    }

    pub fn stack_inputs(&self) -> usize {
        let byte = *self as u8;
        match self {
            Self::STOP | Self::JUMPDEST | Self::BEGINSUB | Self::RETURNSUB | Self::INVALID => 0,
            Self::ADD | Self::MUL | Self::SUB | Self::DIV | Self::SDIV | Self::MOD | Self::SMOD => 2,
            Self::ADDMOD | Self::MULMOD => 3,
            Self::EXP | Self::SIGNEXTEND => 2,
            Self::LT | Self::GT | Self::SLT | Self::SGT | Self::EQ => 2,
            Self::ISZERO | Self::NOT => 1,
            Self::AND | Self::OR | Self::XOR | Self::BYTE => 2,
            Self::SHL | Self::SHR | Self::SAR => 2,
            Self::KECCAK256 => 2,
            Self::ADDRESS
            | Self::ORIGIN
            | Self::CALLER
            | Self::CALLVALUE
            | Self::CALLDATASIZE
            | Self::CODESIZE
            | Self::GASPRICE
            | Self::RETURNDATASIZE
            | Self::COINBASE
            | Self::TIMESTAMP
            | Self::NUMBER
            | Self::DIFFICULTY
            | Self::GASLIMIT
            | Self::CHAINID
            | Self::SELFBALANCE
            | Self::PC
            | Self::MSIZE
            | Self::GAS => 0,
            Self::CALLDATALOAD | Self::BLOCKHASH | Self::MLOAD | Self::SLOAD | Self::POP => 1,
            Self::BALANCE | Self::EXTCODESIZE | Self::EXTCODEHASH => 1,
            Self::CALLDATACOPY | Self::CODECOPY | Self::RETURNDATACOPY => 3,
            Self::EXTCODECOPY => 4,
            Self::MSTORE | Self::MSTORE8 | Self::SSTORE => 2,
            Self::JUMP | Self::JUMPSUB => 1,
            Self::JUMPI => 2,
            Self::LOG0 => 2,
            Self::LOG1 => 3,
            Self::LOG2 => 4,
            Self::LOG3 => 5,
            Self::LOG4 => 6,
            Self::CREATE => 3,
            Self::CREATE2 => 4,
            Self::CALL | Self::CALLCODE => 7,
            Self::DELEGATECALL | Self::STATICCALL => 6,
            Self::RETURN | Self::REVERT => 2,
            Self::SELFDESTRUCT => 1,
            _ if self.is_push() => 0,
            _ if (Self::DUP1 as u8..=Self::DUP16 as u8).contains(&byte) => {
                (byte - Self::DUP1 as u8 + 1) as usize
            }
            _ if (Self::SWAP1 as u8..=Self::SWAP16 as u8).contains(&byte) => {
                (byte - Self::SWAP1 as u8 + 2) as usize
            }
            _ => 0,
        }
    }

    pub fn stack_outputs(&self) -> usize {
        let byte = *self as u8;
        match self {
            Self::STOP
            | Self::JUMP
            | Self::JUMPI
            | Self::JUMPDEST
            | Self::BEGINSUB
            | Self::RETURNSUB
            | Self::JUMPSUB
            | Self::RETURN
            | Self::REVERT
            | Self::SELFDESTRUCT
            | Self::SSTORE
            | Self::POP
            | Self::MSTORE
            | Self::MSTORE8
            | Self::CALLDATACOPY
            | Self::CODECOPY
            | Self::EXTCODECOPY
            | Self::RETURNDATACOPY
            | Self::LOG0
            | Self::LOG1
            | Self::LOG2
            | Self::LOG3
            | Self::LOG4
            | Self::INVALID => 0,
            _ if self.is_push() => 1,
            _ if (Self::DUP1 as u8..=Self::DUP16 as u8).contains(&byte) => {
                (byte - Self::DUP1 as u8 + 2) as usize
            }
            _ if (Self::SWAP1 as u8..=Self::SWAP16 as u8).contains(&byte) => {
                (byte - Self::SWAP1 as u8 + 2) as usize
            }
            _ => 1,
        }
    }
}
