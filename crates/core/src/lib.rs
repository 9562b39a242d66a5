pub mod block;
pub mod constants;
mod list;
pub mod transaction;

pub use block::{Block, Header};
pub use constants::{KECCAK256_RLP, KECCAK256_RLP_ARRAY};
pub use transaction::{
    AccessListItem, Eip2930Transaction, LegacyTransaction, Transaction, TransactionError,
};
