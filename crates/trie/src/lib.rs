use thiserror::Error;

pub mod nibbles;
pub mod node;
pub mod trie;

pub use nibbles::Nibbles;
pub use node::{Node, NodeRef};
pub use trie::Trie;

#[derive(Debug, Error)]
pub enum TrieError {
    #[error("Invalid node encoding")]
    InvalidNode,

    #[error("Invalid nibbles")]
    InvalidNibbles,

    #[error("Node referenced by hash only; not resolvable in memory")]
    UnresolvableNode,

    #[error("RLP error: {0}")]
    Rlp(#[from] ember_rlp::RlpError),
}

pub type Result<T> = std::result::Result<T, TrieError>;
