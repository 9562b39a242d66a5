use thiserror::Error;

pub mod block;
pub mod blockchain;
pub mod header;

pub use block::{compute_transactions_root, BlockVerifier, VerifierConfig};
pub use blockchain::{Blockchain, MemoryChain};
pub use header::HeaderVerifier;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Too many uncles: {0}")]
    TooManyUncles(usize),

    #[error("Duplicate uncles")]
    DuplicateUncles,

    #[error("Invalid uncle hash")]
    InvalidUncleHash,

    #[error("Invalid uncle: {0}")]
    InvalidUncle(String),

    #[error("Invalid transactions trie")]
    InvalidTransactionsTrie,

    #[error("Invalid transactions at {}", format_tx_errors(.0))]
    InvalidTransactions(Vec<(usize, String)>),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Trie error: {0}")]
    Trie(#[from] ember_trie::TrieError),
}

fn format_tx_errors(errors: &[(usize, String)]) -> String {
    errors
        .iter()
        .map(|(index, message)| format!("#{}: {}", index, message))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, VerificationError>;
