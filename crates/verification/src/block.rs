use crate::blockchain::Blockchain;
use crate::header::HeaderVerifier;
use crate::{Result, VerificationError};
use ember_core::{Block, Header, Transaction, KECCAK256_RLP};
use ember_rlp::Encoder;
use ember_trie::Trie;
use ember_types::{H256, U256};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

const MAX_UNCLES: usize = 2;
const MAX_UNCLE_DEPTH: u64 = 7;

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub chain_id: u64,
    /// EIP-2028 calldata pricing for the intrinsic-gas check.
    pub istanbul: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            istanbul: true,
        }
    }
}

/// Root of the transaction trie: `(rlp(index), tx.serialize())` inserted
/// in order.
pub fn compute_transactions_root(transactions: &[Transaction]) -> Result<H256> {
    if transactions.is_empty() {
        return Ok(KECCAK256_RLP);
    }

    let mut trie = Trie::new();
    for (index, tx) in transactions.iter().enumerate() {
        let mut encoder = Encoder::new();
        encoder.encode_u64(index as u64);
        trie.insert(&encoder.finish(), tx.serialize())?;
    }
    Ok(trie.root_hash())
}

/// Structural block validation: uncle rules, the uncles hash, the
/// transactions trie and per-transaction checks. Header validation is
/// delegated to [`HeaderVerifier`].
pub struct BlockVerifier<C> {
    chain: Arc<C>,
    config: VerifierConfig,
}

impl<C: Blockchain> BlockVerifier<C> {
    pub fn new(chain: Arc<C>) -> Self {
        Self {
            chain,
            config: VerifierConfig::default(),
        }
    }

    pub fn with_config(chain: Arc<C>, config: VerifierConfig) -> Self {
        Self { chain, config }
    }

    /// Validate the whole block. The three independent subtasks run
    /// concurrently and join before the per-transaction pass.
    pub async fn validate(&self, block: &Block) -> Result<()> {
        debug!(target: "verification", number = %block.number(), "validating block");

        let header_verifier = HeaderVerifier::new(self.chain.clone());
        let (uncles, trie, header) = tokio::join!(
            self.validate_uncles(block),
            self.validate_transactions_trie(block),
            header_verifier.validate(&block.header),
        );
        uncles?;
        trie?;
        header?;

        let errors = self.validate_transactions(block);
        if !errors.is_empty() {
            warn!(target: "verification", number = %block.number(), count = errors.len(), "invalid transactions");
            return Err(VerificationError::InvalidTransactions(errors));
        }

        Ok(())
    }

    /// Uncle structure: at most two, all distinct, committed to by the
    /// header's uncles hash, each eligible at this height.
    pub async fn validate_uncles(&self, block: &Block) -> Result<()> {
        if block.is_genesis() {
            return Ok(());
        }

        if block.uncle_headers.len() > MAX_UNCLES {
            return Err(VerificationError::TooManyUncles(block.uncle_headers.len()));
        }

        let mut seen = HashSet::new();
        for uncle in &block.uncle_headers {
            if !seen.insert(uncle.hash()) {
                return Err(VerificationError::DuplicateUncles);
            }
        }

        let computed = Block::compute_uncles_hash(&block.uncle_headers);
        if computed != block.header.uncles_hash {
            return Err(VerificationError::InvalidUncleHash);
        }

        for uncle in &block.uncle_headers {
            self.validate_uncle(uncle, block)?;
        }

        Ok(())
    }

    fn validate_uncle(&self, uncle: &Header, block: &Block) -> Result<()> {
        let number = block.number();

        if uncle.number >= number {
            return Err(VerificationError::InvalidUncle(
                "uncle is not older than the block".to_string(),
            ));
        }

        if number - uncle.number > U256::from(MAX_UNCLE_DEPTH) {
            return Err(VerificationError::InvalidUncle(format!(
                "uncle depth exceeds {}",
                MAX_UNCLE_DEPTH
            )));
        }

        if !self.chain.has_header(&uncle.parent_hash) {
            return Err(VerificationError::InvalidUncle(
                "uncle parent unknown".to_string(),
            ));
        }

        if self.is_canonical_ancestor(&uncle.hash(), block)? {
            return Err(VerificationError::InvalidUncle(
                "uncle is a canonical ancestor".to_string(),
            ));
        }

        if self.chain.is_known_uncle(&uncle.hash()) {
            return Err(VerificationError::InvalidUncle(
                "uncle already included".to_string(),
            ));
        }

        Ok(())
    }

    fn is_canonical_ancestor(&self, hash: &H256, block: &Block) -> Result<bool> {
        let mut current = block.header.parent_hash;
        for _ in 0..=MAX_UNCLE_DEPTH {
            if current == *hash {
                return Ok(true);
            }
            match self.chain.header_by_hash(&current) {
                Some(header) => current = header.parent_hash,
                None => break,
            }
        }
        Ok(false)
    }

    /// The trie over `(rlp(i), tx.serialize())` must root to the header
    /// commitment; with no transactions the expected root is the hash of
    /// the RLP empty string.
    pub async fn validate_transactions_trie(&self, block: &Block) -> Result<()> {
        let computed = compute_transactions_root(&block.transactions)?;
        if computed != block.header.transactions_root {
            return Err(VerificationError::InvalidTransactionsTrie);
        }
        Ok(())
    }

    /// Per-transaction checks, collected as `(index, message)` pairs so
    /// callers can report every offender at once.
    pub fn validate_transactions(&self, block: &Block) -> Vec<(usize, String)> {
        let mut errors = Vec::new();

        for (index, tx) in block.transactions.iter().enumerate() {
            if let Err(e) = tx.sender() {
                errors.push((index, format!("sender recovery failed: {}", e)));
                continue;
            }

            if let Some(chain_id) = tx.chain_id() {
                if chain_id != self.config.chain_id {
                    errors.push((index, format!("wrong chain id {}", chain_id)));
                    continue;
                }
            }

            let intrinsic = tx.intrinsic_gas(self.config.istanbul);
            if tx.gas_limit() < U256::from(intrinsic) {
                errors.push((
                    index,
                    format!("gas limit below intrinsic cost {}", intrinsic),
                ));
                continue;
            }

            if tx.gas_limit() > block.header.gas_limit {
                errors.push((index, "gas limit above block gas limit".to_string()));
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::MemoryChain;
    use ember_core::LegacyTransaction;
    use ember_crypto::generate_private_key;
    use ember_types::{Address, Bytes};

    fn header_at(parent: &Header, timestamp_step: u64) -> Header {
        let mut header = Header::new();
        header.parent_hash = parent.hash();
        header.number = parent.number + U256::one();
        header.timestamp = parent.timestamp + timestamp_step;
        header.gas_limit = parent.gas_limit;
        header
    }

    /// Canonical chain of four headers plus a fork sibling of the tip
    /// usable as an uncle.
    fn chain_fixture() -> (MemoryChain, Header, Header) {
        let mut genesis = Header::new();
        genesis.gas_limit = U256::from(1_000_000);
        genesis.timestamp = 1_000;

        let b1 = header_at(&genesis, 10);
        let b2 = header_at(&b1, 10);
        let b3 = header_at(&b2, 10);
        // Sibling of b3: same parent, different timestamp
        let uncle = header_at(&b2, 11);

        let mut chain = MemoryChain::new();
        chain.insert_canonical(genesis);
        chain.insert_canonical(b1);
        chain.insert_canonical(b2);
        chain.insert_canonical(b3.clone());
        chain.insert_fork(uncle.clone());

        (chain, b3, uncle)
    }

    fn block_with_uncles(tip: &Header, uncles: Vec<Header>) -> Block {
        let mut header = header_at(tip, 10);
        header.uncles_hash = Block::compute_uncles_hash(&uncles);
        let mut block = Block::new(header);
        block.uncle_headers = uncles;
        block
    }

    fn signed_transfer(nonce: u64) -> Transaction {
        let key = generate_private_key();
        Transaction::Legacy(
            LegacyTransaction {
                nonce: U256::from(nonce),
                gas_price: U256::from(1_000_000_000u64),
                gas_limit: U256::from(21_000),
                to: Some(Address::from_bytes([0x11; 20])),
                value: U256::from(1),
                data: Bytes::new(),
                v: 0,
                r: U256::zero(),
                s: U256::zero(),
            }
            .sign(&key, Some(1))
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_valid_block_with_uncle() {
        let (chain, tip, uncle) = chain_fixture();
        let block = block_with_uncles(&tip, vec![uncle]);

        let verifier = BlockVerifier::new(Arc::new(chain));
        verifier.validate(&block).await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_uncles_rejected() {
        let (chain, tip, uncle) = chain_fixture();
        let block = block_with_uncles(&tip, vec![uncle.clone(), uncle]);

        let verifier = BlockVerifier::new(Arc::new(chain));
        assert!(matches!(
            verifier.validate_uncles(&block).await,
            Err(VerificationError::DuplicateUncles)
        ));
    }

    #[tokio::test]
    async fn test_too_many_uncles_rejected() {
        let (mut chain, tip, uncle) = chain_fixture();

        let parent = chain.header_by_hash(&uncle.parent_hash).unwrap();
        let mut extra1 = header_at(&parent, 12);
        let mut extra2 = header_at(&parent, 13);
        extra1.nonce = 1;
        extra2.nonce = 2;
        chain.insert_fork(extra1.clone());
        chain.insert_fork(extra2.clone());

        let block = block_with_uncles(&tip, vec![uncle, extra1, extra2]);

        let verifier = BlockVerifier::new(Arc::new(chain));
        assert!(matches!(
            verifier.validate_uncles(&block).await,
            Err(VerificationError::TooManyUncles(3))
        ));
    }

    #[tokio::test]
    async fn test_uncles_hash_mismatch() {
        let (chain, tip, uncle) = chain_fixture();
        let mut block = block_with_uncles(&tip, vec![uncle]);
        block.header.uncles_hash = H256::from_low_u64_be(1);

        let verifier = BlockVerifier::new(Arc::new(chain));
        assert!(matches!(
            verifier.validate_uncles(&block).await,
            Err(VerificationError::InvalidUncleHash)
        ));
    }

    #[tokio::test]
    async fn test_canonical_ancestor_is_no_uncle() {
        let (chain, tip, _) = chain_fixture();
        let ancestor = chain.header_by_number(&U256::from(2)).unwrap();
        let block = block_with_uncles(&tip, vec![ancestor]);

        let verifier = BlockVerifier::new(Arc::new(chain));
        assert!(matches!(
            verifier.validate_uncles(&block).await,
            Err(VerificationError::InvalidUncle(_))
        ));
    }

    #[tokio::test]
    async fn test_already_included_uncle_rejected() {
        let (mut chain, tip, uncle) = chain_fixture();
        chain.record_included_uncle(uncle.hash());
        let block = block_with_uncles(&tip, vec![uncle]);

        let verifier = BlockVerifier::new(Arc::new(chain));
        assert!(matches!(
            verifier.validate_uncles(&block).await,
            Err(VerificationError::InvalidUncle(_))
        ));
    }

    #[tokio::test]
    async fn test_uncle_with_unknown_parent_rejected() {
        let (chain, tip, mut uncle) = chain_fixture();
        uncle.parent_hash = H256::from_low_u64_be(99);
        let block = block_with_uncles(&tip, vec![uncle]);

        let verifier = BlockVerifier::new(Arc::new(chain));
        assert!(matches!(
            verifier.validate_uncles(&block).await,
            Err(VerificationError::InvalidUncle(_))
        ));
    }

    #[tokio::test]
    async fn test_genesis_accepts_uncles_trivially() {
        let mut genesis_header = Header::new();
        genesis_header.gas_limit = U256::from(1_000_000);
        genesis_header.timestamp = 1;
        // Deliberately inconsistent uncle commitment
        genesis_header.uncles_hash = H256::from_low_u64_be(7);
        let block = Block::new(genesis_header);

        let verifier = BlockVerifier::new(Arc::new(MemoryChain::new()));
        verifier.validate_uncles(&block).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_transactions_trie_root() {
        let (chain, tip, _) = chain_fixture();
        let block = block_with_uncles(&tip, vec![]);
        assert_eq!(block.header.transactions_root, KECCAK256_RLP);

        let verifier = BlockVerifier::new(Arc::new(chain));
        verifier.validate_transactions_trie(&block).await.unwrap();
    }

    #[tokio::test]
    async fn test_transactions_trie_roundtrip() {
        let (chain, tip, _) = chain_fixture();
        let mut block = block_with_uncles(&tip, vec![]);
        block.transactions = vec![signed_transfer(0), signed_transfer(1), signed_transfer(2)];
        block.header.transactions_root =
            compute_transactions_root(&block.transactions).unwrap();

        let verifier = BlockVerifier::new(Arc::new(chain));
        verifier.validate(&block).await.unwrap();
    }

    #[tokio::test]
    async fn test_transactions_trie_mismatch() {
        let (chain, tip, _) = chain_fixture();
        let mut block = block_with_uncles(&tip, vec![]);
        block.transactions = vec![signed_transfer(0)];
        // Header still commits to the empty trie

        let verifier = BlockVerifier::new(Arc::new(chain));
        assert!(matches!(
            verifier.validate_transactions_trie(&block).await,
            Err(VerificationError::InvalidTransactionsTrie)
        ));
    }

    #[tokio::test]
    async fn test_invalid_transactions_are_listed_by_index() {
        let (chain, tip, _) = chain_fixture();
        let mut block = block_with_uncles(&tip, vec![]);

        let good = signed_transfer(0);
        let underpriced = {
            let key = generate_private_key();
            Transaction::Legacy(
                LegacyTransaction {
                    nonce: U256::zero(),
                    gas_price: U256::one(),
                    gas_limit: U256::from(100), // below intrinsic cost
                    to: Some(Address::from_bytes([0x11; 20])),
                    value: U256::zero(),
                    data: Bytes::new(),
                    v: 0,
                    r: U256::zero(),
                    s: U256::zero(),
                }
                .sign(&key, Some(1))
                .unwrap(),
            )
        };
        let unsigned = Transaction::Legacy(LegacyTransaction {
            nonce: U256::zero(),
            gas_price: U256::one(),
            gas_limit: U256::from(21_000),
            to: None,
            value: U256::zero(),
            data: Bytes::new(),
            v: 27,
            r: U256::zero(),
            s: U256::zero(),
        });

        block.transactions = vec![good, underpriced, unsigned];
        block.header.transactions_root =
            compute_transactions_root(&block.transactions).unwrap();

        let verifier = BlockVerifier::new(Arc::new(chain));
        let errors = verifier.validate_transactions(&block);
        let indices: Vec<usize> = errors.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![1, 2]);

        match verifier.validate(&block).await {
            Err(VerificationError::InvalidTransactions(listed)) => {
                assert_eq!(listed.len(), 2);
            }
            other => panic!("Expected transaction failure, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_wrong_chain_id_is_listed() {
        let (chain, tip, _) = chain_fixture();
        let mut block = block_with_uncles(&tip, vec![]);

        let key = generate_private_key();
        let foreign = Transaction::Legacy(
            LegacyTransaction {
                nonce: U256::zero(),
                gas_price: U256::one(),
                gas_limit: U256::from(21_000),
                to: Some(Address::from_bytes([0x11; 20])),
                value: U256::zero(),
                data: Bytes::new(),
                v: 0,
                r: U256::zero(),
                s: U256::zero(),
            }
            .sign(&key, Some(5))
            .unwrap(),
        );
        block.transactions = vec![foreign];
        block.header.transactions_root =
            compute_transactions_root(&block.transactions).unwrap();

        let verifier = BlockVerifier::new(Arc::new(chain));
        let errors = verifier.validate_transactions(&block);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].1.contains("chain id"));
    }
}
