use crate::blockchain::Blockchain;
use crate::{Result, VerificationError};
use ember_core::Header;
use ember_types::U256;
use std::sync::Arc;

const MIN_GAS_LIMIT: u64 = 5_000;
const MAX_EXTRA_DATA_SIZE: usize = 32;
const GAS_LIMIT_BOUND_DIVISOR: u64 = 1_024;

/// Structural header checks: intrinsic bounds plus parent linkage.
/// Difficulty and seal verification belong to the consensus engine.
pub struct HeaderVerifier<C> {
    chain: Arc<C>,
}

impl<C: Blockchain> HeaderVerifier<C> {
    pub fn new(chain: Arc<C>) -> Self {
        Self { chain }
    }

    pub async fn validate(&self, header: &Header) -> Result<()> {
        self.validate_intrinsic(header)?;

        if header.is_genesis() {
            return Ok(());
        }

        let parent = self
            .chain
            .header_by_hash(&header.parent_hash)
            .ok_or_else(|| VerificationError::InvalidHeader("unknown parent".to_string()))?;

        self.validate_against_parent(header, &parent)
    }

    fn validate_intrinsic(&self, header: &Header) -> Result<()> {
        if header.gas_used > header.gas_limit {
            return Err(VerificationError::InvalidHeader(format!(
                "gas used {} exceeds gas limit {}",
                header.gas_used, header.gas_limit
            )));
        }

        if header.gas_limit < U256::from(MIN_GAS_LIMIT) {
            return Err(VerificationError::InvalidHeader(format!(
                "gas limit {} below minimum {}",
                header.gas_limit, MIN_GAS_LIMIT
            )));
        }

        if header.gas_limit > U256::from(u64::MAX / 2) {
            return Err(VerificationError::InvalidHeader(
                "gas limit out of range".to_string(),
            ));
        }

        if header.extra_data.len() > MAX_EXTRA_DATA_SIZE {
            return Err(VerificationError::InvalidHeader(format!(
                "extra data too long: {} bytes",
                header.extra_data.len()
            )));
        }

        Ok(())
    }

    fn validate_against_parent(&self, header: &Header, parent: &Header) -> Result<()> {
        if header.number != parent.number + U256::one() {
            return Err(VerificationError::InvalidHeader(format!(
                "number {} does not follow parent {}",
                header.number, parent.number
            )));
        }

        if header.timestamp <= parent.timestamp {
            return Err(VerificationError::InvalidHeader(
                "timestamp not after parent".to_string(),
            ));
        }

        // Gas limit may drift by at most 1/1024 of the parent's per block
        let parent_gas = parent.gas_limit.as_u64();
        let bound = parent_gas / GAS_LIMIT_BOUND_DIVISOR;
        let gas = header.gas_limit.as_u64();
        let delta = gas.abs_diff(parent_gas);

        if delta >= bound {
            return Err(VerificationError::InvalidHeader(format!(
                "gas limit delta {} outside bound {}",
                delta, bound
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::MemoryChain;
    use ember_types::Bytes;

    fn genesis() -> Header {
        let mut header = Header::new();
        header.gas_limit = U256::from(1_000_000);
        header.timestamp = 1_000;
        header
    }

    fn child_of(parent: &Header) -> Header {
        let mut header = Header::new();
        header.parent_hash = parent.hash();
        header.number = parent.number + U256::one();
        header.timestamp = parent.timestamp + 10;
        header.gas_limit = parent.gas_limit;
        header
    }

    #[tokio::test]
    async fn test_valid_chain_link() {
        let genesis = genesis();
        let mut chain = MemoryChain::new();
        chain.insert_canonical(genesis.clone());

        let verifier = HeaderVerifier::new(Arc::new(chain));
        assert!(verifier.validate(&child_of(&genesis)).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_parent() {
        let verifier = HeaderVerifier::new(Arc::new(MemoryChain::new()));
        let mut header = child_of(&genesis());
        header.parent_hash = ember_types::H256::from_low_u64_be(42);
        assert!(matches!(
            verifier.validate(&header).await,
            Err(VerificationError::InvalidHeader(_))
        ));
    }

    #[tokio::test]
    async fn test_timestamp_must_advance() {
        let genesis = genesis();
        let mut chain = MemoryChain::new();
        chain.insert_canonical(genesis.clone());

        let mut header = child_of(&genesis);
        header.timestamp = genesis.timestamp;

        let verifier = HeaderVerifier::new(Arc::new(chain));
        assert!(verifier.validate(&header).await.is_err());
    }

    #[tokio::test]
    async fn test_gas_limit_delta_bound() {
        let genesis = genesis();
        let mut chain = MemoryChain::new();
        chain.insert_canonical(genesis.clone());
        let verifier = HeaderVerifier::new(Arc::new(chain));

        let mut header = child_of(&genesis);
        // 1/1024 of 1_000_000 is 976; a drift of 976 is already out
        header.gas_limit = genesis.gas_limit + U256::from(976);
        assert!(verifier.validate(&header).await.is_err());

        header.gas_limit = genesis.gas_limit + U256::from(975);
        assert!(verifier.validate(&header).await.is_ok());
    }

    #[tokio::test]
    async fn test_extra_data_bound() {
        let mut header = genesis();
        header.extra_data = Bytes::from_vec(vec![0; 33]);

        let verifier = HeaderVerifier::new(Arc::new(MemoryChain::new()));
        assert!(verifier.validate(&header).await.is_err());
    }

    #[tokio::test]
    async fn test_gas_used_within_limit() {
        let mut header = genesis();
        header.gas_used = header.gas_limit + U256::one();

        let verifier = HeaderVerifier::new(Arc::new(MemoryChain::new()));
        assert!(verifier.validate(&header).await.is_err());
    }
}
