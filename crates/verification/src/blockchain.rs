use ember_core::Header;
use ember_types::{H256, U256};
use std::collections::{HashMap, HashSet};

/// Read-only chain view consulted during block validation.
pub trait Blockchain: Send + Sync {
    fn header_by_hash(&self, hash: &H256) -> Option<Header>;

    /// Canonical header at a height.
    fn header_by_number(&self, number: &U256) -> Option<Header>;

    /// Whether this header was already included as an uncle by an
    /// earlier canonical block.
    fn is_known_uncle(&self, hash: &H256) -> bool;

    fn has_header(&self, hash: &H256) -> bool {
        self.header_by_hash(hash).is_some()
    }
}

/// In-memory chain view for tests and light validation contexts.
#[derive(Debug, Default)]
pub struct MemoryChain {
    headers: HashMap<H256, Header>,
    canonical: HashMap<U256, H256>,
    included_uncles: HashSet<H256>,
}

impl MemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header on the canonical chain.
    pub fn insert_canonical(&mut self, header: Header) {
        let hash = header.hash();
        self.canonical.insert(header.number, hash);
        self.headers.insert(hash, header);
    }

    /// Insert a known header that is not canonical (a fork block).
    pub fn insert_fork(&mut self, header: Header) {
        self.headers.insert(header.hash(), header);
    }

    pub fn record_included_uncle(&mut self, hash: H256) {
        self.included_uncles.insert(hash);
    }
}

impl Blockchain for MemoryChain {
    fn header_by_hash(&self, hash: &H256) -> Option<Header> {
        self.headers.get(hash).cloned()
    }

    fn header_by_number(&self, number: &U256) -> Option<Header> {
        self.canonical
            .get(number)
            .and_then(|hash| self.headers.get(hash))
            .cloned()
    }

    fn is_known_uncle(&self, hash: &H256) -> bool {
        self.included_uncles.contains(hash)
    }
}
