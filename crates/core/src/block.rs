use crate::constants::{KECCAK256_RLP, KECCAK256_RLP_ARRAY};
use crate::list::ListReader;
use crate::transaction::Transaction;
use ember_crypto::keccak256;
use ember_rlp::{Decode, Decoder, DecoderError, Encode, Encoder, RlpError, RlpItem};
use ember_types::{Address, Bloom, Bytes, H256, U256};
use serde::{Deserialize, Serialize};

/// Pre-London block header: the fixed 15-element list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub parent_hash: H256,
    pub uncles_hash: H256,
    pub beneficiary: Address,
    pub state_root: H256,
    pub transactions_root: H256,
    pub receipts_root: H256,
    pub logs_bloom: Bloom,
    pub difficulty: U256,
    pub number: U256,
    pub gas_limit: U256,
    pub gas_used: U256,
    pub timestamp: u64,
    pub extra_data: Bytes,
    pub mix_hash: H256,
    pub nonce: u64,
}

impl Header {
    pub fn new() -> Self {
        Self {
            parent_hash: H256::zero(),
            uncles_hash: KECCAK256_RLP_ARRAY,
            beneficiary: Address::ZERO,
            state_root: H256::zero(),
            transactions_root: KECCAK256_RLP,
            receipts_root: KECCAK256_RLP,
            logs_bloom: Bloom::ZERO,
            difficulty: U256::zero(),
            number: U256::zero(),
            gas_limit: U256::zero(),
            gas_used: U256::zero(),
            timestamp: 0,
            extra_data: Bytes::new(),
            mix_hash: H256::zero(),
            nonce: 0,
        }
    }

    pub fn hash(&self) -> H256 {
        let mut encoder = Encoder::new();
        self.encode(&mut encoder);
        keccak256(&encoder.finish())
    }

    pub fn is_genesis(&self) -> bool {
        self.number.is_zero()
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

impl Encode for Header {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.encode_list_with(|e| {
            self.parent_hash.encode(e);
            self.uncles_hash.encode(e);
            self.beneficiary.encode(e);
            self.state_root.encode(e);
            self.transactions_root.encode(e);
            self.receipts_root.encode(e);
            self.logs_bloom.encode(e);
            self.difficulty.encode(e);
            self.number.encode(e);
            self.gas_limit.encode(e);
            self.gas_used.encode(e);
            e.encode_u64(self.timestamp);
            self.extra_data.encode(e);
            self.mix_hash.encode(e);
            // The PoW nonce is a fixed 8-byte string, not an integer
            e.encode_bytes(&self.nonce.to_be_bytes());
        });
    }
}

impl Decode for Header {
    fn decode(decoder: &mut Decoder) -> Result<Self, RlpError> {
        let mut list = ListReader::new(decoder)?;
        Self::decode_fields(&mut list)
    }
}

impl Header {
    fn decode_fields(list: &mut ListReader) -> Result<Self, RlpError> {
        if list.len() != 15 {
            return Err(DecoderError::ListLengthMismatch {
                expected: 15,
                actual: list.len(),
            }
            .into());
        }

        Ok(Header {
            parent_hash: list.next()?,
            uncles_hash: list.next()?,
            beneficiary: list.next()?,
            state_root: list.next()?,
            transactions_root: list.next()?,
            receipts_root: list.next()?,
            logs_bloom: list.next()?,
            difficulty: list.next()?,
            number: list.next()?,
            gas_limit: list.next()?,
            gas_used: list.next()?,
            timestamp: list.next()?,
            extra_data: list.next()?,
            mix_hash: list.next()?,
            nonce: decode_nonce(list.next_item()?)?,
        })
    }

    fn from_item(item: &RlpItem) -> Result<Self, RlpError> {
        let mut list = ListReader::from_item(item)?;
        Self::decode_fields(&mut list)
    }
}

fn decode_nonce(item: &RlpItem) -> Result<u64, RlpError> {
    let bytes = item
        .as_bytes()
        .ok_or_else(|| DecoderError::InvalidData("Expected nonce bytes".to_string()))?;
    if bytes.len() > 8 {
        return Err(DecoderError::IntegerOverflow.into());
    }
    let mut array = [0u8; 8];
    array[8 - bytes.len()..].copy_from_slice(bytes);
    Ok(u64::from_be_bytes(array))
}

/// Wire form: `[header, [tx...], [uncle...]]`. Typed transactions appear
/// in the body as opaque byte strings per EIP-2718, legacy ones as raw
/// lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
    pub uncle_headers: Vec<Header>,
}

impl Block {
    pub fn new(header: Header) -> Self {
        Self {
            header,
            transactions: Vec::new(),
            uncle_headers: Vec::new(),
        }
    }

    pub fn hash(&self) -> H256 {
        self.header.hash()
    }

    pub fn number(&self) -> U256 {
        self.header.number
    }

    pub fn is_genesis(&self) -> bool {
        self.header.is_genesis()
    }

    /// Hash the block body's uncle-header list the way the header commits
    /// to it.
    pub fn compute_uncles_hash(uncles: &[Header]) -> H256 {
        let mut encoder = Encoder::new();
        encoder.encode_list(uncles);
        keccak256(&encoder.finish())
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        self.encode(&mut encoder);
        encoder.finish()
    }

    pub fn decode(data: &[u8]) -> Result<Self, RlpError> {
        let mut decoder = Decoder::new(data)?;
        Self::decode_inner(&mut decoder)
    }

    fn decode_inner(decoder: &mut Decoder) -> Result<Self, RlpError> {
        let mut list = ListReader::new(decoder)?;

        let header: Header = list.next()?;

        let mut transactions = Vec::new();
        for item in list
            .next_item()?
            .as_list()
            .ok_or_else(|| DecoderError::InvalidData("Expected transaction list".to_string()))?
        {
            let envelope = match item {
                RlpItem::String(bytes) => bytes.clone(),
                RlpItem::List(_) => item.to_vec(),
            };
            let tx = Transaction::decode(&envelope).map_err(|e| {
                DecoderError::InvalidData(format!("Invalid transaction: {}", e))
            })?;
            transactions.push(tx);
        }

        let mut uncle_headers = Vec::new();
        for item in list
            .next_item()?
            .as_list()
            .ok_or_else(|| DecoderError::InvalidData("Expected uncle list".to_string()))?
        {
            uncle_headers.push(Header::from_item(item)?);
        }

        Ok(Block {
            header,
            transactions,
            uncle_headers,
        })
    }
}

impl Encode for Block {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.encode_list_with(|e| {
            self.header.encode(e);

            e.encode_list_with(|e| {
                for tx in &self.transactions {
                    match tx {
                        Transaction::Legacy(_) => e.append_raw(&tx.serialize()),
                        Transaction::Eip2930(_) => e.encode_bytes(&tx.serialize()),
                    }
                }
            });

            e.encode_list(&self.uncle_headers);
        });
    }
}

impl Decode for Block {
    fn decode(decoder: &mut Decoder) -> Result<Self, RlpError> {
        Self::decode_inner(decoder)
    }
}
