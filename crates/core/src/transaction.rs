use crate::list::ListReader;
use ember_crypto::{keccak256, recover_address, SecretKey, Signature};
use ember_rlp::{Decoder, DecoderError, Encode, Encoder, RlpError};
use ember_types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Unknown transaction type: {0:#x}")]
    UnknownType(u8),
    #[error("Crypto error: {0}")]
    Crypto(#[from] ember_crypto::CryptoError),
    #[error("RLP error: {0}")]
    Rlp(#[from] RlpError),
}

pub type Result<T> = std::result::Result<T, TransactionError>;

/// A transaction in its EIP-2718 envelope: legacy payloads are a bare RLP
/// list, typed payloads are a type byte followed by an RLP list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
    Legacy(LegacyTransaction),
    Eip2930(Eip2930Transaction),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyTransaction {
    pub nonce: U256,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip2930Transaction {
    pub chain_id: u64,
    pub nonce: U256,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub access_list: Vec<AccessListItem>,
    pub y_parity: bool,
    pub r: U256,
    pub s: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessListItem {
    pub address: Address,
    pub storage_keys: Vec<H256>,
}

impl Encode for AccessListItem {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.encode_list_with(|e| {
            self.address.encode(e);
            e.encode_list(&self.storage_keys);
        });
    }
}

fn encode_to_field(to: &Option<Address>, encoder: &mut Encoder) {
    match to {
        Some(addr) => addr.encode(encoder),
        None => encoder.encode_bytes(&[]),
    }
}

fn decode_to_field(reader: &mut ListReader) -> std::result::Result<Option<Address>, RlpError> {
    let item = reader.next_item()?;
    let bytes = item
        .as_bytes()
        .ok_or_else(|| DecoderError::InvalidData("Expected address bytes".to_string()))?;
    if bytes.is_empty() {
        Ok(None)
    } else {
        Address::from_slice(bytes)
            .map(Some)
            .map_err(|_| DecoderError::InvalidData(format!("Invalid address length: {}", bytes.len())).into())
    }
}

fn signature_word(word: &U256) -> H256 {
    let mut bytes = [0u8; 32];
    word.to_big_endian(&mut bytes);
    H256::from(bytes)
}

impl LegacyTransaction {
    /// EIP-155 chain ID encoded in `v`, when present.
    pub fn chain_id(&self) -> Option<u64> {
        if self.v >= 35 {
            Some((self.v - 35) / 2)
        } else {
            None
        }
    }

    pub fn signature(&self) -> Result<Signature> {
        let parity = match self.v {
            27 | 28 => (self.v - 27) as u8,
            v if v >= 35 => ((v - 35) % 2) as u8,
            _ => return Err(TransactionError::InvalidSignature),
        };
        Ok(Signature::new(
            signature_word(&self.r),
            signature_word(&self.s),
            parity,
        ))
    }

    fn encode_payload(&self, encoder: &mut Encoder) {
        self.nonce.encode(encoder);
        self.gas_price.encode(encoder);
        self.gas_limit.encode(encoder);
        encode_to_field(&self.to, encoder);
        self.value.encode(encoder);
        self.data.encode(encoder);
    }

    /// Hash signed by the sender: the six payload fields, with
    /// `[chain_id, 0, 0]` appended when EIP-155 protection is in play.
    pub fn signing_hash(&self) -> H256 {
        self.signing_hash_for_chain(self.chain_id())
    }

    fn signing_hash_for_chain(&self, chain_id: Option<u64>) -> H256 {
        let mut encoder = Encoder::new();
        encoder.encode_list_with(|e| {
            self.encode_payload(e);
            if let Some(id) = chain_id {
                e.encode_u64(id);
                e.encode_u8(0);
                e.encode_u8(0);
            }
        });
        keccak256(&encoder.finish())
    }

    pub fn sender(&self) -> Result<Address> {
        let signature = self.signature()?;
        Ok(recover_address(&self.signing_hash(), &signature)?)
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        self.encode(&mut encoder);
        encoder.finish()
    }

    pub fn hash(&self) -> H256 {
        keccak256(&self.serialize())
    }

    /// Sign in place with the given key; `chain_id` selects EIP-155
    /// replay protection.
    pub fn sign(mut self, key: &SecretKey, chain_id: Option<u64>) -> Result<Self> {
        let hash = self.signing_hash_for_chain(chain_id);
        let signature = ember_crypto::sign_message(&hash, key)?;
        let parity = (signature.v - 27) as u64;
        self.v = match chain_id {
            Some(id) => parity + id * 2 + 35,
            None => parity + 27,
        };
        self.r = U256::from_big_endian(signature.r.as_bytes());
        self.s = U256::from_big_endian(signature.s.as_bytes());
        Ok(self)
    }
}

impl Encode for LegacyTransaction {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.encode_list_with(|e| {
            self.encode_payload(e);
            e.encode_u64(self.v);
            self.r.encode(e);
            self.s.encode(e);
        });
    }
}

impl LegacyTransaction {
    fn decode_fields(reader: &mut ListReader) -> std::result::Result<Self, RlpError> {
        Ok(LegacyTransaction {
            nonce: reader.next()?,
            gas_price: reader.next()?,
            gas_limit: reader.next()?,
            to: decode_to_field(reader)?,
            value: reader.next()?,
            data: reader.next()?,
            v: reader.next()?,
            r: reader.next()?,
            s: reader.next()?,
        })
    }
}

impl Eip2930Transaction {
    pub fn signature(&self) -> Signature {
        Signature::new(
            signature_word(&self.r),
            signature_word(&self.s),
            self.y_parity as u8,
        )
    }

    fn encode_payload(&self, encoder: &mut Encoder) {
        encoder.encode_u64(self.chain_id);
        self.nonce.encode(encoder);
        self.gas_price.encode(encoder);
        self.gas_limit.encode(encoder);
        encode_to_field(&self.to, encoder);
        self.value.encode(encoder);
        self.data.encode(encoder);
        encoder.encode_list(&self.access_list);
    }

    pub fn signing_hash(&self) -> H256 {
        let mut encoder = Encoder::new();
        encoder.encode_list_with(|e| self.encode_payload(e));
        let mut preimage = vec![0x01];
        preimage.extend_from_slice(&encoder.finish());
        keccak256(&preimage)
    }

    pub fn sender(&self) -> Result<Address> {
        Ok(recover_address(&self.signing_hash(), &self.signature())?)
    }

    /// EIP-2718 envelope: `0x01 || rlp(payload, y_parity, r, s)`.
    pub fn serialize(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.encode_list_with(|e| {
            self.encode_payload(e);
            e.encode_bool(self.y_parity);
            self.r.encode(e);
            self.s.encode(e);
        });
        let mut out = vec![0x01];
        out.extend_from_slice(&encoder.finish());
        out
    }

    pub fn hash(&self) -> H256 {
        keccak256(&self.serialize())
    }

    pub fn sign(mut self, key: &SecretKey) -> Result<Self> {
        let hash = self.signing_hash();
        let signature = ember_crypto::sign_message(&hash, key)?;
        self.y_parity = signature.v - 27 == 1;
        self.r = U256::from_big_endian(signature.r.as_bytes());
        self.s = U256::from_big_endian(signature.s.as_bytes());
        Ok(self)
    }

    fn decode_payload(data: &[u8]) -> std::result::Result<Self, RlpError> {
        let mut decoder = Decoder::new(data)?;
        let mut reader = ListReader::new(&mut decoder)?;

        let chain_id = reader.next()?;
        let nonce = reader.next()?;
        let gas_price = reader.next()?;
        let gas_limit = reader.next()?;
        let to = decode_to_field(&mut reader)?;
        let value = reader.next()?;
        let data = reader.next()?;

        let access_list_item = reader.next_item()?.clone();
        let mut access_list = Vec::new();
        for entry in access_list_item
            .as_list()
            .ok_or_else(|| DecoderError::InvalidData("Expected access list".to_string()))?
        {
            let mut entry_reader = ListReader::from_item(entry)?;
            access_list.push(AccessListItem {
                address: entry_reader.next()?,
                storage_keys: entry_reader.next()?,
            });
        }

        Ok(Eip2930Transaction {
            chain_id,
            nonce,
            gas_price,
            gas_limit,
            to,
            value,
            data,
            access_list,
            y_parity: reader.next()?,
            r: reader.next()?,
            s: reader.next()?,
        })
    }
}

impl Transaction {
    /// Parse from envelope bytes: a leading byte below 0xc0 selects a
    /// typed payload, otherwise the data is a legacy RLP list.
    pub fn decode(data: &[u8]) -> Result<Self> {
        match data.first() {
            None => Err(TransactionError::Rlp(DecoderError::UnexpectedEof.into())),
            Some(0x01) => Ok(Transaction::Eip2930(Eip2930Transaction::decode_payload(
                &data[1..],
            )?)),
            Some(byte) if *byte < 0xc0 => Err(TransactionError::UnknownType(*byte)),
            Some(_) => {
                let mut decoder = Decoder::new(data)?;
                let mut reader = ListReader::new(&mut decoder)?;
                Ok(Transaction::Legacy(LegacyTransaction::decode_fields(
                    &mut reader,
                )?))
            }
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Transaction::Legacy(tx) => tx.serialize(),
            Transaction::Eip2930(tx) => tx.serialize(),
        }
    }

    pub fn hash(&self) -> H256 {
        match self {
            Transaction::Legacy(tx) => tx.hash(),
            Transaction::Eip2930(tx) => tx.hash(),
        }
    }

    pub fn sender(&self) -> Result<Address> {
        match self {
            Transaction::Legacy(tx) => tx.sender(),
            Transaction::Eip2930(tx) => tx.sender(),
        }
    }

    pub fn tx_type(&self) -> u8 {
        match self {
            Transaction::Legacy(_) => 0,
            Transaction::Eip2930(_) => 1,
        }
    }

    pub fn nonce(&self) -> U256 {
        match self {
            Transaction::Legacy(tx) => tx.nonce,
            Transaction::Eip2930(tx) => tx.nonce,
        }
    }

    pub fn gas_price(&self) -> U256 {
        match self {
            Transaction::Legacy(tx) => tx.gas_price,
            Transaction::Eip2930(tx) => tx.gas_price,
        }
    }

    pub fn gas_limit(&self) -> U256 {
        match self {
            Transaction::Legacy(tx) => tx.gas_limit,
            Transaction::Eip2930(tx) => tx.gas_limit,
        }
    }

    pub fn to(&self) -> Option<Address> {
        match self {
            Transaction::Legacy(tx) => tx.to,
            Transaction::Eip2930(tx) => tx.to,
        }
    }

    pub fn value(&self) -> U256 {
        match self {
            Transaction::Legacy(tx) => tx.value,
            Transaction::Eip2930(tx) => tx.value,
        }
    }

    pub fn data(&self) -> &[u8] {
        match self {
            Transaction::Legacy(tx) => &tx.data,
            Transaction::Eip2930(tx) => &tx.data,
        }
    }

    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Transaction::Legacy(tx) => tx.chain_id(),
            Transaction::Eip2930(tx) => Some(tx.chain_id),
        }
    }

    pub fn is_contract_creation(&self) -> bool {
        self.to().is_none()
    }

    /// Gas charged before the first opcode executes. Calldata pricing
    /// follows EIP-2028 when `istanbul` is set.
    pub fn intrinsic_gas(&self, istanbul: bool) -> u64 {
        const TX_GAS: u64 = 21_000;
        const TX_CREATE_GAS: u64 = 32_000;
        const TX_DATA_ZERO_GAS: u64 = 4;
        const ACCESS_LIST_ADDRESS_GAS: u64 = 2_400;
        const ACCESS_LIST_STORAGE_KEY_GAS: u64 = 1_900;

        let non_zero_gas: u64 = if istanbul { 16 } else { 68 };

        let mut gas = TX_GAS;
        if self.is_contract_creation() {
            gas += TX_CREATE_GAS;
        }

        for byte in self.data() {
            gas += if *byte == 0 {
                TX_DATA_ZERO_GAS
            } else {
                non_zero_gas
            };
        }

        if let Transaction::Eip2930(tx) = self {
            for entry in &tx.access_list {
                gas += ACCESS_LIST_ADDRESS_GAS;
                gas += ACCESS_LIST_STORAGE_KEY_GAS * entry.storage_keys.len() as u64;
            }
        }

        gas
    }
}
