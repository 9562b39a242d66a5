pub mod decode;
pub mod encode;
pub mod error;
pub mod traits;

pub use decode::Decoder;
pub use encode::Encoder;
pub use error::{DecoderError, RlpError};
pub use traits::{Decode, Encode};

pub fn encode<T: Encode>(value: &T) -> Vec<u8> {
    let mut encoder = Encoder::new();
    value.encode(&mut encoder);
    encoder.finish()
}

pub fn decode<T: Decode>(data: &[u8]) -> Result<T, RlpError> {
    let mut decoder = Decoder::new(data)?;
    T::decode(&mut decoder)
}

/// Generic RLP tree for heterogeneous payloads (block bodies, trie nodes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem {
    String(Vec<u8>),
    List(Vec<RlpItem>),
}

impl RlpItem {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RlpItem::String(bytes) => Some(bytes),
            RlpItem::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[RlpItem]> {
        match self {
            RlpItem::String(_) => None,
            RlpItem::List(items) => Some(items),
        }
    }

    pub fn encode_into(&self, encoder: &mut Encoder) {
        match self {
            RlpItem::String(bytes) => encoder.encode_bytes(bytes),
            RlpItem::List(items) => encoder.encode_list_with(|e| {
                for item in items {
                    item.encode_into(e);
                }
            }),
        }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        self.encode_into(&mut encoder);
        encoder.finish()
    }
}
