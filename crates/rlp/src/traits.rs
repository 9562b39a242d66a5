use crate::{Decoder, Encoder, RlpError};
use ember_types::{Address, Bloom, Bytes, H256, U256, UintExt};

pub trait Encode {
    fn encode(&self, encoder: &mut Encoder);
}

pub trait Decode: Sized {
    fn decode(decoder: &mut Decoder) -> Result<Self, RlpError>;
}

impl Encode for u8 {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.encode_u8(*self);
    }
}

impl Decode for u8 {
    fn decode(decoder: &mut Decoder) -> Result<Self, RlpError> {
        decoder.decode_u8()
    }
}

impl Encode for u16 {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.encode_u16(*self);
    }
}

impl Decode for u16 {
    fn decode(decoder: &mut Decoder) -> Result<Self, RlpError> {
        decoder.decode_u16()
    }
}

impl Encode for u32 {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.encode_u32(*self);
    }
}

impl Decode for u32 {
    fn decode(decoder: &mut Decoder) -> Result<Self, RlpError> {
        decoder.decode_u32()
    }
}

impl Encode for u64 {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.encode_u64(*self);
    }
}

impl Decode for u64 {
    fn decode(decoder: &mut Decoder) -> Result<Self, RlpError> {
        decoder.decode_u64()
    }
}

impl Encode for bool {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.encode_bool(*self);
    }
}

impl Decode for bool {
    fn decode(decoder: &mut Decoder) -> Result<Self, RlpError> {
        decoder.decode_bool()
    }
}

impl Encode for &[u8] {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.encode_bytes(self);
    }
}

impl Encode for Vec<u8> {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.encode_bytes(self);
    }
}

impl Decode for Vec<u8> {
    fn decode(decoder: &mut Decoder) -> Result<Self, RlpError> {
        decoder.decode_bytes()
    }
}

impl Encode for &str {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.encode_bytes(self.as_bytes());
    }
}

impl Encode for Bytes {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.encode_bytes(self.as_slice());
    }
}

impl Decode for Bytes {
    fn decode(decoder: &mut Decoder) -> Result<Self, RlpError> {
        Ok(Bytes::from_vec(decoder.decode_bytes()?))
    }
}

impl Encode for Address {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.encode_bytes(self.as_bytes());
    }
}

impl Decode for Address {
    fn decode(decoder: &mut Decoder) -> Result<Self, RlpError> {
        let bytes = decoder.decode_bytes()?;
        Address::from_slice(&bytes).map_err(|_| {
            RlpError::Decoder(crate::DecoderError::InvalidData(format!(
                "Invalid address length: {}",
                bytes.len()
            )))
        })
    }
}

impl Encode for H256 {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.encode_bytes(self.as_bytes());
    }
}

impl Decode for H256 {
    fn decode(decoder: &mut Decoder) -> Result<Self, RlpError> {
        let bytes = decoder.decode_bytes()?;
        if bytes.len() != 32 {
            return Err(RlpError::Decoder(crate::DecoderError::InvalidData(format!(
                "Invalid H256 length: {}",
                bytes.len()
            ))));
        }
        Ok(H256::from_slice(&bytes))
    }
}

impl Encode for U256 {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.encode_bytes(&self.to_be_bytes_vec());
    }
}

impl Decode for U256 {
    fn decode(decoder: &mut Decoder) -> Result<Self, RlpError> {
        let bytes = decoder.decode_bytes()?;
        if bytes.is_empty() {
            return Ok(U256::zero());
        }
        if bytes.len() > 32 {
            return Err(RlpError::Decoder(crate::DecoderError::IntegerOverflow));
        }
        if bytes.len() > 1 && bytes[0] == 0 {
            return Err(RlpError::Decoder(crate::DecoderError::LeadingZeros));
        }
        Ok(U256::from_big_endian(&bytes))
    }
}

impl Decode for Vec<H256> {
    fn decode(decoder: &mut Decoder) -> Result<Self, RlpError> {
        decoder.decode_list::<H256>()
    }
}

impl Encode for Bloom {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.encode_bytes(self.as_bytes());
    }
}

impl Decode for Bloom {
    fn decode(decoder: &mut Decoder) -> Result<Self, RlpError> {
        let bytes = decoder.decode_bytes()?;
        Bloom::from_slice(&bytes).map_err(|_| {
            RlpError::Decoder(crate::DecoderError::InvalidData(format!(
                "Invalid Bloom filter length: {}",
                bytes.len()
            )))
        })
    }
}
