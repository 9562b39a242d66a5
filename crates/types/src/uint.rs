use primitive_types::{U256 as PrimitiveU256, U512 as PrimitiveU512};

pub type U256 = PrimitiveU256;
pub type U512 = PrimitiveU512;

/// Big-endian byte conversions with the shortest (no leading zero)
/// representation used by RLP and by gas metering.
pub trait UintExt: Sized {
    fn from_be_bytes_vec(bytes: &[u8]) -> Self;
    fn to_be_bytes_vec(&self) -> Vec<u8>;
    /// Number of bytes needed to represent the value; zero needs none.
    fn byte_len(&self) -> usize;
}

impl UintExt for U256 {
    fn from_be_bytes_vec(bytes: &[u8]) -> Self {
        let mut array = [0u8; 32];
        let len = std::cmp::min(bytes.len(), 32);
        array[32 - len..].copy_from_slice(&bytes[..len]);
        U256::from_big_endian(&array)
    }

    fn to_be_bytes_vec(&self) -> Vec<u8> {
        if self.is_zero() {
            return Vec::new();
        }
        let mut bytes = [0u8; 32];
        self.to_big_endian(&mut bytes);
        let first_non_zero = bytes.iter().position(|&b| b != 0).unwrap_or(31);
        bytes[first_non_zero..].to_vec()
    }

    fn byte_len(&self) -> usize {
        (self.bits() + 7) / 8
    }
}

impl UintExt for U512 {
    fn from_be_bytes_vec(bytes: &[u8]) -> Self {
        let mut array = [0u8; 64];
        let len = std::cmp::min(bytes.len(), 64);
        array[64 - len..].copy_from_slice(&bytes[..len]);
        U512::from_big_endian(&array)
    }

    fn to_be_bytes_vec(&self) -> Vec<u8> {
        if self.is_zero() {
            return Vec::new();
        }
        let mut bytes = [0u8; 64];
        self.to_big_endian(&mut bytes);
        let first_non_zero = bytes.iter().position(|&b| b != 0).unwrap_or(63);
        bytes[first_non_zero..].to_vec()
    }

    fn byte_len(&self) -> usize {
        (self.bits() + 7) / 8
    }
}
