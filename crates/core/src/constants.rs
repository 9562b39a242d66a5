use ember_types::H256;

/// Keccak-256 of the RLP of the empty byte string — root of an empty
/// Merkle-Patricia trie.
pub const KECCAK256_RLP: H256 = primitive_types::H256(hex_literal(
    *b"56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421",
));

/// Keccak-256 of the RLP of the empty list — uncles hash of a block with
/// no uncle headers.
pub const KECCAK256_RLP_ARRAY: H256 = primitive_types::H256(hex_literal(
    *b"1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347",
));

const fn hex_literal(hex: [u8; 64]) -> [u8; 32] {
    const fn nibble(c: u8) -> u8 {
        match c {
            b'0'..=b'9' => c - b'0',
            b'a'..=b'f' => c - b'a' + 10,
            _ => panic!("invalid hex digit"),
        }
    }

    let mut out = [0u8; 32];
    let mut i = 0;
    while i < 32 {
        out[i] = (nibble(hex[i * 2]) << 4) | nibble(hex[i * 2 + 1]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_rlp::Encoder;

    #[test]
    fn test_keccak256_rlp_matches_computed() {
        let mut encoder = Encoder::new();
        encoder.encode_bytes(&[]);
        assert_eq!(ember_crypto::keccak256(&encoder.finish()), KECCAK256_RLP);
    }

    #[test]
    fn test_keccak256_rlp_array_matches_computed() {
        let mut encoder = Encoder::new();
        encoder.encode_list_with(|_| {});
        assert_eq!(ember_crypto::keccak256(&encoder.finish()), KECCAK256_RLP_ARRAY);
    }
}
