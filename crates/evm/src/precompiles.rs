use crate::error::{EvmError, EvmResult};
use crate::gas::num_words;
use crate::hardfork::{ForkConfig, Hardfork};
use ember_types::{Address, H256, U256};
use num_bigint::BigUint;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Native contract behind a reserved low address.
pub trait PrecompiledContract {
    fn required_gas(&self, input: &[u8]) -> u64;

    fn execute(&self, input: &[u8], gas_limit: u64) -> EvmResult<(Vec<u8>, u64)> {
        let gas_cost = self.required_gas(input);
        if gas_cost > gas_limit {
            return Err(EvmError::OutOfGas);
        }
        Ok((self.run(input)?, gas_cost))
    }

    fn run(&self, input: &[u8]) -> EvmResult<Vec<u8>>;
}

/// Dispatch table: reserved identifiers 0x01..0x09, availability keyed by
/// fork, BLS identifiers under EIP-2537 when enabled.
pub fn precompile_at(address: &Address, config: &ForkConfig) -> Option<Box<dyn PrecompiledContract>> {
    let word = address.to_word();
    if word.is_zero() || word > U256::from(0x11) {
        return None;
    }
    let index = word.as_u64();

    match index {
        0x01 => Some(Box::new(EcRecover)),
        0x02 => Some(Box::new(Sha256Hash)),
        0x03 => Some(Box::new(Ripemd160Hash)),
        0x04 => Some(Box::new(Identity)),
        0x05..=0x08 if config.gte(Hardfork::Byzantium) => match index {
            0x05 => Some(Box::new(ModExp)),
            0x06 => Some(Box::new(Unsupported("BN254_ADD"))),
            0x07 => Some(Box::new(Unsupported("BN254_MUL"))),
            _ => Some(Box::new(Unsupported("BN254_PAIRING"))),
        },
        0x09 if config.gte(Hardfork::Istanbul) => Some(Box::new(Unsupported("BLAKE2F"))),
        0x0a..=0x11 if config.is_active_eip(2537) => Some(Box::new(Unsupported("BLS12_381"))),
        _ => None,
    }
}

pub fn is_precompile(address: &Address, config: &ForkConfig) -> bool {
    precompile_at(address, config).is_some()
}

fn right_pad(input: &[u8], len: usize) -> Vec<u8> {
    let mut out = input.to_vec();
    out.resize(len.max(input.len()), 0);
    out
}

/// 0x01: ECDSA public key recovery.
pub struct EcRecover;

impl PrecompiledContract for EcRecover {
    fn required_gas(&self, _input: &[u8]) -> u64 {
        3_000
    }

    fn run(&self, input: &[u8]) -> EvmResult<Vec<u8>> {
        let input = right_pad(input, 128);

        let hash = H256::from_slice(&input[0..32]);
        let v = U256::from_big_endian(&input[32..64]);

        // v is 27 or 28 with no high bits set; anything else recovers
        // nothing
        if v != U256::from(27) && v != U256::from(28) {
            return Ok(Vec::new());
        }

        let signature = ember_crypto::Signature::new(
            H256::from_slice(&input[64..96]),
            H256::from_slice(&input[96..128]),
            v.as_u64() as u8,
        );

        match ember_crypto::recover_address(&hash, &signature) {
            Ok(address) => {
                let mut out = vec![0u8; 12];
                out.extend_from_slice(address.as_bytes());
                Ok(out)
            }
            Err(_) => Ok(Vec::new()),
        }
    }
}

/// 0x02
pub struct Sha256Hash;

impl PrecompiledContract for Sha256Hash {
    fn required_gas(&self, input: &[u8]) -> u64 {
        60 + 12 * num_words(input.len() as u64)
    }

    fn run(&self, input: &[u8]) -> EvmResult<Vec<u8>> {
        Ok(Sha256::digest(input).to_vec())
    }
}

/// 0x03: output is the 20-byte digest left-padded to a word.
pub struct Ripemd160Hash;

impl PrecompiledContract for Ripemd160Hash {
    fn required_gas(&self, input: &[u8]) -> u64 {
        600 + 120 * num_words(input.len() as u64)
    }

    fn run(&self, input: &[u8]) -> EvmResult<Vec<u8>> {
        let digest = Ripemd160::digest(input);
        let mut out = vec![0u8; 12];
        out.extend_from_slice(&digest);
        Ok(out)
    }
}

/// 0x04
pub struct Identity;

impl PrecompiledContract for Identity {
    fn required_gas(&self, input: &[u8]) -> u64 {
        15 + 3 * num_words(input.len() as u64)
    }

    fn run(&self, input: &[u8]) -> EvmResult<Vec<u8>> {
        Ok(input.to_vec())
    }
}

/// 0x05: modular exponentiation, EIP-198 pricing.
pub struct ModExp;

impl ModExp {
    fn parse_lengths(input: &[u8]) -> (usize, usize, usize) {
        let head = right_pad(input, 96);
        let word_to_len = |slice: &[u8]| -> usize {
            let word = U256::from_big_endian(slice);
            if word > U256::from(u32::MAX) {
                usize::MAX
            } else {
                word.as_u64() as usize
            }
        };
        (
            word_to_len(&head[0..32]),
            word_to_len(&head[32..64]),
            word_to_len(&head[64..96]),
        )
    }

    fn mult_complexity(x: u64) -> u128 {
        let x = x as u128;
        if x <= 64 {
            x * x
        } else if x <= 1024 {
            x * x / 4 + 96 * x - 3072
        } else {
            x * x / 16 + 480 * x - 199_680
        }
    }

    fn adjusted_exp_len(exp_len: usize, exp_head: &U256) -> u64 {
        let bit_len = if exp_head.is_zero() {
            0
        } else {
            exp_head.bits() as u64 - 1
        };
        if exp_len <= 32 {
            bit_len
        } else {
            8 * (exp_len as u64 - 32) + bit_len
        }
    }
}

impl PrecompiledContract for ModExp {
    fn required_gas(&self, input: &[u8]) -> u64 {
        const LEN_CEILING: usize = 1 << 20;

        let (base_len, exp_len, mod_len) = Self::parse_lengths(input);
        // Inputs this large price out at any plausible gas limit
        if base_len > LEN_CEILING || exp_len > LEN_CEILING || mod_len > LEN_CEILING {
            return u64::MAX;
        }

        let body = input.get(96..).unwrap_or(&[]);
        let head_len = exp_len.min(32);
        let padded = right_pad(body, base_len + head_len);
        let exp_head = U256::from_big_endian(&padded[base_len..base_len + head_len]);

        let complexity = Self::mult_complexity(base_len.max(mod_len) as u64);
        let adjusted = Self::adjusted_exp_len(exp_len, &exp_head).max(1) as u128;

        let gas = complexity.saturating_mul(adjusted) / 20;
        gas.min(u64::MAX as u128) as u64
    }

    fn run(&self, input: &[u8]) -> EvmResult<Vec<u8>> {
        let (base_len, exp_len, mod_len) = Self::parse_lengths(input);
        if mod_len == 0 {
            return Ok(Vec::new());
        }

        let body = if input.len() > 96 { &input[96..] } else { &[] };
        let body = right_pad(body, base_len + exp_len + mod_len);

        let base = BigUint::from_bytes_be(&body[0..base_len]);
        let exponent = BigUint::from_bytes_be(&body[base_len..base_len + exp_len]);
        let modulus = BigUint::from_bytes_be(&body[base_len + exp_len..base_len + exp_len + mod_len]);

        let result = if modulus == BigUint::default() {
            Vec::new()
        } else {
            base.modpow(&exponent, &modulus).to_bytes_be()
        };

        let mut out = vec![0u8; mod_len - result.len().min(mod_len)];
        out.extend_from_slice(&result[result.len().saturating_sub(mod_len)..]);
        Ok(out)
    }
}

/// Bodies consumed through the external crypto boundary; the dispatcher
/// recognises the identifier but cannot run it natively.
pub struct Unsupported(&'static str);

impl PrecompiledContract for Unsupported {
    fn required_gas(&self, _input: &[u8]) -> u64 {
        0
    }

    fn run(&self, _input: &[u8]) -> EvmResult<Vec<u8>> {
        Err(EvmError::PrecompileFailed(self.0.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn istanbul() -> ForkConfig {
        ForkConfig::new(Hardfork::Istanbul)
    }

    fn addr(n: u64) -> Address {
        Address::from_word(U256::from(n))
    }

    #[test]
    fn test_dispatch_ranges() {
        let frontier = ForkConfig::new(Hardfork::Frontier);
        assert!(is_precompile(&addr(1), &frontier));
        assert!(is_precompile(&addr(4), &frontier));
        assert!(!is_precompile(&addr(5), &frontier));

        assert!(is_precompile(&addr(5), &istanbul()));
        assert!(is_precompile(&addr(9), &istanbul()));
        assert!(!is_precompile(&addr(0x0a), &istanbul()));
        assert!(!is_precompile(&addr(0), &istanbul()));
        assert!(!is_precompile(&addr(0x12), &istanbul()));

        let with_bls = ForkConfig::new(Hardfork::Istanbul).with_eips(vec![2537]);
        assert!(is_precompile(&addr(0x0a), &with_bls));
        assert!(is_precompile(&addr(0x11), &with_bls));
    }

    #[test]
    fn test_identity() {
        let input = b"echo".to_vec();
        let (output, gas) = Identity.execute(&input, 100).unwrap();
        assert_eq!(output, input);
        assert_eq!(gas, 15 + 3);
    }

    #[test]
    fn test_identity_out_of_gas() {
        assert_eq!(Identity.execute(b"echo", 10), Err(EvmError::OutOfGas));
    }

    #[test]
    fn test_sha256() {
        let (output, gas) = Sha256Hash.execute(b"", 100).unwrap();
        assert_eq!(
            hex::encode(&output),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(gas, 60);
    }

    #[test]
    fn test_ripemd160_padding() {
        let (output, _) = Ripemd160Hash.execute(b"", 1_000).unwrap();
        assert_eq!(output.len(), 32);
        assert_eq!(&output[..12], &[0u8; 12]);
    }

    #[test]
    fn test_ecrecover_roundtrip() {
        let key = ember_crypto::generate_private_key();
        let message = ember_crypto::keccak256(b"hello");
        let signature = ember_crypto::sign_message(&message, &key).unwrap();

        let mut input = Vec::with_capacity(128);
        input.extend_from_slice(message.as_bytes());
        let mut v = [0u8; 32];
        v[31] = signature.v;
        input.extend_from_slice(&v);
        input.extend_from_slice(signature.r.as_bytes());
        input.extend_from_slice(signature.s.as_bytes());

        let (output, _) = EcRecover.execute(&input, 10_000).unwrap();
        assert_eq!(output.len(), 32);
        assert_eq!(&output[12..], ember_crypto::address_of(&key).as_bytes());
    }

    #[test]
    fn test_ecrecover_bad_v_returns_empty() {
        let input = [0u8; 128];
        let (output, _) = EcRecover.execute(&input, 10_000).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_modexp_small() {
        // 3 ^ 5 mod 7 = 5
        let mut input = Vec::new();
        input.extend_from_slice(&{
            let mut w = [0u8; 32];
            w[31] = 1;
            w
        }); // base_len
        input.extend_from_slice(&{
            let mut w = [0u8; 32];
            w[31] = 1;
            w
        }); // exp_len
        input.extend_from_slice(&{
            let mut w = [0u8; 32];
            w[31] = 1;
            w
        }); // mod_len
        input.extend_from_slice(&[3, 5, 7]);

        let (output, _) = ModExp.execute(&input, 1_000_000).unwrap();
        assert_eq!(output, vec![5]);
    }

    #[test]
    fn test_unsupported_body_fails() {
        let result = Unsupported("BN254_ADD").execute(&[], 1_000);
        assert!(matches!(result, Err(EvmError::PrecompileFailed(_))));
    }
}
