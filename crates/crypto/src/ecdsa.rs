use crate::{CryptoError, Result};
use ember_types::{Address, H256};
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message, Secp256k1,
};
pub use secp256k1::{PublicKey, SecretKey};

/// ECDSA signature with recovery ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub r: H256,
    pub s: H256,
    pub v: u8,
}

impl Signature {
    pub fn new(r: H256, s: H256, v: u8) -> Self {
        Signature { r, s, v }
    }

    /// Compact representation (65 bytes: r || s || v)
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[0..32].copy_from_slice(self.r.as_bytes());
        bytes[32..64].copy_from_slice(self.s.as_bytes());
        bytes[64] = self.v;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 65 {
            return Err(CryptoError::InvalidSignature);
        }

        Ok(Signature {
            r: H256::from_slice(&bytes[0..32]),
            s: H256::from_slice(&bytes[32..64]),
            v: bytes[64],
        })
    }

    /// Recovery parity, accepting both the 0/1 and 27/28 encodings.
    pub fn recovery_id(&self) -> Result<u8> {
        match self.v {
            0 | 1 => Ok(self.v),
            27 | 28 => Ok(self.v - 27),
            _ => Err(CryptoError::InvalidSignature),
        }
    }
}

/// Sign a 32-byte message hash with a private key
pub fn sign_message(message: &H256, private_key: &SecretKey) -> Result<Signature> {
    let secp = Secp256k1::new();
    let message = Message::from_slice(message.as_bytes())?;
    let recoverable_sig = secp.sign_ecdsa_recoverable(&message, private_key);
    let (recovery_id, sig_bytes) = recoverable_sig.serialize_compact();

    Ok(Signature {
        r: H256::from_slice(&sig_bytes[0..32]),
        s: H256::from_slice(&sig_bytes[32..64]),
        v: recovery_id.to_i32() as u8 + 27,
    })
}

/// Recover the public key from a signature over a message hash
pub fn recover_public_key(message: &H256, signature: &Signature) -> Result<PublicKey> {
    let secp = Secp256k1::new();
    let message = Message::from_slice(message.as_bytes())?;

    let recovery_id = RecoveryId::from_i32(signature.recovery_id()? as i32)
        .map_err(|_| CryptoError::InvalidSignature)?;

    let mut sig_bytes = [0u8; 64];
    sig_bytes[0..32].copy_from_slice(signature.r.as_bytes());
    sig_bytes[32..64].copy_from_slice(signature.s.as_bytes());

    let recoverable_sig = RecoverableSignature::from_compact(&sig_bytes, recovery_id)?;
    let public_key = secp.recover_ecdsa(&message, &recoverable_sig)?;

    Ok(public_key)
}

/// Recover the signing address from a signature over a message hash
pub fn recover_address(message: &H256, signature: &Signature) -> Result<Address> {
    let public_key = recover_public_key(message, signature)?;
    Ok(public_key_to_address(&public_key))
}

/// Last 20 bytes of the Keccak-256 of the uncompressed public key
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    let public_key_bytes = public_key.serialize_uncompressed();
    // Skip the 0x04 prefix byte
    let hash = crate::keccak256(&public_key_bytes[1..]);
    Address::from_word(ember_types::U256::from_big_endian(hash.as_bytes()))
}

pub fn generate_private_key() -> SecretKey {
    SecretKey::new(&mut rand::thread_rng())
}

/// Address controlled by a private key
pub fn address_of(key: &SecretKey) -> Address {
    let secp = Secp256k1::new();
    public_key_to_address(&PublicKey::from_secret_key(&secp, key))
}
