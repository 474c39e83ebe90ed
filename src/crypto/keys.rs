// RSA keypair generation and PEM encode/decode.
use pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use thiserror::Error;

pub const RSA_KEY_BITS: usize = 2048;
pub const RSA_PUBLIC_EXPONENT: u32 = 65537;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key generation failed: {0}")]
    Generation(String),
    #[error("invalid PEM: {0}")]
    InvalidPem(String),
}

/// Generates a fresh RSA-2048 keypair (e=65537), matching the keys diplomas are signed with.
pub fn generate_keypair() -> Result<(RsaPrivateKey, RsaPublicKey), KeyError> {
    let mut rng = rand::rngs::OsRng;
    let private_key = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
        .map_err(|e| KeyError::Generation(e.to_string()))?;
    let public_key = RsaPublicKey::from(&private_key);
    Ok((private_key, public_key))
}

/// PKCS#8 PEM encoding of the private key (unencrypted).
pub fn private_key_to_pem(key: &RsaPrivateKey) -> Result<String, KeyError> {
    key.to_pkcs8_pem(LineEnding::LF)
        .map(|z| z.to_string())
        .map_err(|e| KeyError::InvalidPem(e.to_string()))
}

/// SubjectPublicKeyInfo PEM encoding of the public key.
pub fn public_key_to_pem(key: &RsaPublicKey) -> Result<String, KeyError> {
    key.to_public_key_pem(LineEnding::LF)
        .map_err(|e| KeyError::InvalidPem(e.to_string()))
}

pub fn private_key_from_pem(pem: &str) -> Result<RsaPrivateKey, KeyError> {
    RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| KeyError::InvalidPem(e.to_string()))
}

pub fn public_key_from_pem(pem: &str) -> Result<RsaPublicKey, KeyError> {
    RsaPublicKey::from_public_key_pem(pem).map_err(|e| KeyError::InvalidPem(e.to_string()))
}
