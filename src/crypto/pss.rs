// RSASSA-PSS signing/verification with MGF1(SHA-256) and maximum salt length.
use base64::{engine::general_purpose::STANDARD, Engine};
use rsa::pss::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignError {
    #[error("signing failed: {0}")]
    Sign(String),
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("signature is not valid base64: {0}")]
    Base64(String),
    #[error("signature verification failed")]
    Invalid,
}

/// PSS salt length used by the original implementation: modulus_len - hash_len - 2 bytes
/// ("maximum" salt length for the given key size and hash algorithm).
fn max_salt_len(key_size_bytes: usize) -> usize {
    const SHA256_OUTPUT_LEN: usize = 32;
    key_size_bytes.saturating_sub(SHA256_OUTPUT_LEN + 2)
}

/// Signs `message` with RSASSA-PSS/MGF1(SHA-256), salt length = max for the key size.
/// Returns the signature base64-encoded, matching the wire/storage form diplomas carry.
pub fn sign(private_key: &RsaPrivateKey, message: &[u8]) -> Result<String, SignError> {
    let salt_len = max_salt_len(private_key.size());
    let signing_key = SigningKey::<Sha256>::new_with_salt_len(private_key.clone(), salt_len);
    let mut rng = rand::rngs::OsRng;
    let signature = signing_key
        .try_sign_with_rng(&mut rng, message)
        .map_err(|e| SignError::Sign(e.to_string()))?;
    Ok(STANDARD.encode(signature.to_bytes()))
}

/// Verifies a base64-encoded RSASSA-PSS signature against `message` using `public_key`.
pub fn verify(public_key: &RsaPublicKey, message: &[u8], signature_b64: &str) -> Result<(), VerifyError> {
    let salt_len = max_salt_len(public_key.size());
    let verifying_key = VerifyingKey::<Sha256>::new_with_salt_len(public_key.clone(), salt_len);
    let sig_bytes = STANDARD
        .decode(signature_b64)
        .map_err(|e| VerifyError::Base64(e.to_string()))?;
    let signature = Signature::try_from(sig_bytes.as_slice()).map_err(|_| VerifyError::Invalid)?;
    verifying_key
        .verify(message, &signature)
        .map_err(|_| VerifyError::Invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::generate_keypair;

    #[test]
    fn sign_then_verify_succeeds() {
        let (sk, pk) = generate_keypair().unwrap();
        let msg = b"a diploma record";
        let sig = sign(&sk, msg).unwrap();
        assert!(verify(&pk, msg, &sig).is_ok());
    }

    #[test]
    fn tampered_message_fails_verification() {
        let (sk, pk) = generate_keypair().unwrap();
        let sig = sign(&sk, b"original").unwrap();
        assert!(verify(&pk, b"tampered", &sig).is_err());
    }

    #[test]
    fn malformed_base64_is_rejected() {
        let (_, pk) = generate_keypair().unwrap();
        assert!(verify(&pk, b"anything", "not-base64!!").is_err());
    }

    #[test]
    fn max_salt_len_matches_key_size() {
        assert_eq!(max_salt_len(256), 256 - 32 - 2);
    }
}
