// Cryptographic Hashing Wrappers
use sha2::{Digest, Sha256};

/// SHA-256: used for block hashing and as the PSS hash function.
pub fn hash_sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256, hex-encoded. The wire/storage form blocks use.
pub fn hash_sha256_hex(data: &[u8]) -> String {
    hex::encode(hash_sha256(data))
}
