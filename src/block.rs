// Block: the unit the chain links. Hash derivation, PoW check, file persistence.
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};

use crate::crypto::{hash::hash_sha256_hex, keys};
use crate::diploma::DiplomaRecord;
use crate::error::AppError;

/// Keys of the persisted diploma_data object, in the order the hash formula's
/// `canonical_json(diploma_data)` serializes them — alphabetical, matching the
/// original `json.dumps(diploma_data, sort_keys=True)` the hash formula was
/// defined against. Distinct from `diploma::CANONICAL_FIELD_ORDER`, which
/// omits `signature` and is used for the signature itself, not the block hash.
const HASH_FIELD_ORDER: [&str; 10] = [
    "full_name",
    "institution",
    "issue_date",
    "program",
    "qualification",
    "rector_name",
    "reg_number",
    "secretary_name",
    "signature",
    "specialty",
];

/// 64 hex zeros — the `prev_hash` of the genesis block.
pub fn genesis_prev_hash() -> String {
    "0".repeat(64)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: u64,
    pub prev_hash: String,
    pub timestamp: u64,
    pub diploma_data: DiplomaRecord,
    #[serde(rename = "public_key")]
    pub public_key_pem: String,
    pub signature: String,
    pub nonce: u64,
    pub difficulty: u32,
    pub hash: String,
}

impl Block {
    /// Builds an unsealed block: verifies the diploma signature, stamps the
    /// current time, sets nonce 0, and computes the initial (unsealed) hash.
    /// Fails with `InvalidSignature` if the diploma does not verify under
    /// `public_key_pem`.
    pub fn new(
        id: u64,
        diploma_data: DiplomaRecord,
        public_key_pem: String,
        prev_hash: String,
        difficulty: u32,
    ) -> Result<Block, AppError> {
        let public_key = keys::public_key_from_pem(&public_key_pem)
            .map_err(|e| AppError::InvalidSignature(format!("invalid public key: {e}")))?;
        if !diploma_data.verify(&public_key) {
            return Err(AppError::InvalidSignature("Invalid diploma signature!".to_string()));
        }
        let signature = diploma_data.signature.clone();
        let timestamp = current_unix_timestamp();

        let mut block = Block {
            id,
            prev_hash,
            timestamp,
            diploma_data,
            public_key_pem,
            signature,
            nonce: 0,
            difficulty,
            hash: String::new(),
        };
        block.hash = block.calculate_hash();
        Ok(block)
    }

    /// The canonical JSON form of `diploma_data` used by the hash formula:
    /// all fields (including `signature`), alphabetically ordered.
    fn canonical_diploma_json(&self) -> String {
        let mut out = String::from("{");
        for (i, key) in HASH_FIELD_ORDER.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let value = self.diploma_field(key);
            out.push_str(&serde_json::to_string(key).expect("key serializes"));
            out.push(':');
            out.push_str(&serde_json::to_string(value).expect("value serializes"));
        }
        out.push('}');
        out
    }

    fn diploma_field(&self, name: &str) -> &str {
        let d = &self.diploma_data;
        match name {
            "institution" => &d.institution,
            "full_name" => &d.full_name,
            "program" => &d.program,
            "qualification" => &d.qualification,
            "specialty" => &d.specialty,
            "issue_date" => &d.issue_date,
            "reg_number" => &d.reg_number,
            "rector_name" => &d.rector_name,
            "secretary_name" => &d.secretary_name,
            "signature" => &d.signature,
            other => unreachable!("unknown diploma field {other}"),
        }
    }

    /// `sha256_hex(prev_hash ‖ timestamp ‖ canonical_json(diploma_data) ‖ public_key_pem ‖ signature ‖ nonce ‖ difficulty)`
    pub fn calculate_hash(&self) -> String {
        let mut buf = String::new();
        buf.push_str(&self.prev_hash);
        buf.push_str(&self.timestamp.to_string());
        buf.push_str(&self.canonical_diploma_json());
        buf.push_str(&self.public_key_pem);
        buf.push_str(&self.signature);
        buf.push_str(&self.nonce.to_string());
        buf.push_str(&self.difficulty.to_string());
        hash_sha256_hex(buf.as_bytes())
    }

    /// The `hash_info` string miners hash together with `nonce‖difficulty` to
    /// test proof of work: every hash-formula field except nonce/difficulty.
    pub fn hash_info(&self) -> String {
        let mut buf = String::new();
        buf.push_str(&self.prev_hash);
        buf.push_str(&self.timestamp.to_string());
        buf.push_str(&self.canonical_diploma_json());
        buf.push_str(&self.public_key_pem);
        buf.push_str(&self.signature);
        buf
    }

    /// Reloads the public key from the stored PEM and re-verifies the diploma.
    pub fn verify_diploma(&self) -> bool {
        match keys::public_key_from_pem(&self.public_key_pem) {
            Ok(pk) => self.diploma_data.verify(&pk),
            Err(_) => false,
        }
    }

    pub fn meets_difficulty(&self) -> bool {
        hash_has_leading_zeros(&self.hash, self.difficulty)
    }

    /// Sealed iff the hash meets difficulty and the diploma verifies.
    pub fn is_sealed(&self) -> bool {
        self.meets_difficulty() && self.verify_diploma()
    }

    /// Used only for genesis creation at startup: increments `nonce` until the
    /// recomputed hash has the required leading zeros.
    pub fn mine(&mut self) {
        loop {
            self.hash = self.calculate_hash();
            if self.meets_difficulty() {
                return;
            }
            self.nonce += 1;
        }
    }

    /// The `Block_<5-digit>.json` filename for this block's id.
    pub fn file_name(&self) -> String {
        format!("Block_{:05}.json", self.id)
    }

    pub fn to_json_pretty(&self) -> Result<String, AppError> {
        serde_json::to_string_pretty(self).map_err(|e| AppError::ServerError(e.to_string()))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Block, AppError> {
        serde_json::from_slice(bytes).map_err(|e| AppError::ServerError(format!("corrupt block file: {e}")))
    }

    pub fn public_key(&self) -> Result<RsaPublicKey, AppError> {
        keys::public_key_from_pem(&self.public_key_pem)
            .map_err(|e| AppError::ServerError(format!("invalid stored public key: {e}")))
    }
}

pub fn hash_has_leading_zeros(hash: &str, difficulty: u32) -> bool {
    let needed = difficulty as usize;
    hash.len() >= needed && hash.as_bytes()[..needed].iter().all(|&b| b == b'0')
}

fn current_unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
