// Diploma record: canonical serialization and PSS signature creation/verification.
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};

use crate::crypto::pss;

/// Fixed field order for the canonical (signed) serialization. Every signer and
/// verifier in the chain must agree on this order — changing it invalidates
/// every signature ever produced.
const CANONICAL_FIELD_ORDER: [&str; 9] = [
    "institution",
    "full_name",
    "program",
    "qualification",
    "specialty",
    "issue_date",
    "reg_number",
    "rector_name",
    "secretary_name",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiplomaRecord {
    pub institution: String,
    pub full_name: String,
    pub program: String,
    pub qualification: String,
    pub specialty: String,
    pub issue_date: String,
    pub reg_number: String,
    pub rector_name: String,
    pub secretary_name: String,
    pub signature: String,
}

impl DiplomaRecord {
    fn field(&self, name: &str) -> &str {
        match name {
            "institution" => &self.institution,
            "full_name" => &self.full_name,
            "program" => &self.program,
            "qualification" => &self.qualification,
            "specialty" => &self.specialty,
            "issue_date" => &self.issue_date,
            "reg_number" => &self.reg_number,
            "rector_name" => &self.rector_name,
            "secretary_name" => &self.secretary_name,
            other => unreachable!("unknown canonical field {other}"),
        }
    }

    /// Byte-identical UTF-8 JSON object over the non-signature fields, in the
    /// fixed order every signer and verifier must share. Non-ASCII is preserved.
    pub fn canonical_fields_bytes(&self) -> Vec<u8> {
        let mut out = String::from("{");
        for (i, key) in CANONICAL_FIELD_ORDER.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&serde_json::to_string(key).expect("key serializes"));
            out.push(':');
            out.push_str(&serde_json::to_string(self.field(key)).expect("value serializes"));
        }
        out.push('}');
        out.into_bytes()
    }

    /// Signs the canonical fields with `private_key`, storing the base64 PSS
    /// signature in `signature`.
    pub fn sign(&mut self, private_key: &RsaPrivateKey) -> Result<(), pss::SignError> {
        let sig = pss::sign(private_key, &self.canonical_fields_bytes())?;
        self.signature = sig;
        Ok(())
    }

    /// Verifies `signature` against the canonical fields under `public_key`.
    /// Never panics: malformed signatures simply fail to verify.
    pub fn verify(&self, public_key: &RsaPublicKey) -> bool {
        pss::verify(public_key, &self.canonical_fields_bytes(), &self.signature).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::generate_keypair;

    fn sample(signature: &str) -> DiplomaRecord {
        DiplomaRecord {
            institution: "State University".to_string(),
            full_name: "Ada Lovelace".to_string(),
            program: "Computer Science".to_string(),
            qualification: "Master".to_string(),
            specialty: "Software Engineering".to_string(),
            issue_date: "2026-06-01".to_string(),
            reg_number: "2026-BY-0001".to_string(),
            rector_name: "I. Ivanov".to_string(),
            secretary_name: "M. Petrova".to_string(),
            signature: signature.to_string(),
        }
    }

    #[test]
    fn sign_then_verify_succeeds() {
        let (sk, pk) = generate_keypair().unwrap();
        let mut diploma = sample("");
        diploma.sign(&sk).unwrap();
        assert!(diploma.verify(&pk));
    }

    #[test]
    fn verify_with_other_key_fails() {
        let (sk, _pk) = generate_keypair().unwrap();
        let (_, other_pk) = generate_keypair().unwrap();
        let mut diploma = sample("");
        diploma.sign(&sk).unwrap();
        assert!(!diploma.verify(&other_pk));
    }

    #[test]
    fn mutated_field_fails_verification() {
        let (sk, pk) = generate_keypair().unwrap();
        let mut diploma = sample("");
        diploma.sign(&sk).unwrap();
        diploma.qualification = "Doctor".to_string();
        assert!(!diploma.verify(&pk));
    }

    #[test]
    fn canonical_bytes_are_order_stable() {
        let d = sample("sig");
        let a = d.canonical_fields_bytes();
        let b = d.canonical_fields_bytes();
        assert_eq!(a, b);
        assert!(a.starts_with(b"{\"institution\":"));
    }
}
