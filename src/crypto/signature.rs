// file: src/crypto/signature.rs
// description: ed25519 verification of signed field answers
// reference: https://docs.rs/ed25519-dalek

use crate::error::{ExportError, Result};
use crate::models::DecryptedField;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use tracing::debug;

/// Parsed `v=<txn>,t=<millis>,f=<formId>,s=<sig>` signature string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSignature {
    pub transaction_id: String,
    pub time_ms: i64,
    pub form_id: String,
    pub signature: String,
}

impl FieldSignature {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut transaction_id = None;
        let mut time_ms = None;
        let mut form_id = None;
        let mut signature = None;

        for part in raw.split(',') {
            let Some((key, value)) = part.split_once('=') else {
                return Err(ExportError::Signature(format!("malformed segment '{}'", part)));
            };
            match key.trim() {
                "v" => transaction_id = Some(value.to_string()),
                "t" => {
                    time_ms = Some(value.parse::<i64>().map_err(|_| {
                        ExportError::Signature(format!("invalid signature time '{}'", value))
                    })?)
                }
                "f" => form_id = Some(value.to_string()),
                // base64 padding may contain '=', split_once keeps it intact
                "s" => signature = Some(value.to_string()),
                _ => {}
            }
        }

        let missing = |name: &str| ExportError::Signature(format!("signature missing '{}'", name));
        Ok(Self {
            transaction_id: transaction_id.ok_or_else(|| missing("v"))?,
            time_ms: time_ms.ok_or_else(|| missing("t"))?,
            form_id: form_id.ok_or_else(|| missing("f"))?,
            signature: signature.ok_or_else(|| missing("s"))?,
        })
    }

    pub fn basestring(&self, field_id: &str, answer: &str) -> String {
        format!(
            "{}.{}.{}.{}.{}",
            self.transaction_id, self.form_id, field_id, answer, self.time_ms
        )
    }
}

#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    public_key: Option<VerifyingKey>,
    expiry_ms: i64,
}

impl SignatureVerifier {
    pub fn new(public_key_b64: Option<&str>, expiry_secs: u64) -> Result<Self> {
        let public_key = match public_key_b64.map(str::trim).filter(|k| !k.is_empty()) {
            Some(encoded) => {
                let bytes = STANDARD.decode(encoded).map_err(|e| {
                    ExportError::Config(format!("verification key is not base64: {}", e))
                })?;
                let array: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
                    ExportError::Config(format!(
                        "verification key must be 32 bytes, got {}",
                        bytes.len()
                    ))
                })?;
                Some(VerifyingKey::from_bytes(&array).map_err(|e| {
                    ExportError::Config(format!("invalid verification key: {}", e))
                })?)
            }
            None => None,
        };

        Ok(Self {
            public_key,
            expiry_ms: (expiry_secs as i64).saturating_mul(1000),
        })
    }

    /// Checks one signed answer. `Ok(false)` means the signature is well formed but not valid.
    pub fn authenticate(
        &self,
        raw_signature: &str,
        submission_created_ms: i64,
        form_id: &str,
        field_id: &str,
        answer: &str,
    ) -> Result<bool> {
        let parsed = FieldSignature::parse(raw_signature)?;

        let elapsed = submission_created_ms - parsed.time_ms;
        if elapsed <= 0 || elapsed >= self.expiry_ms {
            debug!("Signature for field {} outside transaction window", field_id);
            return Ok(false);
        }
        if parsed.form_id != form_id {
            debug!("Signature for field {} issued for another form", field_id);
            return Ok(false);
        }

        let Some(public_key) = &self.public_key else {
            return Err(ExportError::Signature(
                "no verification public key configured".to_string(),
            ));
        };

        let sig_bytes = STANDARD
            .decode(&parsed.signature)
            .map_err(|e| ExportError::Signature(format!("signature is not base64: {}", e)))?;
        let signature = Signature::from_slice(&sig_bytes)
            .map_err(|e| ExportError::Signature(e.to_string()))?;

        let data = parsed.basestring(field_id, answer);
        Ok(public_key.verify(data.as_bytes(), &signature).is_ok())
    }

    /// True when every signed field carries an answer and a valid signature.
    pub fn verify_fields(
        &self,
        fields: &[DecryptedField],
        submission_created_ms: i64,
        form_id: &str,
    ) -> bool {
        fields.iter().filter(|f| f.signature.is_some()).all(|field| {
            let (Some(signature), Some(answer)) = (&field.signature, &field.answer) else {
                return false;
            };
            match self.authenticate(signature, submission_created_ms, form_id, &field.id, answer) {
                Ok(valid) => valid,
                Err(e) => {
                    debug!("Signature check for field {} failed: {}", field.id, e);
                    false
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SigningAuthority;

    const FORM: &str = "form123";
    const CREATED: i64 = 1_700_000_000_000;

    fn signed_field(authority: &SigningAuthority, answer: &str, time_ms: i64) -> DecryptedField {
        let mut field = DecryptedField::text("f1", "Mobile", answer);
        field.signature = Some(authority.sign_field("txn1", FORM, "f1", answer, time_ms));
        field
    }

    #[test]
    fn test_parse_signature() {
        let parsed = FieldSignature::parse("v=txn,t=123,f=form,s=abc==").unwrap();
        assert_eq!(parsed.transaction_id, "txn");
        assert_eq!(parsed.time_ms, 123);
        assert_eq!(parsed.form_id, "form");
        assert_eq!(parsed.signature, "abc==");

        assert!(FieldSignature::parse("v=txn,t=abc,f=form,s=x").is_err());
        assert!(FieldSignature::parse("v=txn,f=form,s=x").is_err());
    }

    #[test]
    fn test_valid_signature() {
        let authority = SigningAuthority::new();
        let verifier = SignatureVerifier::new(Some(&authority.public_key_b64()), 14400).unwrap();

        let field = signed_field(&authority, "91234567", CREATED - 60_000);
        assert!(verifier.verify_fields(&[field], CREATED, FORM));
    }

    #[test]
    fn test_tampered_answer_rejected() {
        let authority = SigningAuthority::new();
        let verifier = SignatureVerifier::new(Some(&authority.public_key_b64()), 14400).unwrap();

        let mut field = signed_field(&authority, "91234567", CREATED - 60_000);
        field.answer = Some("99999999".to_string());
        assert!(!verifier.verify_fields(&[field], CREATED, FORM));
    }

    #[test]
    fn test_expired_or_future_signature_rejected() {
        let authority = SigningAuthority::new();
        let verifier = SignatureVerifier::new(Some(&authority.public_key_b64()), 14400).unwrap();

        let expired = signed_field(&authority, "a", CREATED - 14_400_000);
        let future = signed_field(&authority, "a", CREATED + 1);
        assert!(!verifier.verify_fields(&[expired], CREATED, FORM));
        assert!(!verifier.verify_fields(&[future], CREATED, FORM));
    }

    #[test]
    fn test_other_form_rejected() {
        let authority = SigningAuthority::new();
        let verifier = SignatureVerifier::new(Some(&authority.public_key_b64()), 14400).unwrap();

        let field = signed_field(&authority, "a", CREATED - 1000);
        assert!(!verifier.verify_fields(&[field], CREATED, "another-form"));
    }

    #[test]
    fn test_unsigned_fields_pass_and_missing_key_fails_signed() {
        let verifier = SignatureVerifier::new(None, 14400).unwrap();
        let plain = DecryptedField::text("f2", "Name", "Bob");
        assert!(verifier.verify_fields(&[plain], CREATED, FORM));

        let authority = SigningAuthority::new();
        let signed = signed_field(&authority, "a", CREATED - 1000);
        assert!(!verifier.verify_fields(&[signed], CREATED, FORM));
    }

    #[test]
    fn test_signed_field_without_answer_rejected() {
        let authority = SigningAuthority::new();
        let verifier = SignatureVerifier::new(Some(&authority.public_key_b64()), 14400).unwrap();

        let mut field = signed_field(&authority, "a", CREATED - 1000);
        field.answer = None;
        assert!(!verifier.verify_fields(&[field], CREATED, FORM));
    }
}
