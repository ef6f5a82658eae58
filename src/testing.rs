// file: src/testing.rs
// description: test fixtures producing real encrypted envelopes and signatures
// reference: crypto_box and ed25519-dalek examples

use crate::crypto::{EncryptedFile, FormSecretKey};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use crypto_box::aead::{Aead, AeadCore, OsRng};
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use ed25519_dalek::{Signer, SigningKey};
use serde_json::{Value, json};

pub struct FormKeys {
    pub secret_b64: String,
    pub public: PublicKey,
}

impl FormKeys {
    pub fn generate() -> Self {
        let secret = SecretKey::generate(&mut OsRng);
        Self {
            secret_b64: STANDARD.encode(secret.to_bytes()),
            public: secret.public_key(),
        }
    }

    pub fn secret(&self) -> FormSecretKey {
        FormSecretKey::from_base64(&self.secret_b64).unwrap()
    }
}

fn seal_parts(form_public: &PublicKey, plaintext: &[u8]) -> (String, String, String) {
    let ephemeral = SecretKey::generate(&mut OsRng);
    let salsa_box = SalsaBox::new(form_public, &ephemeral);
    let nonce = SalsaBox::generate_nonce(&mut OsRng);
    let ciphertext = salsa_box.encrypt(&nonce, plaintext).unwrap();
    (
        STANDARD.encode(ephemeral.public_key().as_bytes()),
        STANDARD.encode(nonce.as_slice()),
        STANDARD.encode(ciphertext),
    )
}

/// Encrypts into the `"<publicKey>;<nonce>:<ciphertext>"` wire format.
pub fn seal(form_public: &PublicKey, plaintext: &[u8]) -> String {
    let (public_key, nonce, ciphertext) = seal_parts(form_public, plaintext);
    format!("{};{}:{}", public_key, nonce, ciphertext)
}

pub fn seal_file(form_public: &PublicKey, plaintext: &[u8]) -> EncryptedFile {
    let (submission_public_key, nonce, binary) = seal_parts(form_public, plaintext);
    EncryptedFile {
        submission_public_key,
        nonce,
        binary,
    }
}

pub fn envelope_line(keys: &FormKeys, id: &str, created: &str, responses: &Value) -> String {
    json!({
        "_id": id,
        "created": created,
        "encryptedContent": seal(&keys.public, responses.to_string().as_bytes()),
        "version": 1,
        "attachmentMetadata": {},
    })
    .to_string()
}

pub fn text_fields(pairs: &[(&str, &str, &str)]) -> Value {
    Value::Array(
        pairs
            .iter()
            .map(|(id, question, answer)| {
                json!({"_id": id, "fieldType": "textfield", "question": question, "answer": answer})
            })
            .collect(),
    )
}

pub struct SigningAuthority {
    key: SigningKey,
}

impl SigningAuthority {
    pub fn new() -> Self {
        Self {
            key: SigningKey::from_bytes(&[7u8; 32]),
        }
    }

    pub fn public_key_b64(&self) -> String {
        STANDARD.encode(self.key.verifying_key().as_bytes())
    }

    pub fn sign_field(
        &self,
        transaction_id: &str,
        form_id: &str,
        field_id: &str,
        answer: &str,
        time_ms: i64,
    ) -> String {
        let base = format!(
            "{}.{}.{}.{}.{}",
            transaction_id, form_id, field_id, answer, time_ms
        );
        let signature = self.key.sign(base.as_bytes());
        format!(
            "f={},v={},t={},s={}",
            form_id,
            transaction_id,
            time_ms,
            STANDARD.encode(signature.to_bytes())
        )
    }
}
