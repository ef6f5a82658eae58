// file: src/crypto/decrypt.rs
// description: public-key box decryption of submission content and attachments
// reference: https://docs.rs/crypto_box

use crate::error::{ExportError, Result};
use crate::models::DecryptedField;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use crypto_box::aead::Aead;
use crypto_box::aead::generic_array::GenericArray;
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use serde::Deserialize;
use serde_json::{Map, Value};
use zeroize::Zeroizing;

pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 24;

/// Form secret key. The inner key zeroizes on drop.
pub struct FormSecretKey {
    inner: SecretKey,
}

impl FormSecretKey {
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|e| ExportError::Decryption(format!("secret key is not base64: {}", e)))?,
        );
        let array: [u8; KEY_SIZE] = bytes.as_slice().try_into().map_err(|_| {
            ExportError::Decryption(format!(
                "secret key must be {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            ))
        })?;

        Ok(Self {
            inner: SecretKey::from(array),
        })
    }

    pub fn public_key_base64(&self) -> String {
        STANDARD.encode(self.inner.public_key().as_bytes())
    }

    /// Opens a box sealed by `sender_public` for this key.
    pub fn open(&self, sender_public: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let sender: [u8; KEY_SIZE] = sender_public.try_into().map_err(|_| {
            ExportError::Decryption(format!(
                "sender public key must be {} bytes, got {}",
                KEY_SIZE,
                sender_public.len()
            ))
        })?;
        if nonce.len() != NONCE_SIZE {
            return Err(ExportError::Decryption(format!(
                "nonce must be {} bytes, got {}",
                NONCE_SIZE,
                nonce.len()
            )));
        }

        let salsa_box = SalsaBox::new(&PublicKey::from(sender), &self.inner);
        salsa_box
            .decrypt(GenericArray::from_slice(nonce), ciphertext)
            .map_err(|_| ExportError::Decryption("authentication failed".to_string()))
    }
}

impl std::fmt::Debug for FormSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormSecretKey")
            .field("public_key", &self.public_key_base64())
            .finish_non_exhaustive()
    }
}

/// Encrypted attachment as returned by the attachment download url.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedFile {
    pub submission_public_key: String,
    pub nonce: String,
    pub binary: String,
}

#[derive(Debug, Clone, Default)]
pub struct DecryptedContent {
    pub responses: Vec<DecryptedField>,
    pub verified: Option<Map<String, Value>>,
}

fn decode_part(part: &str, name: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(part)
        .map_err(|e| ExportError::Decryption(format!("{} is not base64: {}", name, e)))
}

/// Opens `"<submissionPublicKey>;<nonce>:<ciphertext>"`.
pub fn decrypt_content(key: &FormSecretKey, content: &str) -> Result<Vec<u8>> {
    let (public_key, rest) = content
        .split_once(';')
        .ok_or_else(|| ExportError::Decryption("missing public key separator".to_string()))?;
    let (nonce, ciphertext) = rest
        .split_once(':')
        .ok_or_else(|| ExportError::Decryption("missing nonce separator".to_string()))?;

    let plaintext = key.open(
        &decode_part(public_key, "public key")?,
        &decode_part(nonce, "nonce")?,
        &decode_part(ciphertext, "ciphertext")?,
    )?;

    if plaintext.is_empty() {
        return Err(ExportError::Decryption("empty plaintext".to_string()));
    }
    Ok(plaintext)
}

pub fn decrypt_submission(
    key: &FormSecretKey,
    encrypted_content: &str,
    verified_content: Option<&str>,
) -> Result<DecryptedContent> {
    let responses: Vec<DecryptedField> =
        serde_json::from_slice(&decrypt_content(key, encrypted_content)?)?;

    let verified = match verified_content.filter(|v| !v.is_empty()) {
        Some(content) => Some(serde_json::from_slice(&decrypt_content(key, content)?)?),
        None => None,
    };

    Ok(DecryptedContent {
        responses,
        verified,
    })
}

pub fn decrypt_file(key: &FormSecretKey, file: &EncryptedFile) -> Result<Vec<u8>> {
    key.open(
        &decode_part(&file.submission_public_key, "submission public key")?,
        &decode_part(&file.nonce, "nonce")?,
        &decode_part(&file.binary, "file binary")?,
    )
}
