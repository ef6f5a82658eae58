// file: src/crypto/mod.rs
// description: submission decryption and signature verification
// reference: internal module structure

pub mod decrypt;
pub mod signature;

pub use decrypt::{
    DecryptedContent, EncryptedFile, FormSecretKey, decrypt_content, decrypt_file,
    decrypt_submission,
};
pub use signature::{FieldSignature, SignatureVerifier};
