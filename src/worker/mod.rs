// file: src/worker/mod.rs
// description: isolated decryption workers and the pool that schedules them
// reference: internal module structure

pub mod attachments;
pub mod decrypt;
pub mod handle;
pub mod pool;

use crate::crypto::{FormSecretKey, SignatureVerifier};
use crate::error::{ExportError, Result};
use crate::utils::ReferenceZone;
use std::path::PathBuf;
use std::sync::Arc;
use zeroize::Zeroizing;

pub use attachments::{AttachmentFetcher, FetcherFactory, HttpAttachmentFetcher};
pub use decrypt::decrypt_into_csv;
pub use handle::WorkerHandle;
pub use pool::WorkerPool;

/// Supplies the form secret key once per export.
pub trait SecretKeyProvider: Send + Sync {
    fn secret_key(&self) -> Result<Zeroizing<String>>;
}

/// Key given directly, e.g. from an environment variable.
pub struct StaticSecretKey(Zeroizing<String>);

impl StaticSecretKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(Zeroizing::new(key.into()))
    }
}

impl SecretKeyProvider for StaticSecretKey {
    fn secret_key(&self) -> Result<Zeroizing<String>> {
        Ok(self.0.clone())
    }
}

/// Key read from a file on every request.
pub struct FileSecretKey(pub PathBuf);

impl SecretKeyProvider for FileSecretKey {
    fn secret_key(&self) -> Result<Zeroizing<String>> {
        let content = Zeroizing::new(std::fs::read_to_string(&self.0)?);
        let key = content.trim();
        if key.is_empty() {
            return Err(ExportError::Validation(format!(
                "Secret key file {} is empty",
                self.0.display()
            )));
        }
        Ok(Zeroizing::new(key.to_string()))
    }
}

/// One unit of work for a decryption worker.
#[derive(Clone)]
pub struct LineData {
    pub line: String,
    pub form_id: String,
    pub download_attachments: bool,
    /// Origin used to resolve relative attachment urls.
    pub host_origin: String,
}

impl std::fmt::Debug for LineData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineData")
            .field("line_len", &self.line.len())
            .field("form_id", &self.form_id)
            .field("download_attachments", &self.download_attachments)
            .field("host_origin", &self.host_origin)
            .finish()
    }
}

/// Shared, read-only state handed to every worker at spawn time.
pub struct WorkerContext {
    pub secret_key: FormSecretKey,
    pub verifier: SignatureVerifier,
    pub zone: ReferenceZone,
    pub fetcher_factory: FetcherFactory,
}

impl WorkerContext {
    pub fn new(
        secret_key: FormSecretKey,
        verifier: SignatureVerifier,
        zone: ReferenceZone,
        fetcher_factory: FetcherFactory,
    ) -> Arc<Self> {
        Arc::new(Self {
            secret_key,
            verifier,
            zone,
            fetcher_factory,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_file_secret_key_trimmed() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "  c2VjcmV0  ").unwrap();
        let key = FileSecretKey(file.path().to_path_buf()).secret_key().unwrap();
        assert_eq!(key.as_str(), "c2VjcmV0");
    }

    #[test]
    fn test_empty_key_file_rejected() {
        let file = NamedTempFile::new().unwrap();
        assert!(FileSecretKey(file.path().to_path_buf()).secret_key().is_err());
    }

    #[test]
    fn test_line_data_debug_hides_content() {
        let data = LineData {
            line: "{\"encryptedContent\":\"secret\"}".to_string(),
            form_id: "f".to_string(),
            download_attachments: false,
            host_origin: "https://example.com".to_string(),
        };
        assert!(!format!("{:?}", data).contains("secret"));
    }
}
