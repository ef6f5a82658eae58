// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod config;
pub mod crypto;
pub mod error;
pub mod exporter;
pub mod models;
pub mod pipeline;
pub mod stream;
pub mod utils;
pub mod worker;

#[cfg(test)]
mod testing;

pub use config::{ApiConfig, Config, ExportConfig, VerificationConfig};
pub use crypto::{FormSecretKey, SignatureVerifier};
pub use error::{ExportError, Result};
pub use exporter::{AttachmentThrottler, CsvAccumulator, CsvDocument};
pub use models::{ClassifiedRecord, DecryptedField, RecordOutcome, SubmissionData};
pub use pipeline::{
    ExportOrchestrator, ExportRequest, ExportResult, ExportSummary, ProgressTracker, TerminalState,
};
pub use stream::{DownloadParams, SubmissionSource, SubmissionsClient, open_file};
pub use utils::{ReferenceZone, Validator};
pub use worker::{FileSecretKey, LineData, SecretKeyProvider, StaticSecretKey, WorkerContext};

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[test]
    fn test_library_exports() {
        let config = Config::default_config();
        assert_ok!(ReferenceZone::from_hours(config.export.timezone_offset_hours));
        assert_ok!(SignatureVerifier::new(
            None,
            config.verification.transaction_expiry_secs
        ));
    }

    #[test]
    fn test_secret_key_round_trip() {
        let keys = testing::FormKeys::generate();
        let provider = StaticSecretKey::new(keys.secret_b64.clone());
        let secret = assert_ok!(provider.secret_key());
        let key = assert_ok!(FormSecretKey::from_base64(&secret));
        assert_eq!(key.public_key_base64(), keys.secret().public_key_base64());
    }
}
