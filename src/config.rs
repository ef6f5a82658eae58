// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{ExportError, Result};
use crate::exporter::SUMMARY_ROWS;
use crate::utils::Validator;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub api: ApiConfig,
    pub export: ExportConfig,
    pub verification: VerificationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    #[serde(default)]
    pub session_cookie: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
    #[serde(default)]
    pub worker_count: Option<usize>,
    pub attachment_convoy_size: usize,
    pub attachment_convoy_interval_ms: u64,
    pub metadata_rows: usize,
    pub timezone_offset_hours: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerificationConfig {
    #[serde(default)]
    pub public_key: Option<String>,
    pub transaction_expiry_secs: u64,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(config::File::from(Path::new("config/default.toml")));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SUBMISSION_EXPORT")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| ExportError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| ExportError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            api: ApiConfig {
                base_url: "https://form.gov.sg".to_string(),
                timeout_secs: 300,
                session_cookie: None,
            },
            export: ExportConfig {
                output_dir: PathBuf::from("./exports"),
                worker_count: None,
                attachment_convoy_size: 5,
                attachment_convoy_interval_ms: 1000,
                metadata_rows: 5,
                timezone_offset_hours: 8,
            },
            verification: VerificationConfig {
                public_key: None,
                transaction_expiry_secs: 14_400,
            },
        }
    }

    fn validate(&self) -> Result<()> {
        Validator::validate_url(&self.api.base_url)
            .map_err(|e| ExportError::Config(e.to_string()))?;

        if self.export.worker_count == Some(0) {
            return Err(ExportError::Config(
                "worker_count must be greater than 0".to_string(),
            ));
        }

        if self.export.attachment_convoy_size == 0 {
            return Err(ExportError::Config(
                "attachment_convoy_size must be greater than 0".to_string(),
            ));
        }

        if self.export.attachment_convoy_interval_ms == 0 {
            return Err(ExportError::Config(
                "attachment_convoy_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.export.metadata_rows < SUMMARY_ROWS {
            return Err(ExportError::Config(format!(
                "metadata_rows must be at least {}, got {}",
                SUMMARY_ROWS, self.export.metadata_rows
            )));
        }

        if !(-12..=14).contains(&self.export.timezone_offset_hours) {
            return Err(ExportError::Config(format!(
                "timezone_offset_hours out of range: {}",
                self.export.timezone_offset_hours
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.export.attachment_convoy_size, 5);
        assert_eq!(config.export.metadata_rows, 5);
    }

    #[test]
    fn test_zero_worker_override_rejected() {
        let mut config = Config::default_config();
        config.export.worker_count = Some(0);
        assert!(matches!(config.validate(), Err(ExportError::Config(_))));
    }

    #[test]
    fn test_metadata_rows_below_summary_rejected() {
        let mut config = Config::default_config();
        config.export.metadata_rows = 4;
        assert!(matches!(config.validate(), Err(ExportError::Config(_))));

        config.export.metadata_rows = 7;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
[api]
base_url = "http://localhost:5000"
timeout_secs = 30

[export]
output_dir = "./out"
worker_count = 2
attachment_convoy_size = 5
attachment_convoy_interval_ms = 1000
metadata_rows = 5
timezone_offset_hours = 8

[verification]
transaction_expiry_secs = 14400
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:5000");
        assert_eq!(config.export.worker_count, Some(2));
        assert!(config.verification.public_key.is_none());
    }
}
