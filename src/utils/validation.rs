// file: src/utils/validation.rs
// description: validation of export inputs supplied on the command line
// reference: input validation patterns

use crate::error::{ExportError, Result};
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

lazy_static! {
    static ref FORM_ID: Regex = Regex::new(r"^[0-9a-fA-F]{24}$").unwrap();
    static ref UNSAFE_FILENAME_CHARS: Regex = Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).unwrap();
}

pub struct Validator;

impl Validator {
    pub fn validate_form_id(form_id: &str) -> Result<()> {
        if !FORM_ID.is_match(form_id) {
            return Err(ExportError::Validation(format!(
                "Form id must be a 24 character hex string: {}",
                form_id
            )));
        }
        Ok(())
    }

    pub fn validate_url(url: &str) -> Result<()> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ExportError::Validation(format!(
                "Invalid URL format: {}",
                url
            )));
        }
        Ok(())
    }

    /// Accepts `YYYY-MM-DD`, the format of the download endpoint's date filters.
    pub fn validate_date(date: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
            ExportError::Validation(format!("Date must be formatted YYYY-MM-DD: {}", date))
        })
    }

    pub fn validate_date_range(start: Option<&str>, end: Option<&str>) -> Result<()> {
        match (start, end) {
            (Some(start), Some(end)) => {
                if Self::validate_date(start)? > Self::validate_date(end)? {
                    return Err(ExportError::Validation(format!(
                        "Start date {} is after end date {}",
                        start, end
                    )));
                }
                Ok(())
            }
            (None, None) => Ok(()),
            _ => Err(ExportError::Validation(
                "Both start and end date are required for a date range".to_string(),
            )),
        }
    }

    pub fn validate_file_path(path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(ExportError::Validation(format!(
                "Path is not a file: {}",
                path.display()
            )));
        }
        Ok(())
    }

    pub fn sanitize_filename(name: &str) -> String {
        let cleaned = UNSAFE_FILENAME_CHARS.replace_all(name.trim(), "_");
        if cleaned.is_empty() {
            "export".to_string()
        } else {
            cleaned.into_owned()
        }
    }

    pub fn truncate_text(text: &str, max_length: usize) -> String {
        match text.char_indices().nth(max_length) {
            Some((idx, _)) => format!("{}...", &text[..idx]),
            None => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_validate_form_id() {
        assert!(Validator::validate_form_id("5f1a2b3c4d5e6f7a8b9c0d1e").is_ok());
        assert!(Validator::validate_form_id("short").is_err());
        assert!(Validator::validate_form_id("zzzzzzzzzzzzzzzzzzzzzzzz").is_err());
    }

    #[test]
    fn test_validate_url() {
        assert!(Validator::validate_url("https://example.com").is_ok());
        assert!(Validator::validate_url("example.com").is_err());
    }

    #[test]
    fn test_validate_date_range() {
        assert!(Validator::validate_date_range(None, None).is_ok());
        assert!(Validator::validate_date_range(Some("2023-01-01"), Some("2023-02-01")).is_ok());
        assert!(Validator::validate_date_range(Some("2023-03-01"), Some("2023-02-01")).is_err());
        assert!(Validator::validate_date_range(Some("2023-01-01"), None).is_err());
        assert!(Validator::validate_date("01/02/2023").is_err());
    }

    #[test]
    fn test_validate_file_path() {
        let file = NamedTempFile::new().unwrap();
        assert!(Validator::validate_file_path(file.path()).is_ok());
        assert!(Validator::validate_file_path(Path::new("/nonexistent/file.ndjson")).is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(Validator::sanitize_filename("Survey: 2023/24"), "Survey_ 2023_24");
        assert_eq!(Validator::sanitize_filename("  "), "export");
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(Validator::truncate_text("short", 10), "short");
        assert_eq!(
            Validator::truncate_text("this is a very long text", 10),
            "this is a ..."
        );
    }
}
