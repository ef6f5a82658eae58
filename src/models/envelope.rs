// file: src/models/envelope.rs
// description: encrypted submission envelope as streamed by the submissions api
// reference: newline-delimited json download endpoint

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One line of the NDJSON download stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionEnvelope {
    #[serde(rename = "_id")]
    pub id: String,
    pub created: String,
    pub encrypted_content: String,
    #[serde(default)]
    pub verified_content: Option<String>,
    #[serde(default)]
    pub version: u32,
    /// Field id to presigned attachment URL.
    #[serde(default)]
    pub attachment_metadata: HashMap<String, String>,
}

impl SubmissionEnvelope {
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachment_metadata.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_envelope() {
        let line = r#"{"_id":"abc","created":"2023-01-05T10:00:00.000Z","encryptedContent":"a;b:c","verifiedContent":"d;e:f","version":1,"attachmentMetadata":{"f1":"https://bucket/x"}}"#;
        let envelope = SubmissionEnvelope::parse(line).unwrap();

        assert_eq!(envelope.id, "abc");
        assert_eq!(envelope.version, 1);
        assert_eq!(envelope.verified_content.as_deref(), Some("d;e:f"));
        assert!(envelope.has_attachments());
    }

    #[test]
    fn test_optional_fields_default() {
        let line = r#"{"_id":"abc","created":"2023-01-05T10:00:00.000Z","encryptedContent":"a;b:c"}"#;
        let envelope = SubmissionEnvelope::parse(line).unwrap();

        assert!(envelope.verified_content.is_none());
        assert_eq!(envelope.version, 0);
        assert!(!envelope.has_attachments());
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let line = r#"{"_id":"abc","encryptedContent":"a;b:c"}"#;
        assert!(SubmissionEnvelope::parse(line).is_err());
    }
}
