// file: src/models/record.rs
// description: classified record returned by a decryption worker
// reference: plain owned data that crosses the worker channel boundary

use crate::models::field::DecryptedField;
use serde::Serialize;

/// Outcome of decrypting one submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordOutcome {
    Ok {
        #[serde(skip)]
        attachment: Option<Vec<u8>>,
    },
    Unverified,
    DecryptionError,
    AttachmentError,
    Unknown,
}

impl RecordOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RecordOutcome::Ok { .. } => "OK",
            RecordOutcome::Unverified => "UNVERIFIED",
            RecordOutcome::DecryptionError => "ERROR",
            RecordOutcome::AttachmentError => "ATTACHMENT_ERROR",
            RecordOutcome::Unknown => "UNKNOWN",
        }
    }
}

/// Rows handed to the CSV accumulator. `record` always starts with the status field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionData {
    pub created: String,
    pub submission_id: String,
    pub record: Vec<DecryptedField>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedRecord {
    pub submission_id: String,
    pub created: String,
    #[serde(flatten)]
    pub outcome: RecordOutcome,
    pub status_message: String,
    pub submission_data: SubmissionData,
}

impl ClassifiedRecord {
    /// Flattens fields into the row list, prepending the status field.
    pub fn materialize(
        submission_id: String,
        created: String,
        outcome: RecordOutcome,
        status_message: impl Into<String>,
        fields: Vec<DecryptedField>,
    ) -> Self {
        let status_message = status_message.into();
        let mut record = Vec::with_capacity(fields.len() + 1);
        record.push(DecryptedField::status(status_message.clone()));
        record.extend(fields);

        Self {
            submission_data: SubmissionData {
                created: created.clone(),
                submission_id: submission_id.clone(),
                record,
            },
            submission_id,
            created,
            outcome,
            status_message,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, RecordOutcome::Ok { .. })
    }

    pub fn take_attachment(&mut self) -> Option<Vec<u8>> {
        match &mut self.outcome {
            RecordOutcome::Ok { attachment } => attachment.take(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::field::STATUS_FIELD_ID;

    #[test]
    fn test_materialize_prepends_status() {
        let record = ClassifiedRecord::materialize(
            "sub1".to_string(),
            "2023-01-01T00:00:00.000Z".to_string(),
            RecordOutcome::Ok { attachment: None },
            "Success",
            vec![DecryptedField::text("f1", "Name", "Alice")],
        );

        assert!(record.is_ok());
        assert_eq!(record.submission_data.record.len(), 2);
        assert_eq!(record.submission_data.record[0].id, STATUS_FIELD_ID);
        assert_eq!(record.submission_data.record[1].id, "f1");
    }

    #[test]
    fn test_take_attachment_only_for_ok() {
        let mut ok = ClassifiedRecord::materialize(
            "sub1".to_string(),
            "c".to_string(),
            RecordOutcome::Ok { attachment: Some(vec![1, 2, 3]) },
            "Success (with Downloaded Attachment)",
            vec![],
        );
        assert_eq!(ok.take_attachment(), Some(vec![1, 2, 3]));
        assert_eq!(ok.take_attachment(), None);

        let mut failed = ClassifiedRecord::materialize(
            "sub2".to_string(),
            "c".to_string(),
            RecordOutcome::Unverified,
            "Unverified",
            vec![],
        );
        assert_eq!(failed.take_attachment(), None);
    }

    #[test]
    fn test_serializes_status_tag() {
        let record = ClassifiedRecord::materialize(
            "sub1".to_string(),
            "c".to_string(),
            RecordOutcome::DecryptionError,
            "Decryption Error",
            vec![],
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "DECRYPTION_ERROR");
        assert_eq!(json["statusMessage"], "Decryption Error");
    }
}
