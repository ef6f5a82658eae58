// file: src/models/field.rs
// description: decrypted form field as produced by submission decryption
// reference: form response payload shape

use serde::{Deserialize, Serialize};

/// Field id of the synthetic status column injected into every record.
pub const STATUS_FIELD_ID: &str = "000000000000000000000000";
pub const STATUS_FIELD_QUESTION: &str = "Download Status";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerArray {
    Table(Vec<Vec<String>>),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptedField {
    #[serde(rename = "_id")]
    pub id: String,
    pub field_type: String,
    #[serde(default)]
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_array: Option<AnswerArray>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_header: bool,
}

impl DecryptedField {
    pub fn text(id: impl Into<String>, question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            field_type: "textfield".to_string(),
            question: question.into(),
            answer: Some(answer.into()),
            answer_array: None,
            signature: None,
            is_header: false,
        }
    }

    /// The leading "Download Status" cell carried by every record.
    pub fn status(message: impl Into<String>) -> Self {
        Self::text(STATUS_FIELD_ID, STATUS_FIELD_QUESTION, message)
    }

    pub fn is_section(&self) -> bool {
        self.is_header || self.field_type == "section"
    }
}
