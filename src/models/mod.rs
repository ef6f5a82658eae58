// file: src/models/mod.rs
// description: data models module exports
// reference: internal module structure

pub mod envelope;
pub mod field;
pub mod record;

pub use envelope::SubmissionEnvelope;
pub use field::{AnswerArray, DecryptedField, STATUS_FIELD_ID, STATUS_FIELD_QUESTION};
pub use record::{ClassifiedRecord, RecordOutcome, SubmissionData};
