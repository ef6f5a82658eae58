// file: src/worker/decrypt.rs
// description: per-line decryption, verification and attachment bundling
// reference: https://docs.rs/crypto_box

use crate::crypto::decrypt_submission;
use crate::error::ExportError;
use crate::models::{ClassifiedRecord, DecryptedField, RecordOutcome, SubmissionEnvelope};
use crate::utils::{Validator, epoch_millis};
use crate::worker::attachments::{AttachmentFetcher, attachment_refs, download_archive};
use crate::worker::{LineData, WorkerContext};
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

pub const STATUS_SUCCESS: &str = "Success";
pub const STATUS_SUCCESS_WITH_ATTACHMENT: &str = "Success (with Downloaded Attachment)";
pub const STATUS_UNVERIFIED: &str = "Unverified";
pub const STATUS_DECRYPTION_ERROR: &str = "Decryption Error";
pub const STATUS_ATTACHMENT_ERROR: &str = "Attachment Download Error";
pub const STATUS_PARSE_ERROR: &str = "Error";

/// Id given to records whose envelope could not be parsed.
pub const UNPARSEABLE_ID: &str = "ERROR";

fn verified_label(key: &str) -> String {
    match key {
        "uinFin" => "SingPass Validated NRIC".to_string(),
        "cpUen" => "CorpPass Validated UEN".to_string(),
        "cpUid" => "CorpPass Validated UID".to_string(),
        "sgidUinFin" => "SGID Validated NRIC".to_string(),
        other => format!("Verified {}", other),
    }
}

fn verified_fields(verified: Map<String, Value>) -> Vec<DecryptedField> {
    verified
        .into_iter()
        .filter_map(|(key, value)| {
            let answer = match value {
                Value::Null => return None,
                Value::String(s) => s,
                other => other.to_string(),
            };
            let label = verified_label(&key);
            Some(DecryptedField::text(key, label, answer))
        })
        .collect()
}

/// Runs the full worker algorithm for one ndjson line. Failures become classified
/// records; this never returns an error.
pub async fn decrypt_into_csv(
    data: &LineData,
    ctx: &WorkerContext,
    fetcher: Option<&dyn AttachmentFetcher>,
    archive_queue: &Semaphore,
) -> ClassifiedRecord {
    let envelope = match SubmissionEnvelope::parse(&data.line) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(
                "Could not parse submission line {}: {}",
                Validator::truncate_text(&data.line, 64),
                e
            );
            return ClassifiedRecord::materialize(
                UNPARSEABLE_ID.to_string(),
                Utc::now().to_rfc3339(),
                RecordOutcome::DecryptionError,
                STATUS_PARSE_ERROR,
                Vec::new(),
            );
        }
    };

    let content = match decrypt_submission(
        &ctx.secret_key,
        &envelope.encrypted_content,
        envelope.verified_content.as_deref(),
    ) {
        Ok(content) => content,
        Err(e) => {
            warn!("Submission {} could not be decrypted: {}", envelope.id, e);
            return ClassifiedRecord::materialize(
                envelope.id,
                envelope.created,
                RecordOutcome::DecryptionError,
                STATUS_DECRYPTION_ERROR,
                Vec::new(),
            );
        }
    };

    let mut fields = content.responses;
    let created_ms = epoch_millis(&envelope.created).unwrap_or_default();
    if !ctx.verifier.verify_fields(&fields, created_ms, &data.form_id) {
        warn!("Submission {} has unverified signatures", envelope.id);
        // unauthenticated answers never leave the worker
        return ClassifiedRecord::materialize(
            envelope.id,
            envelope.created,
            RecordOutcome::Unverified,
            STATUS_UNVERIFIED,
            Vec::new(),
        );
    }
    if let Some(extra) = content.verified {
        fields.extend(verified_fields(extra));
    }

    if !data.download_attachments {
        return ClassifiedRecord::materialize(
            envelope.id,
            envelope.created,
            RecordOutcome::Ok { attachment: None },
            STATUS_SUCCESS,
            fields,
        );
    }

    let refs = attachment_refs(&fields, &envelope.attachment_metadata, &data.host_origin);
    if refs.is_empty() {
        return ClassifiedRecord::materialize(
            envelope.id,
            envelope.created,
            RecordOutcome::Ok { attachment: None },
            STATUS_SUCCESS,
            fields,
        );
    }

    let archive = match fetcher {
        Some(fetcher) => {
            download_archive(&refs, &ctx.secret_key, fetcher, archive_queue).await
        }
        None => Err(ExportError::Attachment(
            "no attachment fetcher available".to_string(),
        )),
    };

    match archive {
        Ok(archive) => {
            debug!(
                "Bundled {} attachments for submission {}",
                refs.len(),
                envelope.id
            );
            ClassifiedRecord::materialize(
                envelope.id,
                envelope.created,
                RecordOutcome::Ok {
                    attachment: Some(archive),
                },
                STATUS_SUCCESS_WITH_ATTACHMENT,
                fields,
            )
        }
        Err(e) => {
            warn!("Attachments for submission {} failed: {}", envelope.id, e);
            ClassifiedRecord::materialize(
                envelope.id,
                envelope.created,
                RecordOutcome::AttachmentError,
                STATUS_ATTACHMENT_ERROR,
                fields,
            )
        }
    }
}
