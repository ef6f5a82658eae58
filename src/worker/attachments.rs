// file: src/worker/attachments.rs
// description: attachment download, decryption and zip bundling for one submission
// reference: https://docs.rs/zip

use crate::crypto::{EncryptedFile, FormSecretKey, decrypt_file};
use crate::error::{ExportError, Result};
use crate::models::{AnswerArray, DecryptedField};
use futures::future::{BoxFuture, FutureExt, try_join_all};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;
use zip::write::SimpleFileOptions;

/// Retrieves the encrypted payload behind an attachment url.
pub trait AttachmentFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<EncryptedFile>>;
}

/// Builds a fetcher inside the worker that will use it.
pub type FetcherFactory = Arc<dyn Fn() -> Result<Box<dyn AttachmentFetcher>> + Send + Sync>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachmentPayload {
    encrypted_file: EncryptedFile,
}

pub struct HttpAttachmentFetcher {
    client: Client,
}

impl HttpAttachmentFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExportError::Attachment(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn factory(timeout: Duration) -> FetcherFactory {
        Arc::new(move || {
            Self::new(timeout).map(|fetcher| Box::new(fetcher) as Box<dyn AttachmentFetcher>)
        })
    }
}

impl AttachmentFetcher for HttpAttachmentFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<EncryptedFile>> {
        async move {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| ExportError::Attachment(format!("Request failed: {}", e)))?;

            if !response.status().is_success() {
                return Err(ExportError::Attachment(format!(
                    "Attachment request failed with status {}",
                    response.status()
                )));
            }

            let payload: AttachmentPayload = response
                .json()
                .await
                .map_err(|e| ExportError::Attachment(format!("Invalid attachment payload: {}", e)))?;
            Ok(payload.encrypted_file)
        }
        .boxed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    pub question_number: usize,
    pub url: String,
    pub filename: String,
}

impl AttachmentRef {
    pub fn entry_name(&self) -> String {
        format!("Question {} - {}", self.question_number, self.filename)
    }
}

fn resolve_url(url: &str, host_origin: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!(
            "{}/{}",
            host_origin.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }
}

fn attachment_filename(field: &DecryptedField) -> String {
    match (&field.answer, &field.answer_array) {
        (Some(answer), _) if !answer.is_empty() => answer.clone(),
        (_, Some(AnswerArray::List(items))) => items.join(","),
        (_, Some(AnswerArray::Table(rows))) => rows.concat().join(","),
        _ => String::new(),
    }
}

/// Maps attachment metadata onto question numbers. Sections are not numbered.
pub fn attachment_refs(
    fields: &[DecryptedField],
    metadata: &HashMap<String, String>,
    host_origin: &str,
) -> Vec<AttachmentRef> {
    let mut question_number = 0;
    let mut refs = Vec::new();
    for field in fields {
        if !field.is_section() {
            question_number += 1;
        }
        if let Some(url) = metadata.get(&field.id).filter(|u| !u.is_empty()) {
            refs.push(AttachmentRef {
                question_number,
                url: resolve_url(url, host_origin),
                filename: attachment_filename(field),
            });
        }
    }
    refs
}

async fn download_one(
    attachment: &AttachmentRef,
    key: &FormSecretKey,
    fetcher: &dyn AttachmentFetcher,
) -> Result<(String, Vec<u8>)> {
    let encrypted = fetcher.fetch(&attachment.url).await?;
    let content = decrypt_file(key, &encrypted)
        .map_err(|e| ExportError::Attachment(format!("{}: {}", attachment.filename, e)))?;
    Ok((attachment.entry_name(), content))
}

/// Downloads every attachment and zips them. Archive jobs queue on `archive_queue`.
pub async fn download_archive(
    refs: &[AttachmentRef],
    key: &FormSecretKey,
    fetcher: &dyn AttachmentFetcher,
    archive_queue: &Semaphore,
) -> Result<Vec<u8>> {
    let _slot = archive_queue
        .acquire()
        .await
        .map_err(|_| ExportError::Attachment("archive queue closed".to_string()))?;

    let files = try_join_all(refs.iter().map(|r| download_one(r, key, fetcher))).await?;
    debug!("Bundling {} attachments", files.len());

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in files {
        writer
            .start_file(name, options)
            .map_err(|e| ExportError::Attachment(e.to_string()))?;
        writer.write_all(&content)?;
    }
    let cursor = writer
        .finish()
        .map_err(|e| ExportError::Attachment(e.to_string()))?;
    Ok(cursor.into_inner())
}
