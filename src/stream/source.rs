// file: src/stream/source.rs
// description: submission sources, the admin submissions api and local ndjson files
// reference: https://docs.rs/reqwest/latest/reqwest/struct.Response.html#method.bytes_stream

use crate::config::ApiConfig;
use crate::error::{ExportError, Result};
use crate::stream::splitter::ByteStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, RequestBuilder};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

/// Byte stream of ndjson envelopes plus the count announced for it.
pub struct SubmissionSource {
    pub expected_count: u64,
    pub bytes: ByteStream,
}

impl std::fmt::Debug for SubmissionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionSource")
            .field("expected_count", &self.expected_count)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DownloadParams {
    pub form_id: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub download_attachments: bool,
}

impl DownloadParams {
    fn date_query(&self) -> Vec<(&'static str, String)> {
        match (&self.start_date, &self.end_date) {
            (Some(start), Some(end)) => vec![("startDate", start.clone()), ("endDate", end.clone())],
            _ => Vec::new(),
        }
    }
}

pub struct SubmissionsClient {
    client: Client,
    base_url: String,
    session_cookie: Option<String>,
    request_timeout: Duration,
}

impl SubmissionsClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let request_timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .connect_timeout(request_timeout)
            .build()
            .map_err(|e| ExportError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session_cookie: config.session_cookie.clone(),
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, form_id: &str, action: &str) -> String {
        format!(
            "{}/api/v3/admin/forms/{}/submissions/{}",
            self.base_url, form_id, action
        )
    }

    fn with_session(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.session_cookie {
            Some(cookie) => request.header(reqwest::header::COOKIE, cookie),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = self
            .with_session(request)
            .send()
            .await
            .map_err(|e| ExportError::Network(format!("Failed to reach submissions API: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ExportError::Network(format!(
                "Submissions API request failed with status {}: {}",
                status, error_text
            )));
        }
        Ok(response)
    }

    pub async fn count(&self, params: &DownloadParams) -> Result<u64> {
        let request = self
            .client
            .get(self.endpoint(&params.form_id, "count"))
            .query(&params.date_query())
            .timeout(self.request_timeout);

        let count: u64 = self.send(request).await?.json().await.map_err(|e| {
            ExportError::Network(format!("Failed to parse submission count: {}", e))
        })?;

        debug!("Form {} has {} submissions", params.form_id, count);
        Ok(count)
    }

    pub async fn download(&self, params: &DownloadParams) -> Result<ByteStream> {
        let mut query = params.date_query();
        if params.download_attachments {
            query.push(("downloadAttachments", "true".to_string()));
        }

        let request = self
            .client
            .get(self.endpoint(&params.form_id, "download"))
            .query(&query);
        let response = self.send(request).await?;

        Ok(response
            .bytes_stream()
            .map_err(|e| ExportError::StreamInterrupted(e.to_string()))
            .boxed())
    }

    /// Fetches the expected count once, then opens the download stream.
    pub async fn open(&self, params: &DownloadParams) -> Result<SubmissionSource> {
        let expected_count = self.count(params).await?;
        info!("Expecting {} responses for form {}", expected_count, params.form_id);

        let bytes = if expected_count == 0 {
            futures::stream::empty().boxed()
        } else {
            self.download(params).await?
        };

        Ok(SubmissionSource {
            expected_count,
            bytes,
        })
    }
}

/// Opens a local ndjson export. The expected count is its number of non-empty lines.
pub async fn open_file(path: &Path) -> Result<SubmissionSource> {
    let file = tokio::fs::File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut expected_count = 0u64;
    while let Some(line) = lines.next_line().await? {
        if !line.trim().is_empty() {
            expected_count += 1;
        }
    }

    let file = tokio::fs::File::open(path).await?;
    let bytes = ReaderStream::new(file)
        .map_err(|e| ExportError::StreamInterrupted(e.to_string()))
        .boxed();

    debug!("Opened {} with {} envelopes", path.display(), expected_count);
    Ok(SubmissionSource {
        expected_count,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::LineSplitter;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tokio_util::sync::CancellationToken;

    fn api_config(base_url: &str) -> ApiConfig {
        ApiConfig {
            base_url: base_url.to_string(),
            timeout_secs: 5,
            session_cookie: None,
        }
    }

    #[test]
    fn test_endpoint_urls() {
        let client = SubmissionsClient::new(&api_config("https://form.example.com/")).unwrap();
        assert_eq!(client.base_url(), "https://form.example.com");
        assert_eq!(
            client.endpoint("abc", "count"),
            "https://form.example.com/api/v3/admin/forms/abc/submissions/count"
        );
    }

    #[test]
    fn test_date_query_requires_both_bounds() {
        let mut params = DownloadParams {
            form_id: "abc".to_string(),
            start_date: Some("2023-01-01".to_string()),
            ..Default::default()
        };
        assert!(params.date_query().is_empty());

        params.end_date = Some("2023-01-31".to_string());
        assert_eq!(params.date_query().len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_api_is_network_error() {
        let client = SubmissionsClient::new(&api_config("http://127.0.0.1:1")).unwrap();
        let params = DownloadParams {
            form_id: "abc".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            client.count(&params).await,
            Err(ExportError::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_open_file_counts_and_streams_lines() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{\"a\":1}}\n\n{{\"a\":2}}\n  \n{{\"a\":3}}").unwrap();

        let source = open_file(file.path()).await.unwrap();
        assert_eq!(source.expected_count, 3);

        let lines: Vec<String> = LineSplitter::new(source.bytes, CancellationToken::new())
            .into_stream()
            .map(|l| l.unwrap())
            .collect()
            .await;
        assert_eq!(lines.len(), 3);
    }
}
