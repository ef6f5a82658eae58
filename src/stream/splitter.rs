// file: src/stream/splitter.rs
// description: splits a chunked byte stream into trimmed, non-empty lines
// reference: https://docs.rs/futures/latest/futures/stream/

use crate::error::Result;
use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Lazy single-pass line reader over a [`ByteStream`].
///
/// `next_line` is cancel safe: all buffered state lives on the splitter, so it can
/// be polled inside `tokio::select!` without losing data.
pub struct LineSplitter {
    source: Option<ByteStream>,
    buffer: Vec<u8>,
    pending: VecDeque<String>,
    cancel: CancellationToken,
}

impl LineSplitter {
    pub fn new(source: ByteStream, cancel: CancellationToken) -> Self {
        Self {
            source: Some(source),
            buffer: Vec::new(),
            pending: VecDeque::new(),
            cancel,
        }
    }

    pub async fn next_line(&mut self) -> Option<Result<String>> {
        loop {
            if self.cancel.is_cancelled() {
                self.abort();
                return None;
            }
            if let Some(line) = self.pending.pop_front() {
                return Some(Ok(line));
            }

            let source = self.source.as_mut()?;
            let cancel = &self.cancel;
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                chunk = source.next() => Some(chunk),
            };

            match next {
                None => {
                    self.abort();
                    return None;
                }
                Some(Some(Ok(chunk))) => self.push_chunk(&chunk),
                Some(Some(Err(e))) => {
                    self.abort();
                    return Some(Err(e));
                }
                Some(None) => {
                    self.source = None;
                    let rest = std::mem::take(&mut self.buffer);
                    return decode_line(&rest).map(Ok);
                }
            }
        }
    }

    /// Drops the source stream and any buffered text. Further calls yield nothing.
    pub fn abort(&mut self) {
        if self.source.take().is_some() {
            debug!("Submission stream closed before end");
        }
        self.buffer.clear();
        self.pending.clear();
    }

    pub fn is_finished(&self) -> bool {
        self.source.is_none() && self.pending.is_empty()
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<String>> {
        futures::stream::unfold(self, |mut splitter| async move {
            splitter.next_line().await.map(|line| (line, splitter))
        })
    }

    fn push_chunk(&mut self, chunk: &[u8]) {
        let mut start = 0;
        for (idx, _) in chunk.iter().enumerate().filter(|(_, b)| **b == b'\n') {
            self.buffer.extend_from_slice(&chunk[start..idx]);
            let segment = std::mem::take(&mut self.buffer);
            if let Some(line) = decode_line(&segment) {
                self.pending.push_back(line);
            }
            start = idx + 1;
        }
        self.buffer.extend_from_slice(&chunk[start..]);
    }
}

fn decode_line(segment: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(segment);
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
