// file: src/worker/pool.rs
// description: fixed set of decryption workers scheduled through an idle queue
// reference: https://docs.rs/futures/latest/futures/stream/struct.FuturesUnordered.html

use crate::error::{ExportError, Result};
use crate::models::ClassifiedRecord;
use crate::worker::handle::WorkerHandle;
use crate::worker::{LineData, WorkerContext};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const DEFAULT_WORKER_COUNT: usize = 4;

type Settled = (usize, Result<ClassifiedRecord>);

pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
    idle: VecDeque<usize>,
    in_flight: FuturesUnordered<BoxFuture<'static, Settled>>,
    torn_down: bool,
}

impl WorkerPool {
    /// Detected parallelism (4 if unknown), or the override. Always 1 with attachments.
    pub fn worker_count(download_attachments: bool, configured: Option<usize>) -> usize {
        if download_attachments {
            return 1;
        }
        configured.filter(|n| *n > 0).unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(DEFAULT_WORKER_COUNT)
        })
    }

    pub fn spawn(size: usize, ctx: Arc<WorkerContext>, cancel: &CancellationToken) -> Result<Self> {
        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            workers.push(WorkerHandle::spawn(id, Arc::clone(&ctx), cancel)?);
        }
        info!("Started {} decryption workers", workers.len());

        Ok(Self {
            idle: (0..workers.len()).collect(),
            workers,
            in_flight: FuturesUnordered::new(),
            torn_down: false,
        })
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn has_idle(&self) -> bool {
        !self.torn_down && !self.idle.is_empty()
    }

    pub fn has_in_flight(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Hands the line to the next idle worker.
    pub fn dispatch(&mut self, data: LineData) -> Result<()> {
        let index = self
            .idle
            .pop_front()
            .filter(|_| !self.torn_down)
            .ok_or_else(|| ExportError::WorkerUnavailable("no idle worker".to_string()))?;

        let task = self.workers[index].decrypt_into_csv(data);
        self.in_flight
            .push(async move { (index, task.await) }.boxed());
        Ok(())
    }

    /// Waits for any in-flight task. The worker goes back on the idle queue.
    /// Cancel safe; returns `None` when nothing is in flight.
    pub async fn next_settled(&mut self) -> Option<Result<ClassifiedRecord>> {
        let (index, result) = self.in_flight.next().await?;
        if !self.torn_down {
            self.idle.push_back(index);
        }
        Some(result)
    }

    /// Stops every worker and discards in-flight results. Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        let discarded = self.in_flight.len();
        self.in_flight = FuturesUnordered::new();
        self.idle.clear();
        for worker in &mut self.workers {
            worker.cleanup();
        }
        debug!(
            "Worker pool torn down ({} workers, {} in-flight results discarded)",
            self.workers.len(),
            discarded
        );
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SignatureVerifier;
    use crate::testing::{FormKeys, envelope_line, text_fields};
    use crate::utils::ReferenceZone;
    use crate::worker::attachments::AttachmentFetcher;

    fn context(keys: &FormKeys) -> Arc<WorkerContext> {
        WorkerContext::new(
            keys.secret(),
            SignatureVerifier::new(None, 14400).unwrap(),
            ReferenceZone::default(),
            Arc::new(|| -> Result<Box<dyn AttachmentFetcher>> {
                Err(ExportError::Attachment("offline".to_string()))
            }),
        )
    }

    fn line(keys: &FormKeys, id: &str) -> LineData {
        LineData {
            line: envelope_line(keys, id, "2023-01-01T00:00:00Z", &text_fields(&[("f1", "Q", "A")])),
            form_id: "form".to_string(),
            download_attachments: false,
            host_origin: String::new(),
        }
    }

    #[test]
    fn test_worker_count() {
        assert_eq!(WorkerPool::worker_count(true, Some(8)), 1);
        assert_eq!(WorkerPool::worker_count(false, Some(3)), 3);
        assert!(WorkerPool::worker_count(false, None) >= 1);
        assert!(WorkerPool::worker_count(false, Some(0)) >= 1);
    }

    #[tokio::test]
    async fn test_dispatch_uses_idle_workers_only() {
        let keys = FormKeys::generate();
        let mut pool = WorkerPool::spawn(2, context(&keys), &CancellationToken::new()).unwrap();

        pool.dispatch(line(&keys, "a")).unwrap();
        pool.dispatch(line(&keys, "b")).unwrap();
        assert!(!pool.has_idle());
        assert!(matches!(
            pool.dispatch(line(&keys, "c")),
            Err(ExportError::WorkerUnavailable(_))
        ));

        let mut ids = Vec::new();
        while let Some(result) = pool.next_settled().await {
            ids.push(result.unwrap().submission_id);
        }
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(pool.has_idle());
    }

    #[tokio::test]
    async fn test_teardown_idempotent_and_safe_when_empty() {
        let keys = FormKeys::generate();
        let mut empty = WorkerPool::spawn(0, context(&keys), &CancellationToken::new()).unwrap();
        empty.teardown();
        empty.teardown();
        assert!(empty.is_empty());

        let mut pool = WorkerPool::spawn(1, context(&keys), &CancellationToken::new()).unwrap();
        pool.dispatch(line(&keys, "a")).unwrap();
        pool.teardown();
        assert!(pool.is_torn_down());
        assert!(!pool.has_in_flight());
        assert!(!pool.has_idle());
        assert!(pool.next_settled().await.is_none());
        pool.teardown();
    }
}
