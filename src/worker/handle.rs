// file: src/worker/handle.rs
// description: one decryption worker on its own os thread and tokio runtime
// reference: https://docs.rs/tokio/latest/tokio/runtime/struct.Builder.html

use crate::error::{ExportError, Result};
use crate::models::ClassifiedRecord;
use crate::worker::decrypt::decrypt_into_csv;
use crate::worker::{LineData, WorkerContext};
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

struct Job {
    data: LineData,
    reply: oneshot::Sender<ClassifiedRecord>,
}

/// Opaque reference to a running worker. Communication is by message only.
pub struct WorkerHandle {
    id: usize,
    sender: Option<mpsc::Sender<Job>>,
    thread: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl WorkerHandle {
    pub fn spawn(id: usize, ctx: Arc<WorkerContext>, parent: &CancellationToken) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>(1);
        let cancel = parent.child_token();
        let worker_cancel = cancel.clone();

        let thread = std::thread::Builder::new()
            .name(format!("decrypt-worker-{}", id))
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Worker {} could not start its runtime: {}", id, e);
                        return;
                    }
                };
                runtime.block_on(run(id, receiver, ctx, worker_cancel));
            })?;

        debug!("Spawned decryption worker {}", id);
        Ok(Self {
            id,
            sender: Some(sender),
            thread: Some(thread),
            cancel,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.sender.is_some() && self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Sends one line to the worker and resolves with its classified record.
    pub fn decrypt_into_csv(&self, data: LineData) -> BoxFuture<'static, Result<ClassifiedRecord>> {
        let sender = self.sender.clone();
        let id = self.id;
        async move {
            let sender = sender
                .ok_or_else(|| ExportError::WorkerUnavailable(format!("worker {} was cleaned up", id)))?;
            let (reply, response) = oneshot::channel();
            sender
                .send(Job { data, reply })
                .await
                .map_err(|_| ExportError::WorkerUnavailable(format!("worker {} has stopped", id)))?;
            response.await.map_err(|_| {
                ExportError::WorkerUnavailable(format!("worker {} dropped the task", id))
            })
        }
        .boxed()
    }

    /// Stops the worker. Safe to call more than once.
    pub fn cleanup(&mut self) {
        self.cancel.cancel();
        self.sender = None;
        if let Some(thread) = self.thread.take() {
            if thread.is_finished() {
                if thread.join().is_err() {
                    error!("Decryption worker {} panicked", self.id);
                }
            } else {
                debug!("Decryption worker {} stopping in background", self.id);
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.cleanup();
    }
}

async fn run(
    id: usize,
    mut receiver: mpsc::Receiver<Job>,
    ctx: Arc<WorkerContext>,
    cancel: CancellationToken,
) {
    let fetcher = match (ctx.fetcher_factory)() {
        Ok(fetcher) => Some(fetcher),
        Err(e) => {
            error!("Worker {} has no attachment fetcher: {}", id, e);
            None
        }
    };
    let archive_queue = Semaphore::new(1);

    loop {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            job = receiver.recv() => job,
        };
        let Some(job) = job else { break };

        let record = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            record = decrypt_into_csv(&job.data, &ctx, fetcher.as_deref(), &archive_queue) => record,
        };

        if job.reply.send(record).is_err() {
            debug!("Worker {} result discarded by caller", id);
        }
    }
    debug!("Decryption worker {} exited", id);
}
