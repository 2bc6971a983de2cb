use std::time::Duration;

use redis::AsyncCommands;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::broker::Broker;
use crate::domain::RawJob;
use crate::queue::QueueError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Blocking right-pop consumer over a named list.
///
/// The BRPOP timeout is the empty-queue signal, not an error; it bounds how
/// long a caller goes without re-checking cancellation.
#[derive(Clone)]
pub struct Consumer {
    conn: Broker,
    queue: String,
    timeout: Duration,
}

impl Consumer {
    pub fn new(conn: Broker, queue: impl Into<String>, timeout: Duration) -> Self {
        let timeout = if timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            timeout
        };
        Self {
            conn,
            queue: queue.into(),
            timeout,
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue
    }

    /// Wait for one record. `Ok(None)` means the timeout elapsed with the
    /// queue empty.
    pub async fn consume(&self) -> Result<Option<RawJob>, QueueError> {
        let mut conn = self.conn.clone();
        let reply: Option<(String, String)> = conn
            .brpop(&self.queue, self.timeout.as_secs_f64())
            .await?;

        let Some((_, payload)) = reply else {
            return Ok(None);
        };

        Ok(Some(serde_json::from_str(&payload)?))
    }

    /// Accumulate up to `max_batch` records: one blocking pop so an empty
    /// queue does not busy-spin, then non-blocking pops to fill the batch.
    /// Malformed payloads are dropped with a warning.
    pub async fn consume_batch(&self, max_batch: usize) -> Result<Vec<RawJob>, QueueError> {
        let mut jobs = Vec::with_capacity(max_batch);
        let mut conn = self.conn.clone();

        let reply: Option<(String, String)> = conn
            .brpop(&self.queue, self.timeout.as_secs_f64())
            .await?;

        let Some((_, payload)) = reply else {
            return Ok(jobs);
        };

        match serde_json::from_str(&payload) {
            Ok(job) => jobs.push(job),
            Err(err) => warn!(queue = %self.queue, error = %err, "dropping malformed record"),
        }

        while jobs.len() < max_batch {
            let payload: Option<String> = conn.rpop(&self.queue, None).await?;
            let Some(payload) = payload else {
                break;
            };

            match serde_json::from_str(&payload) {
                Ok(job) => jobs.push(job),
                Err(err) => {
                    warn!(queue = %self.queue, error = %err, "dropping malformed record")
                }
            }
        }

        Ok(jobs)
    }

    /// Single-record loop until cancellation. Handler errors are logged and
    /// the loop keeps going; only broker errors bubble up.
    pub async fn run<F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut handler: F,
    ) -> Result<(), QueueError>
    where
        F: FnMut(RawJob) -> Fut,
        Fut: std::future::Future<Output = Result<(), QueueError>>,
    {
        loop {
            let job = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                res = self.consume() => res?,
            };

            let Some(job) = job else {
                continue;
            };

            if let Err(err) = handler(job).await {
                warn!(queue = %self.queue, error = %err, "handler error, record lost");
            }
        }
    }
}
