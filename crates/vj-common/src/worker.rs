//! Worker pool: batch-consume the raw queue, sanitize, normalize and
//! bulk-index. Multiple workers share one queue; relative order across
//! workers is undefined.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::domain::{Job, RawJob};
use crate::indexer::Indexer;
use crate::normalize;
use crate::queue::Consumer;
use crate::sanitize::Sanitizer;

pub struct WorkerPool {
    consumer: Consumer,
    indexer: Arc<dyn Indexer>,
    sanitizer: Sanitizer,
    concurrency: usize,
    batch_size: usize,
}

impl WorkerPool {
    pub fn new(consumer: Consumer, indexer: Arc<dyn Indexer>, cfg: &WorkerConfig) -> Self {
        Self {
            consumer,
            indexer,
            sanitizer: Sanitizer::new(),
            concurrency: cfg.concurrency.max(1),
            batch_size: cfg.batch_size.max(1),
        }
    }

    /// Spawn the pool onto `tasks`. Each worker runs until `cancel` fires;
    /// a partially processed batch is finished, not rolled back.
    pub fn spawn(&self, cancel: &CancellationToken, tasks: &mut JoinSet<()>) {
        info!(concurrency = self.concurrency, batch_size = self.batch_size, "starting worker pool");

        for worker_id in 0..self.concurrency {
            let consumer = self.consumer.clone();
            let indexer = Arc::clone(&self.indexer);
            let sanitizer = self.sanitizer;
            let cancel = cancel.clone();
            let batch_size = self.batch_size;

            tasks.spawn(async move {
                run_single(worker_id, consumer, indexer, sanitizer, cancel, batch_size).await;
            });
        }
    }
}

async fn run_single(
    worker_id: usize,
    consumer: Consumer,
    indexer: Arc<dyn Indexer>,
    sanitizer: Sanitizer,
    cancel: CancellationToken,
    batch_size: usize,
) {
    debug!(worker_id, "worker started");

    loop {
        let batch = tokio::select! {
            _ = cancel.cancelled() => break,
            result = consumer.consume_batch(batch_size) => result,
        };

        let raw_jobs = match batch {
            Ok(batch) => batch,
            Err(err) => {
                // The blocking-pop timeout already throttles this loop.
                warn!(worker_id, error = %err, "consume error");
                continue;
            }
        };

        if raw_jobs.is_empty() {
            continue;
        }

        debug!(worker_id, count = raw_jobs.len(), "processing batch");

        let jobs = process_batch(&sanitizer, raw_jobs);
        if jobs.is_empty() {
            continue;
        }

        match indexer.bulk_index(&jobs).await {
            Ok(()) => debug!(worker_id, indexed = jobs.len(), "batch indexed"),
            Err(err) => warn!(worker_id, error = %err, "bulk index failed, batch lost"),
        }
    }

    debug!(worker_id, "worker stopping");
}

/// Sanitize the free-form payload, normalize, then strip the analyzed text
/// fields down to plain text. Records that fail to normalize are dropped.
pub fn process_batch(sanitizer: &Sanitizer, raw_jobs: Vec<RawJob>) -> Vec<Job> {
    let mut jobs = Vec::with_capacity(raw_jobs.len());

    for mut raw in raw_jobs {
        raw.raw_data = sanitizer.clean_map(&raw.raw_data);

        let mut job = match normalize::normalize(&raw) {
            Ok(job) => job,
            Err(err) => {
                warn!(job_id = %raw.id, source = %raw.source, error = %err, "normalize failed");
                continue;
            }
        };

        job.description = sanitizer.clean_to_text(&job.description);
        job.requirements = sanitizer.clean_to_text(&job.requirements);
        job.benefits = sanitizer.clean_to_text(&job.benefits);

        jobs.push(job);
    }

    jobs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceId;
    use chrono::Utc;
    use serde_json::{json, Value};

    fn raw(id: &str, data: Value) -> RawJob {
        let Value::Object(map) = data else {
            panic!("fixture must be an object")
        };
        RawJob {
            id: id.into(),
            url: format!("https://portal.vn/{id}"),
            source: SourceId::Topcv,
            raw_data: map,
            html_content: String::new(),
            extracted_at: Utc::now(),
            last_updated_on: String::new(),
            expired_on: None,
        }
    }

    #[test]
    fn batch_processing_sanitizes_and_normalizes() {
        let sanitizer = Sanitizer::new();
        let jobs = process_batch(
            &sanitizer,
            vec![raw(
                "1",
                json!({
                    "title": "Kế toán<script>alert(1)</script>",
                    "description": "<p>Hạch toán</p><p>Báo cáo thuế</p>",
                    "salary": "10 - 15 triệu",
                }),
            )],
        );

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].title, "Kế toán");
        assert!(!jobs[0].description.contains('<'));
        assert!(jobs[0].description.contains("Hạch toán"));
        assert_eq!((jobs[0].salary_min, jobs[0].salary_max), (10, 15));
    }

    #[test]
    fn records_without_identity_are_dropped() {
        let sanitizer = Sanitizer::new();
        let mut bad = raw("x", json!({ "title": "x" }));
        bad.id = String::new();
        bad.url = String::new();

        let good = raw("2", json!({ "title": "ok" }));
        let jobs = process_batch(&sanitizer, vec![bad, good]);

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, "2");
    }
}
