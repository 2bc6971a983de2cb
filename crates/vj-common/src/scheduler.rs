//! Periodic crawl scheduler.
//!
//! Runs every adapter sequentially at startup and then once per configured
//! interval. Each page streams through the dedup-and-publish sink before
//! the adapter fetches the next one, so a long cycle still makes progress
//! record by record.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dedup::{CheckOutcome, Deduplicator};
use crate::domain::{RawJob, SourceId};
use crate::queue::Publisher;
use crate::sources::{CrawlError, PageSink, SourceAdapter};

/// One adapter plus the queue its new/updated records go to: the raw queue
/// for API-complete sources, a pending queue for sources that need a
/// detail fetch first.
pub struct ScheduledSource {
    pub adapter: Box<dyn SourceAdapter>,
    pub publisher: Publisher,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CycleStats {
    pub total: u64,
    pub new: u64,
    pub updated: u64,
    pub unchanged: u64,
}

pub struct Scheduler {
    sources: Vec<ScheduledSource>,
    dedup: Deduplicator,
    interval: Duration,
    verbose: bool,
}

impl Scheduler {
    pub fn new(
        sources: Vec<ScheduledSource>,
        dedup: Deduplicator,
        interval: Duration,
        verbose: bool,
    ) -> Self {
        Self {
            sources,
            dedup,
            interval,
            verbose,
        }
    }

    /// Crawl immediately, then on every interval tick until cancelled.
    pub async fn run(&self, cancel: &CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await; // the startup run consumes the immediate tick

        self.run_all(cancel).await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => self.run_all(cancel).await,
            }
        }
    }

    /// One full cycle over all sources, in order.
    pub async fn run_all(&self, cancel: &CancellationToken) {
        for source in &self.sources {
            if cancel.is_cancelled() {
                return;
            }

            let id = source.adapter.source();
            info!(source = %id, queue = source.publisher.queue_name(), "running crawler");

            let sink = DedupPublishSink {
                source: id,
                dedup: self.dedup.clone(),
                publisher: source.publisher.clone(),
                verbose: self.verbose,
                stats: Mutex::new(CycleStats::default()),
            };

            if let Err(err) = source.adapter.crawl_with_callback(cancel, &sink).await {
                warn!(source = %id, error = %err, "crawler cycle error");
            }

            let stats = *sink.stats.lock().await;
            info!(
                source = %id,
                total = stats.total,
                new = stats.new,
                updated = stats.updated,
                unchanged = stats.unchanged,
                "crawler cycle finished"
            );
        }
    }
}

/// Classifies each candidate against the seen-store and publishes the
/// new/updated ones. Mark-seen only happens after a successful publish, so
/// a failed record is re-seen next cycle.
struct DedupPublishSink {
    source: SourceId,
    dedup: Deduplicator,
    publisher: Publisher,
    verbose: bool,
    stats: Mutex<CycleStats>,
}

#[async_trait]
impl PageSink for DedupPublishSink {
    async fn on_page(&self, jobs: Vec<RawJob>) -> Result<(), CrawlError> {
        let mut page = CycleStats {
            total: jobs.len() as u64,
            ..CycleStats::default()
        };

        for job in &jobs {
            let job_id = job.dedup_id();

            let outcome = match self
                .dedup
                .check(self.source.as_str(), job_id, &job.last_updated_on)
                .await
            {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(source = %self.source, job_id, error = %err, "dedup check failed, skipping");
                    continue;
                }
            };

            if self.verbose {
                info!(source = %self.source, status = outcome.as_str(), job_id, url = %job.url);
            }

            match outcome {
                CheckOutcome::Unchanged => {
                    page.unchanged += 1;
                    continue;
                }
                CheckOutcome::Updated => page.updated += 1,
                CheckOutcome::New => page.new += 1,
            }

            if let Err(err) = self.publisher.publish(job).await {
                warn!(source = %self.source, job_id, error = %err, "publish failed, skipping");
                continue;
            }

            if let Err(err) = self
                .dedup
                .mark_seen(self.source.as_str(), job_id, &job.last_updated_on, job.expired_on)
                .await
            {
                warn!(source = %self.source, job_id, error = %err, "mark seen failed");
            }
        }

        info!(
            source = %self.source,
            total = page.total,
            new = page.new,
            updated = page.updated,
            unchanged = page.unchanged,
            "page processed"
        );

        let mut stats = self.stats.lock().await;
        stats.total += page.total;
        stats.new += page.new;
        stats.updated += page.updated;
        stats.unchanged += page.unchanged;

        Ok(())
    }
}
