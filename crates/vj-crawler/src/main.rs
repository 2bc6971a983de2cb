use std::collections::HashSet;
use std::error::Error;

use clap::Parser;
use dotenvy::dotenv;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

use vj_common::broker;
use vj_common::config::Config;
use vj_common::dedup::Deduplicator;
use vj_common::domain::SourceId;
use vj_common::queue::{pending_queue_name, Publisher};
use vj_common::scheduler::{ScheduledSource, Scheduler};
use vj_common::shutdown;
use vj_common::sources::careerviet::CareervietAdapter;
use vj_common::sources::topcv::TopcvAdapter;
use vj_common::sources::topdev::TopdevAdapter;
use vj_common::sources::vieclam24h::Vieclam24hAdapter;
use vj_common::sources::vietnamworks::VietnamworksAdapter;

#[derive(Debug, Parser)]
#[command(name = "vj-crawler", about = "Periodic multi-source job-listing crawler")]
struct Cli {
    /// Run a single crawl cycle and exit instead of scheduling.
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Comma-separated subset of sources to run
    /// (topcv,vietnamworks,careerviet,topdev,vieclam24h).
    #[arg(long)]
    sources: Option<String>,
}

async fn run() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    vj_common::logging::init("vj-crawler");

    let args = Cli::parse();
    let cfg = Config::from_env();

    let conn = broker::connect(&cfg.redis).await?;
    let dedup = Deduplicator::new(conn.clone());
    let raw_queue = Publisher::new(conn.clone(), cfg.redis.job_queue.clone());
    let pending_queue = Publisher::new(
        conn.clone(),
        pending_queue_name(SourceId::Vieclam24h.as_str()),
    );

    let selected: Option<HashSet<String>> = args.sources.map(|raw| {
        raw.split(',')
            .map(|part| part.trim().to_lowercase())
            .filter(|part| !part.is_empty())
            .collect()
    });
    let wants = |name: &str| selected.as_ref().map_or(true, |set| set.contains(name));

    let mut sources: Vec<ScheduledSource> = Vec::new();
    if wants(SourceId::Vietnamworks.as_str()) {
        sources.push(ScheduledSource {
            adapter: Box::new(VietnamworksAdapter::new(cfg.crawler.clone())?),
            publisher: raw_queue.clone(),
        });
    }
    if wants(SourceId::Topdev.as_str()) {
        sources.push(ScheduledSource {
            adapter: Box::new(TopdevAdapter::new(cfg.crawler.clone())?),
            publisher: raw_queue.clone(),
        });
    }
    if wants(SourceId::Topcv.as_str()) {
        sources.push(ScheduledSource {
            adapter: Box::new(TopcvAdapter::new(cfg.crawler.clone())?),
            publisher: raw_queue.clone(),
        });
    }
    if wants(SourceId::Careerviet.as_str()) {
        sources.push(ScheduledSource {
            adapter: Box::new(CareervietAdapter::new(cfg.crawler.clone())?),
            publisher: raw_queue.clone(),
        });
    }
    // vieclam24h records need a detail scrape before normalization, so its
    // candidates go to the pending queue the enricher drains.
    if wants(SourceId::Vieclam24h.as_str()) {
        sources.push(ScheduledSource {
            adapter: Box::new(Vieclam24hAdapter::new(cfg.crawler.clone())?),
            publisher: pending_queue,
        });
    }

    if sources.is_empty() {
        return Err("no sources selected".into());
    }

    info!(
        sources = sources.len(),
        interval_secs = cfg.crawler.interval.as_secs(),
        "crawler service starting"
    );

    let scheduler = Scheduler::new(
        sources,
        dedup,
        cfg.crawler.interval,
        cfg.crawler.verbose_log,
    );
    let cancel = CancellationToken::new();

    if args.once {
        tokio::select! {
            _ = scheduler.run_all(&cancel) => {},
            _ = shutdown::shutdown_signal() => cancel.cancel(),
        }
        return Ok(());
    }

    let mut tasks = JoinSet::new();
    let task_cancel = cancel.clone();
    tasks.spawn(async move {
        scheduler.run(&task_cancel).await;
    });

    shutdown::run_until_shutdown(cancel, tasks).await;
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("vj-crawler failed: {err}");
        std::process::exit(1);
    }
}
