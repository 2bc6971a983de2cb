use std::error::Error;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use vj_common::broker;
use vj_common::config::Config;
use vj_common::domain::SourceId;
use vj_common::queue::{jsonld_queue_name, pending_queue_name, Consumer, Publisher};
use vj_common::scrape::DetailScraper;
use vj_common::shutdown;

const CONSUME_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(
    name = "vj-enricher",
    about = "Scrape detail pages for pending records and re-publish them enriched"
)]
struct Cli {
    /// Pending queue to drain; defaults to the vieclam24h queue.
    #[arg(long)]
    pending_queue: Option<String>,
}

async fn run() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    vj_common::logging::init("vj-enricher");

    let args = Cli::parse();
    let cfg = Config::from_env();

    let source = SourceId::Vieclam24h;
    let pending = args
        .pending_queue
        .unwrap_or_else(|| pending_queue_name(source.as_str()));

    let conn = broker::connect(&cfg.redis).await?;
    let consumer = Consumer::new(conn.clone(), pending, CONSUME_TIMEOUT);
    let raw_publisher = Publisher::new(conn.clone(), cfg.redis.job_queue.clone());
    let jsonld_publisher = Publisher::new(conn, jsonld_queue_name(source.as_str()));

    info!(
        pending = consumer.queue_name(),
        raw = raw_publisher.queue_name(),
        jsonld = jsonld_publisher.queue_name(),
        "enricher service starting"
    );

    let scraper = DetailScraper::new(consumer, raw_publisher, jsonld_publisher, &cfg.crawler);
    let cancel = CancellationToken::new();

    let mut tasks = JoinSet::new();
    let task_cancel = cancel.clone();
    tasks.spawn(async move {
        if let Err(err) = scraper.run(&task_cancel).await {
            warn!(error = %err, "scraper loop stopped on broker error");
        }
    });

    shutdown::run_until_shutdown(cancel, tasks).await;
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("vj-enricher failed: {err}");
        std::process::exit(1);
    }
}
