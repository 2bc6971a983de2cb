use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

use vj_common::broker;
use vj_common::config::Config;
use vj_common::indexer::{ElasticsearchIndexer, Indexer, PostgresIndexer};
use vj_common::queue::Consumer;
use vj_common::shutdown;
use vj_common::worker::WorkerPool;

const CONSUME_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(
    name = "vj-worker",
    about = "Consume raw job records, normalize and bulk-index them"
)]
struct Cli {
    /// Indexing backend: postgres or elasticsearch.
    #[arg(long, env = "INDEXER_BACKEND", default_value = "postgres")]
    backend: String,
}

async fn run() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    vj_common::logging::init("vj-worker");

    let args = Cli::parse();
    let cfg = Config::from_env();

    let conn = broker::connect(&cfg.redis).await?;
    let consumer = Consumer::new(conn, cfg.redis.job_queue.clone(), CONSUME_TIMEOUT);

    let indexer: Arc<dyn Indexer> = match args.backend.as_str() {
        "postgres" => Arc::new(PostgresIndexer::connect(&cfg.postgres).await?),
        "elasticsearch" | "es" => {
            Arc::new(ElasticsearchIndexer::connect(&cfg.elasticsearch).await?)
        }
        other => return Err(format!("unknown indexer backend: {other}").into()),
    };

    info!(
        backend = %args.backend,
        queue = consumer.queue_name(),
        "worker service starting"
    );

    let pool = WorkerPool::new(consumer, indexer, &cfg.worker);
    let cancel = CancellationToken::new();

    let mut tasks = JoinSet::new();
    pool.spawn(&cancel, &mut tasks);

    shutdown::run_until_shutdown(cancel, tasks).await;
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("vj-worker failed: {err}");
        std::process::exit(1);
    }
}
