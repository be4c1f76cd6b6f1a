//! TSS node binary

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;
use tss_module::Address;
use tss_node::{api, Genesis, Node};

/// TSS node CLI arguments
#[derive(Parser, Debug)]
#[command(name = "tss-node")]
#[command(about = "Block producer and API for the TSS module")]
#[command(version)]
struct Args {
    /// Listen address
    #[arg(short, long, env = "TSS_LISTEN", default_value = "0.0.0.0:8080")]
    listen: String,

    /// Block interval in milliseconds
    #[arg(long, env = "TSS_BLOCK_INTERVAL_MS", default_value = "1000")]
    block_interval_ms: u64,

    /// Address allowed to run authority commands
    #[arg(long, env = "TSS_AUTHORITY", default_value = "authority")]
    authority: String,

    /// Genesis JSON file with params and balances
    #[arg(long, env = "TSS_GENESIS")]
    genesis: Option<PathBuf>,

    /// Number of blocks tx results are kept for
    #[arg(long, default_value = "10000")]
    result_retention: u64,

    /// Emit JSON logs
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::from_default_env().add_directive(Level::INFO.into());
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let genesis = match &args.genesis {
        Some(path) => Genesis::load(path)?,
        None => Genesis::default(),
    };
    info!(
        listen = %args.listen,
        block_interval_ms = args.block_interval_ms,
        authority = %args.authority,
        "Starting TSS node"
    );

    let node = Node::new(Address::new(args.authority.clone()), genesis, Utc::now())?;

    let producer = node.clone();
    let retention = args.result_retention;
    let interval_ms = args.block_interval_ms.max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
        loop {
            interval.tick().await;
            let produced = producer.produce_block(Utc::now()).await;
            producer.prune_results(produced.block.height.saturating_sub(retention));
        }
    });

    let app = api::router(node);
    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    info!(address = %args.listen, "Listening");

    axum::serve(listener, app).await?;

    Ok(())
}
