//! `teachdb-server`: accepts PostgreSQL v3 wire connections and executes
//! SQL against the paged heap storage engine.

use anyhow::Result;
use clap::Parser;
use common::Config;
use server::Server;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "teachdb-server", about = "Teaching Postgres-wire database server")]
struct Args {
    /// Listener TCP port.
    #[arg(long, default_value_t = 5432)]
    port: u16,
    /// Buffer pool capacity, in pages.
    #[arg(long, default_value_t = 128)]
    buffer_size: usize,
    /// Per-query read deadline, in milliseconds.
    #[arg(long, default_value_t = 30_000)]
    query_timeout_ms: u64,
    /// Per-frame deadline during startup and payload reads, in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    connection_timeout_ms: u64,
    /// Utilization fraction that triggers background eviction.
    #[arg(long, default_value_t = 0.80)]
    eviction_threshold: f64,
    /// Utilization fraction background eviction drains down to.
    #[arg(long, default_value_t = 0.60)]
    target_utilization: f64,
    /// Interval between background eviction sweeps, in milliseconds.
    #[arg(long, default_value_t = 1_000)]
    eviction_interval_ms: u64,
    /// Directory containing the `pages/` subdirectory.
    #[arg(long, default_value = "./data")]
    data_root: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = Config::builder()
        .port(args.port)
        .buffer_size(args.buffer_size)
        .query_timeout_ms(args.query_timeout_ms)
        .connection_timeout_ms(args.connection_timeout_ms)
        .eviction_threshold(args.eviction_threshold)
        .target_utilization(args.target_utilization)
        .eviction_interval_ms(args.eviction_interval_ms)
        .data_root(args.data_root)
        .build();

    let server = Server::bind(&config).await?;
    tracing::info!(addr = %server.local_addr()?, "teachdb-server listening");
    server.run().await
}
