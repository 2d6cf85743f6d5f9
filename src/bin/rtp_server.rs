use clap::Parser;
use rtpsim::config::{ServerConfig, DEFAULT_PORT};
use rtpsim::server::server_engine::ServerEngine;
use rtpsim::util::random::RngRandom;
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
struct Args {
    #[clap(default_value_t = DEFAULT_PORT)]
    port: u16,

    #[clap(long, default_value_t = false)]
    no_fec: bool,

    #[clap(long, default_value_t = false)]
    no_congestion: bool,

    /// directory for the CSV logs
    #[clap(long, default_value = ".")]
    log_dir: PathBuf,

    #[clap(short, long, default_value_t = false)]
    verbose: bool,

    #[clap(long, default_value_t = false)]
    very_verbose: bool,
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match (args.verbose, args.very_verbose) {
        (_, true) => Level::TRACE,
        (true, _) => Level::DEBUG,
        (false, false) => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .ok();

    let mut config = ServerConfig::new(args.port);
    config.fec_enabled = !args.no_fec;
    config.congestion_enabled = !args.no_congestion;
    config.log_dir = Some(args.log_dir);

    let server = ServerEngine::<RngRandom>::new(config).await?;
    server.run().await;
    Ok(())
}
