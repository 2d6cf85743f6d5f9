use clap::Parser;
use rtpsim::client::client_pool::ClientPool;
use rtpsim::client::console::run_console;
use rtpsim::config::{ClientConfig, PoolConfig, DEFAULT_PORT};
use std::net::IpAddr;
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::{info, Level};

#[derive(Parser)]
struct Args {
    #[clap(default_value_t = 1)]
    num_clients: usize,

    #[clap(default_value = "127.0.0.1")]
    server_ip: String,

    #[clap(long, default_value_t = DEFAULT_PORT)]
    port: u16,

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

    let _: IpAddr = args.server_ip.parse()?;

    let mut client_config = ClientConfig::new(args.server_ip, args.port, "default");
    client_config.log_dir = Some(args.log_dir);

    let pool_config = PoolConfig::new(args.num_clients, client_config);
    pool_config.client.validate()?;

    let pool = ClientPool::start(pool_config).await;
    info!("{} client(s) started", pool.len().await);

    run_console(&pool, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}
