use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig};
use shared::{CLIENT_TIMEOUT_SECS, DEFAULT_MAX_CLIENTS, DEFAULT_PORT, DEFAULT_TICK_RATE};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value_t = DEFAULT_TICK_RATE)]
    tick_rate: u32,

    /// Maximum number of connected clients
    #[arg(short, long, default_value_t = DEFAULT_MAX_CLIENTS)]
    max_clients: usize,

    /// Seconds of silence before a client is dropped
    #[arg(long, default_value_t = CLIENT_TIMEOUT_SECS)]
    client_timeout_secs: u64,

    /// Training dummies spawned at startup
    #[arg(short, long, default_value_t = 1)]
    dummies: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let tick_rate = args.tick_rate.max(1);

    let config = ServerConfig {
        tick_duration: Duration::from_secs(1) / tick_rate,
        max_clients: args.max_clients,
        client_timeout: Duration::from_secs(args.client_timeout_secs),
        training_dummies: args.dummies,
    };

    info!(
        "Starting server at {}Hz for up to {} clients",
        tick_rate, config.max_clients
    );

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, config).await?;
    server.run().await?;

    Ok(())
}
