use clap::Parser;
use client::network::Client;
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Disconnect after this many seconds instead of running until killed
    #[arg(short = 'd', long)]
    duration_secs: Option<u64>,

    /// Keep attacking the nearest living entity
    #[arg(short = 'a', long)]
    auto_attack: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.auto_attack {
        info!("Auto-attack enabled");
    }

    let mut client = Client::new(&args.server, args.auto_attack).await?;
    client.run(args.duration_secs.map(Duration::from_secs)).await?;

    Ok(())
}
