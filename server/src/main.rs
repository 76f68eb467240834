use clap::Parser;
use log::info;
use server::{RelayConfig, RelayServer};
use shared::{DEFAULT_MAX_LEADERBOARD, DEFAULT_MAX_PLAYERS, DEFAULT_PORT};
use std::net::IpAddr;

#[derive(Parser, Debug)]
#[command(author, version, about = "Leaderboard relay for the balloon task", long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Maximum number of connected players
    #[arg(short, long, default_value_t = DEFAULT_MAX_PLAYERS)]
    max_players: usize,

    /// Number of entries kept on the leaderboard
    #[arg(short = 'l', long, default_value_t = DEFAULT_MAX_LEADERBOARD)]
    max_leaderboard: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = RelayConfig {
        bind_address: args.host,
        port: args.port,
        max_connections: args.max_players,
        max_leaderboard: args.max_leaderboard,
    };

    let server = RelayServer::bind(config).await?;
    let advertised = server.advertised_addr().await?;
    info!(
        "Server running on IP: {}, Port: {}",
        advertised.ip(),
        advertised.port()
    );

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received Ctrl+C, shutting down...");
        })
        .await?;

    Ok(())
}
