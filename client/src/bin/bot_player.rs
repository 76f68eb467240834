//! Simulated player that reports random pump counts, for exercising a relay
//! without running the experiment.

use clap::Parser;
use client::display::format_leaderboard;
use client::RelayClient;
use log::info;
use rand::Rng;
use shared::PlayerTag;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Relay address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:5555")]
    server: String,

    /// Name shown on the leaderboard
    #[arg(short = 'i', long, default_value = "bot")]
    id: String,

    /// Number of trials to report
    #[arg(short = 'r', long, default_value = "10")]
    rounds: u32,

    /// Delay between trials in milliseconds
    #[arg(short = 'd', long, default_value = "500")]
    delay_ms: u64,

    /// Largest pump count a balloon allows
    #[arg(short = 'm', long, default_value = "128")]
    max_pumps: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let tag = PlayerTag::Text(args.id.clone());
    let client = RelayClient::connect_as(args.server.as_str(), Some(tag)).await?;
    let mut rng = rand::thread_rng();

    for round in 1..=args.rounds {
        if client.is_stopped() {
            info!("Relay connection ended after {} rounds", round - 1);
            break;
        }

        let pumps = rng.gen_range(0..=args.max_pumps);
        info!("Round {}: {} pumps", round, pumps);
        client.send_update(pumps).await;

        sleep(Duration::from_millis(args.delay_ms)).await;
    }

    println!("{}", format_leaderboard(&client.get_leaderboard(), client.tag()));
    client.close().await;

    Ok(())
}
