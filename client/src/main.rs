use clap::Parser;
use client::display::format_leaderboard;
use client::input::{parse_command, PlayerCommand};
use client::RelayClient;
use log::info;
use shared::PlayerTag;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::timeout;

#[derive(Parser, Debug)]
#[command(author, version, about = "Terminal player for the leaderboard relay", long_about = None)]
struct Args {
    /// Relay address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:5555")]
    server: String,

    /// Player identifier shown on the leaderboard
    #[arg(short = 'i', long)]
    id: Option<String>,

    /// How long to wait for the relay to push the new ranking, in milliseconds
    #[arg(short = 'w', long, default_value = "500")]
    wait_ms: u64,
}

fn player_tag(id: &str) -> PlayerTag {
    match id.parse::<u64>() {
        Ok(n) => PlayerTag::Number(n),
        Err(_) => PlayerTag::Text(id.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let tag = args.id.as_deref().map(player_tag);

    info!("Connecting to: {}", args.server);
    let client = RelayClient::connect_as(args.server.as_str(), tag).await?;
    let mut updates = client.subscribe();

    println!("Type a pump count after each balloon, Enter to show the leaderboard, q to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            PlayerCommand::Report(pumps) => {
                let _ = updates.borrow_and_update();
                client.send_update(pumps).await;
                // The relay pushes the new ranking back; show it if it arrives in time.
                let _ = timeout(Duration::from_millis(args.wait_ms), updates.changed()).await;
            }
            PlayerCommand::ShowLeaderboard => {}
            PlayerCommand::Quit => break,
            PlayerCommand::Unknown(text) => {
                println!("Not a pump count: {:?}", text);
                continue;
            }
        }

        println!("{}", format_leaderboard(&client.get_leaderboard(), client.tag()));

        if client.was_rejected() {
            println!("The relay is full. Try again later.");
            break;
        }
        if client.is_stopped() {
            println!("(disconnected from relay, showing the last ranking received)");
        }
    }

    client.close().await;
    Ok(())
}
