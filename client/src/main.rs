use clap::Parser;
use client::controller::Controller;
use client::discovery::discover;
use log::{info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{ControlMessage, Direction, SERVICE_ID};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:4242")]
    server: SocketAddr,

    /// Locate the server with a discovery broadcast instead of --server
    #[arg(short = 'd', long)]
    discover: bool,

    /// Discovery port probed with --discover
    #[arg(long, default_value = "4243")]
    discovery_port: u16,

    /// Send random input instead of reading commands from stdin
    #[arg(long)]
    demo: bool,

    /// Milliseconds between demo inputs
    #[arg(short = 'i', long, default_value = "250")]
    interval: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let server = if args.discover {
        let target = SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), args.discovery_port);
        info!("Searching for a server on {}", target);
        discover(target, SERVICE_ID, Duration::from_secs(3)).await?
    } else {
        args.server
    };

    let mut controller = Controller::connect(server).await?;
    println!("Connected as player {}", controller.player() + 1);

    if args.demo {
        run_demo(&mut controller, Duration::from_millis(args.interval)).await?;
    } else {
        println!("Commands: up/down/left/right/none, press, release, pause, quit");
        run_console(&mut controller).await?;
    }

    controller.disconnect().await?;
    Ok(())
}

/// Sends a random direction every tick, tapping the action button now and then.
async fn run_demo(
    controller: &mut Controller,
    interval: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let directions = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
        Direction::None,
    ];
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let (direction, tap) = {
                    let mut rng = rand::thread_rng();
                    (*directions.choose(&mut rng).unwrap_or(&Direction::None), rng.gen_bool(0.2))
                };
                controller.direction(direction).await?;
                if tap {
                    controller.press().await?;
                    controller.release().await?;
                }
                info!("Sent {}{}", direction, if tap { " + action" } else { "" });
            }
            result = controller.closed() => {
                result?;
                warn!("Server closed the connection");
                return Ok(());
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

/// Translates typed commands into control bytes.
async fn run_console(controller: &mut Controller) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let command = line.trim();
        let message = match command {
            "" => continue,
            "quit" | "q" => break,
            "press" | "p" => ControlMessage::ActionPressed,
            "release" => ControlMessage::ActionReleased,
            "pause" => ControlMessage::Pause,
            other => match Direction::from_name(other) {
                Some(direction) => ControlMessage::Direction(direction),
                None => {
                    println!("Unknown command '{}'", other);
                    continue;
                }
            },
        };
        controller.send(message).await?;
    }

    Ok(())
}
