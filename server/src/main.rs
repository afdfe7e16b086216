use clap::{Parser, ValueEnum};
use log::info;
use server::{AdvertiseConfig, IdentityMode, InputQuery, InputServer, ServerConfig};
use std::io::Write;
use std::net::{IpAddr, SocketAddr};
use tokio::time::{interval, Duration, MissedTickBehavior};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Identity {
    /// Every connection is a new device
    Address,
    /// Devices reconnecting from the same host keep their slot
    Host,
}

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// IP address to bind the controller endpoint to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Controller endpoint port
    #[arg(short, long, default_value_t = server::config::DEFAULT_PORT)]
    port: u16,

    /// Number of player slots
    #[arg(short = 'n', long, default_value = "2")]
    players: usize,

    /// How connecting devices are identified
    #[arg(long, value_enum, default_value = "address")]
    identity: Identity,

    /// UDP port answering discovery probes
    #[arg(long, default_value_t = server::config::DEFAULT_DISCOVERY_PORT)]
    discovery_port: u16,

    /// Do not answer discovery probes
    #[arg(long)]
    no_advertise: bool,

    /// Status polls per second
    #[arg(long, default_value = "30")]
    poll_rate: u32,
}

/// Starts the input server and a console monitor polling it like a game loop.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        bind_addr: SocketAddr::new(args.host, args.port),
        identity: match args.identity {
            Identity::Address => IdentityMode::Address,
            Identity::Host => IdentityMode::Host,
        },
        advertise: (!args.no_advertise).then(|| AdvertiseConfig {
            port: args.discovery_port,
            ..AdvertiseConfig::default()
        }),
    };

    let mut server = InputServer::new(config);
    let addr = server.start(args.players).await?;
    info!("Waiting for controllers on {}", addr);

    let query = server.query();
    tokio::select! {
        _ = run_monitor_loop(query, args.poll_rate) => {}
        _ = tokio::signal::ctrl_c() => {
            println!();
            println!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    server.shutdown().await;
    Ok(())
}

/// Polls the input state and redraws the status line when it changes.
async fn run_monitor_loop(query: InputQuery, poll_rate: u32) {
    let mut interval_timer = interval(Duration::from_secs_f32(1.0 / poll_rate.max(1) as f32));
    interval_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut currently_displayed = String::new();

    loop {
        interval_timer.tick().await;

        let to_display = status_line(&query);
        if to_display != currently_displayed {
            print!("\r{}{}", to_display, " ".repeat(15));
            let _ = std::io::stdout().flush();
            currently_displayed = to_display;
        }
    }
}

fn status_line(query: &InputQuery) -> String {
    let inputs = query.inputs();
    let mut line = format!(
        "Connected: {}/{}   Paused: {}   Input: ",
        query.connected_count(),
        inputs.len(),
        if query.paused() { "yes" } else { "no" }
    );
    for (player, input) in inputs.iter().enumerate() {
        let action = if input.action_pressed { "*" } else { "" };
        line.push_str(&format!("({}, {}{}) ", player + 1, input.direction, action));
    }
    line
}
