use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use xstream::{Client, ClientConfig, Endpoint};

mod console;

use console::Command;

const RUNNING_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Interactive xstream client: type lines to send them, `:open`, `:close`,
/// `:clear`, `:state` and `:quit` to drive the connection.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    #[command(subcommand)]
    target: Target,

    /// Request a connection as soon as the workers are up.
    #[arg(long, global = true)]
    auto_open: bool,

    /// Receive buffer size in bytes.
    #[arg(long, default_value_t = xstream::DEFAULT_RX_BUFFER_SIZE, global = true)]
    rx_buffer_size: usize,

    /// Give up on a connect attempt after this many milliseconds.
    #[arg(long, global = true)]
    connect_timeout_ms: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum Target {
    /// Connect to a TCP/IPv4 server.
    Tcp { address: String, port: u16 },
    /// Connect to a Unix domain socket.
    Unix { path: PathBuf },
}

fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let endpoint = match args.target {
        Target::Tcp { address, port } => Endpoint::tcp(address, port),
        Target::Unix { path } => Endpoint::unix(path),
    };
    let mut config = ClientConfig::new().with_rx_buffer_size(args.rx_buffer_size);
    if let Some(ms) = args.connect_timeout_ms {
        config = config.with_connect_timeout(Duration::from_millis(ms));
    }

    let client = Client::with_config(endpoint, config);
    let target = client.endpoint().to_string();

    let name = target.clone();
    client.set_connected_callback(move || info!("Connected to {}", name));
    let name = target.clone();
    client.set_disconnected_callback(move || info!("Disconnected from {}", name));
    client.set_error_callback(|kind, payload| match payload {
        Some(payload) => warn!("{}: dropped {} byte payload", kind, payload.len()),
        None => warn!("{}", kind),
    });
    client.set_receive_callback(|bytes| {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(bytes).and_then(|_| stdout.flush()) {
            error!("Failed to write received bytes: {}", e);
        }
    });

    if !client.start() {
        error!("Failed to start client workers");
        return Err(std::io::Error::other("client workers did not start"));
    }
    while !client.is_running() {
        std::thread::sleep(RUNNING_POLL_INTERVAL);
    }
    info!("Client ready for {}", target);

    if args.auto_open {
        client.request_open();
    }

    for line in std::io::stdin().lock().lines() {
        match console::parse(&line?) {
            Command::Open => {
                if !client.request_open() {
                    warn!("Cannot open while {}", client.state());
                }
            }
            Command::Close => {
                if !client.request_close() {
                    warn!("Cannot close while {}", client.state());
                }
            }
            Command::Clear => client.clear_outbound_payloads(),
            Command::State => println!(
                "state: {}, queued payloads: {}",
                client.state(),
                client.pending_payloads()
            ),
            Command::Quit => break,
            Command::Send(payload) => {
                client.enqueue_payload(&payload);
            }
        }
    }

    info!("Shutting down");
    client.stop();
    Ok(())
}
