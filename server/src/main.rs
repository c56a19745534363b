use clap::{Parser, Subcommand};
use log::{error, info};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

mod echo_server;

use echo_server::{EchoServer, ServerMode, ServerTarget};

/// Test harness server for xstream clients.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    #[command(subcommand)]
    target: Target,

    /// What to do with received bytes.
    #[arg(long, value_enum, default_value_t = ServerMode::Echo, global = true)]
    mode: ServerMode,
}

#[derive(Debug, Subcommand)]
enum Target {
    /// Listen on a TCP address, e.g. 127.0.0.1:5000.
    Tcp { addr: SocketAddr },
    /// Listen on a Unix domain socket path.
    Unix { path: PathBuf },
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let target = match args.target {
        Target::Tcp { addr } => ServerTarget::Tcp(addr),
        Target::Unix { path } => ServerTarget::Unix(path),
    };

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                token.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let server = EchoServer::new(target, args.mode);
    if let Err(e) = server.run(shutdown).await {
        error!("Server failed: {}", e);
        return Err(e);
    }
    Ok(())
}
