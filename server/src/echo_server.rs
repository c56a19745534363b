use clap::ValueEnum;
use futures::io::{AsyncRead, AsyncWrite};
use futures::{AsyncReadExt, AsyncWriteExt};
use log::*;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;
use tokio::net::{TcpListener, UnixListener};
use tokio_util::compat::TokioAsyncReadCompatExt;
use tokio_util::sync::CancellationToken;

const READ_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Clone)]
pub enum ServerTarget {
    Unix(PathBuf),
    Tcp(SocketAddr),
}

/// What the server does with the bytes it reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ServerMode {
    /// Write every chunk straight back.
    Echo,
    /// Count and discard.
    Sink,
}

pub struct EchoServer {
    target: ServerTarget,
    mode: ServerMode,
}

impl EchoServer {
    pub fn new(target: ServerTarget, mode: ServerMode) -> Self {
        Self { target, mode }
    }

    /// Accepts connections until `shutdown` is cancelled. Every connection is
    /// served by its own task.
    pub async fn run(&self, shutdown: CancellationToken) -> std::io::Result<()> {
        match &self.target {
            ServerTarget::Unix(path) => {
                if path.exists() {
                    let _ = std::fs::remove_file(path);
                }
                let listener = UnixListener::bind(path)?;
                info!("Server listening on Unix Socket {:?} ({:?} mode)", path, self.mode);
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        accepted = listener.accept() => match accepted {
                            Ok((stream, _)) => {
                                info!("Accepted Unix connection");
                                self.spawn_connection(stream.compat(), shutdown.child_token());
                            }
                            Err(e) => warn!("Failed to accept: {}", e),
                        },
                    }
                }
                let _ = std::fs::remove_file(path);
            }
            ServerTarget::Tcp(addr) => {
                let listener = TcpListener::bind(addr).await?;
                info!("Server listening on TCP {:?} ({:?} mode)", addr, self.mode);
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        accepted = listener.accept() => match accepted {
                            Ok((stream, peer)) => {
                                info!("Accepted TCP connection from {:?}", peer);
                                self.spawn_connection(stream.compat(), shutdown.child_token());
                            }
                            Err(e) => warn!("Failed to accept: {}", e),
                        },
                    }
                }
            }
        }

        info!("Server stopped");
        Ok(())
    }

    fn spawn_connection<T>(&self, stream: T, token: CancellationToken)
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let mode = self.mode;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => info!("Connection dropped on shutdown"),
                result = Self::handle_connection(stream, mode) => match result {
                    Ok(total) => info!("Connection closed after {} bytes", total),
                    Err(e) => error!("Connection error: {}", e),
                },
            }
        });
    }

    /// Serves one client until it closes its side. Returns the number of
    /// bytes read.
    pub async fn handle_connection<T>(mut stream: T, mode: ServerMode) -> std::io::Result<u64>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let mut total = 0u64;
        let start = Instant::now();

        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            total += n as u64;
            match mode {
                ServerMode::Echo => {
                    stream.write_all(&buf[..n]).await?;
                    trace!("Echoed {} bytes", n);
                }
                ServerMode::Sink => debug!("Discarded {} bytes", n),
            }
        }
        stream.close().await?;

        let elapsed = start.elapsed();
        let speed = (total as f64 / 1024.0) / elapsed.as_secs_f64().max(f64::EPSILON);
        info!("=== Connection Complete ===");
        info!("Total received: {} KB", total / 1024);
        info!("Time: {:.2} seconds", elapsed.as_secs_f64());
        info!("Speed: {:.2} KB/s", speed);

        Ok(total)
    }
}
