//! SMTP listener
//!
//! Owns the TCP socket, enforces the connection cap, and drives each
//! connection line by line through the session engine.

use super::registry::ConnectionRegistry;
use super::response::SmtpResponse;
use super::session::{SessionContext, SessionEngine};
use anyhow::Result;
use postdrop_common::config::SmtpConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Semaphore};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// SMTP server
pub struct SmtpServer {
    config: SmtpConfig,
    engine: Arc<SessionEngine>,
    registry: Arc<ConnectionRegistry>,
    connection_semaphore: Arc<Semaphore>,
}

impl SmtpServer {
    /// Create a new SMTP server
    pub fn new(config: SmtpConfig, engine: Arc<SessionEngine>) -> Self {
        let max_connections = config.max_connections;
        Self {
            config,
            engine,
            registry: Arc::new(ConnectionRegistry::new()),
            connection_semaphore: Arc::new(Semaphore::new(max_connections)),
        }
    }

    /// Registry of live connections
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    /// Bind the configured address and serve until the task is cancelled
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        info!("SMTP server listening on {}", addr);
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    // Over the cap, the connection is dropped without a
                    // banner; clients retry.
                    let permit = match self.connection_semaphore.clone().try_acquire_owned() {
                        Ok(permit) => permit,
                        Err(_) => {
                            warn!("max connections reached, rejecting {}", peer_addr);
                            continue;
                        }
                    };

                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream, peer_addr).await {
                            error!("session error from {}: {}", peer_addr, e);
                        }
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!("failed to accept connection: {}", e);
                }
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream, peer_addr: SocketAddr) -> Result<()> {
        let (connection_id, context) = self.registry.attach(peer_addr.ip()).await;
        let result = self.serve_session(stream, peer_addr, &context).await;
        self.registry.detach(connection_id).await;
        result
    }

    async fn serve_session(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
        context: &Arc<Mutex<SessionContext>>,
    ) -> Result<()> {
        let (reader, writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut writer = BufWriter::new(writer);

        let banner = SmtpResponse::new(
            220,
            format!("{} SMTP Service ready", self.config.hostname),
        );
        writer.write_all(banner.to_wire().as_bytes()).await?;
        writer.flush().await?;

        let idle = Duration::from_secs(self.config.connection_timeout_secs);
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = match timeout(idle, reader.read_line(&mut line)).await {
                Ok(read) => read?,
                Err(_) => {
                    debug!("closing idle connection from {}", peer_addr);
                    break;
                }
            };
            if bytes_read == 0 {
                debug!("client {} disconnected", peer_addr);
                break;
            }

            let input = line.trim_end_matches(['\r', '\n']);
            let outcome = {
                let mut ctx = context.lock().await;
                self.engine.handle_line(&mut ctx, input).await
            };

            if let Some(response) = outcome.response {
                writer.write_all(response.to_wire().as_bytes()).await?;
                writer.flush().await?;
            }
            if outcome.close {
                break;
            }
        }

        Ok(())
    }
}
