//! TCP listener and accept loop.

use crate::backend::{EventSink, QueryBackend};
use crate::connection::Connection;
use crate::error::ServerError;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Idle connection timeout; `None` disables it.
    pub idle_timeout: Option<Duration>,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("127.0.0.1:{}", cqld_protocol::DEFAULT_PORT)
                .parse()
                .unwrap(),
            idle_timeout: Some(Duration::from_secs(600)),
            max_connections: 1000,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
}

/// The listening front end: binds a port, accepts sockets, and runs one
/// [`Connection`] task per socket. Connections are independent; the server
/// imposes no ordering across them.
pub struct Server {
    config: ServerConfig,
    backend: Arc<dyn QueryBackend>,
    events: Arc<dyn EventSink>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl Server {
    pub fn new(
        config: ServerConfig,
        backend: Arc<dyn QueryBackend>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            backend,
            events,
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Runs the accept loop until shutdown. In-flight connections are not
    /// interrupted; they drain to EOF or error on their own.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("listening on {}", self.config.bind_addr);

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((socket, addr)) => self.accept(socket, addr),
                        Err(e) => {
                            tracing::error!("accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("shutting down listener");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn accept(&self, socket: tokio::net::TcpStream, addr: SocketAddr) {
        if self.stats.connections_active.load(Ordering::Relaxed)
            >= self.config.max_connections as u64
        {
            tracing::warn!("connection limit reached, rejecting {}", addr);
            return;
        }

        self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
        self.stats.connections_active.fetch_add(1, Ordering::Relaxed);
        tracing::info!("client connected: {}", addr);

        let mut connection = Connection::new(
            socket,
            addr.to_string(),
            self.backend.clone(),
            self.events.clone(),
        )
        .with_stats(self.stats.clone());
        if let Some(timeout) = self.config.idle_timeout {
            connection = connection.with_idle_timeout(timeout);
        }

        let stats = self.stats.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.run().await {
                tracing::debug!("connection {} error: {}", addr, e);
                stats.errors_total.fetch_add(1, Ordering::Relaxed);
            }
            stats.connections_active.fetch_sub(1, Ordering::Relaxed);
            tracing::info!("client disconnected: {}", addr);
        });
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Returns whether the accept loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}
