//! Start/stop lifecycle of the input server

use crate::advertiser::Advertiser;
use crate::config::ServerConfig;
use crate::listener::ListenLoop;
use crate::query::InputQuery;
use crate::slot_table::SlotTable;
use log::info;
use shared::{Direction, MAX_PLAYERS};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("player count must be between 1 and {max}, got {0}", max = MAX_PLAYERS)]
    InvalidPlayerCount(usize),
    #[error("failed to bind controller endpoint on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to bind discovery socket on {addr}: {source}")]
    Advertise {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Resources that exist only while the server is running
struct Running {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    local_addr: SocketAddr,
    discovery_addr: Option<SocketAddr>,
}

/// Controller input server with an explicit `start`/`stop` lifecycle
///
/// The server is either stopped or running. While running it owns the
/// listening endpoint, the optional discovery socket and a shutdown signal
/// observed by the listen loop and every connection decoder. Decoders are
/// detached; `stop` unblocks all of them through that signal.
pub struct InputServer {
    config: ServerConfig,
    table: Arc<SlotTable>,
    running: Option<Running>,
    /// Background tasks of a stopped run that may still be winding down
    retiring: Vec<JoinHandle<()>>,
}

impl InputServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            table: Arc::new(SlotTable::new(0)),
            running: None,
            retiring: Vec::new(),
        }
    }

    /// Starts accepting controllers for `player_count` slots
    ///
    /// Any previous run is stopped first and its listener fully closed before
    /// binding again. On failure nothing is left running and the slot table
    /// is untouched. Returns the bound stream address.
    pub async fn start(&mut self, player_count: usize) -> Result<SocketAddr, ServerError> {
        self.stop();
        for task in self.retiring.drain(..) {
            let _ = task.await;
        }

        if player_count == 0 || player_count > MAX_PLAYERS {
            return Err(ServerError::InvalidPlayerCount(player_count));
        }

        let addr = self.config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        let (shutdown, shutdown_rx) = watch::channel(false);

        let advertiser = match &self.config.advertise {
            Some(advertise) => Some(
                Advertiser::bind(
                    addr.ip(),
                    advertise.clone(),
                    local_addr.port(),
                    shutdown_rx.clone(),
                )
                .await?,
            ),
            None => None,
        };

        self.table.reset(player_count);
        self.table.clear_paused();

        let mut tasks = Vec::new();
        let listen_loop = ListenLoop::new(
            listener,
            Arc::clone(&self.table),
            self.config.identity,
            shutdown_rx,
        );
        tasks.push(tokio::spawn(listen_loop.run()));

        let discovery_addr = advertiser.as_ref().and_then(Advertiser::local_addr);
        if let Some(advertiser) = advertiser {
            tasks.push(tokio::spawn(advertiser.run()));
        }

        info!(
            "Input server listening on {} for {} players",
            local_addr, player_count
        );

        self.running = Some(Running {
            shutdown,
            tasks,
            local_addr,
            discovery_addr,
        });
        Ok(local_addr)
    }

    /// Stops the server; a no-op when it is not running
    ///
    /// The listen loop, the advertiser and every decoder are signalled to
    /// exit and all slots are cleared immediately. Sockets close as soon as
    /// their tasks observe the signal.
    pub fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        let _ = running.shutdown.send(true);
        let player_count = self.table.len();
        self.table.reset(player_count);
        self.table.clear_paused();
        self.retiring.extend(running.tasks);

        info!("Input server on {} stopped", running.local_addr);
    }

    /// Stops the server and waits for the listener to close
    pub async fn shutdown(&mut self) {
        self.stop();
        for task in self.retiring.drain(..) {
            let _ = task.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.local_addr)
    }

    pub fn discovery_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().and_then(|running| running.discovery_addr)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Query handle for the game loop, valid across restarts
    pub fn query(&self) -> InputQuery {
        InputQuery::new(Arc::clone(&self.table))
    }

    pub fn connected_count(&self) -> usize {
        self.table.connected_count()
    }

    pub fn paused(&self) -> bool {
        self.table.is_paused()
    }

    pub fn clear_paused_status(&self) {
        self.table.clear_paused();
    }

    pub fn direction(&self, player: usize) -> Direction {
        self.query().direction(player)
    }

    pub fn action_pressed(&self, player: usize) -> bool {
        self.query().action_pressed(player)
    }
}

impl Drop for InputServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    #[test]
    fn test_stop_without_start_is_noop() {
        let mut server = InputServer::new(ServerConfig::local());
        server.stop();
        server.stop();

        assert!(!server.is_running());
        assert_eq!(server.connected_count(), 0);
        assert!(!server.paused());
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let mut server = InputServer::new(ServerConfig::local());

        let addr = server.start(2).await.unwrap();
        assert!(server.is_running());
        assert_eq!(server.local_addr(), Some(addr));
        assert!(server.discovery_addr().is_some());
        assert_eq!(server.query().player_count(), 2);

        server.stop();
        assert!(!server.is_running());
        assert_eq!(server.local_addr(), None);
        assert_eq!(server.connected_count(), 0);

        server.stop();
    }

    #[tokio::test]
    async fn test_invalid_player_count() {
        let mut server = InputServer::new(ServerConfig::local());

        assert!(matches!(
            server.start(0).await,
            Err(ServerError::InvalidPlayerCount(0))
        ));
        assert!(matches!(
            server.start(MAX_PLAYERS + 1).await,
            Err(ServerError::InvalidPlayerCount(_))
        ));
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_bind_failure_leaves_server_stopped() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ServerConfig {
            bind_addr: taken.local_addr().unwrap(),
            advertise: None,
            ..ServerConfig::local()
        };
        let mut server = InputServer::new(config);

        let result = server.start(2).await;
        assert!(matches!(result, Err(ServerError::Bind { .. })));
        assert!(!server.is_running());
        assert_eq!(server.query().player_count(), 0);
    }

    #[tokio::test]
    async fn test_advertise_failure_leaves_server_stopped() {
        let taken = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut config = ServerConfig::local();
        if let Some(advertise) = config.advertise.as_mut() {
            advertise.port = taken.local_addr().unwrap().port();
        }
        let mut server = InputServer::new(config);

        let result = server.start(2).await;
        assert!(matches!(result, Err(ServerError::Advertise { .. })));
        assert!(!server.is_running());
        assert_eq!(server.query().player_count(), 0);
    }

    #[tokio::test]
    async fn test_restart_rebinds_same_port() {
        let mut server = InputServer::new(ServerConfig::local());
        let first = server.start(2).await.unwrap();
        server.stop();

        let config = ServerConfig {
            bind_addr: first,
            advertise: None,
            ..ServerConfig::local()
        };
        let mut again = InputServer::new(config);
        server.shutdown().await;

        let second = again.start(3).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(again.query().player_count(), 3);
    }
}
