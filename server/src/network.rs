//! Server network layer: TCP accept loop, per-connection tasks and broadcast
//!
//! Every admitted connection gets two tasks. The reader parses score updates
//! and applies them to the shared [`RelayState`]; the writer drains the
//! connection's outbox onto the socket. Only writer tasks write to sockets,
//! so a slow or dead recipient never stalls the player who scored.
//!
//! A recipient that falls `OUTBOX_CAPACITY` frames behind, or whose socket
//! refuses writes for `WRITE_TIMEOUT`, is unregistered. Removing a player
//! from the registry closes its outbox; the writer then finishes and the
//! reader, which watches the writer, closes the connection.

use crate::config::RelayConfig;
use crate::discovery::lan_address;
use crate::error::ServerError;
use crate::ranking::RankingStore;
use crate::registry::{outbox_channel, ConnectionRegistry, Frame, Outbox};
use log::{debug, error, info, warn};
use shared::framing::{decode_update, encode_frame, read_frame, rejection_frame};
use shared::{LeaderboardEntry, PlayerId, ProtocolError, Snapshot};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Longest a single socket write may block before the recipient is dropped.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// State shared by every connection task
///
/// Lock order is ranking, then registry. `record_and_broadcast` holds the
/// ranking lock until the new snapshot has been queued for every recipient,
/// so all connections observe broadcasts in the order updates were applied.
pub struct RelayState {
    ranking: Mutex<RankingStore>,
    registry: RwLock<ConnectionRegistry>,
}

impl RelayState {
    /// Creates an empty relay state with the given player and board limits
    pub fn new(max_connections: usize, max_leaderboard: usize) -> Self {
        Self {
            ranking: Mutex::new(RankingStore::new(max_leaderboard)),
            registry: RwLock::new(ConnectionRegistry::new(max_connections)),
        }
    }

    /// Registers a connection, or returns None when the relay is full
    pub async fn register(&self, addr: SocketAddr, outbox: Outbox) -> Option<PlayerId> {
        self.registry.write().await.register(addr, outbox)
    }

    /// Removes a connection; false if it was already gone
    pub async fn unregister(&self, id: PlayerId) -> bool {
        self.registry.write().await.unregister(id)
    }

    pub async fn is_registered(&self, id: PlayerId) -> bool {
        self.registry.read().await.contains(id)
    }

    /// Applies one update and queues the resulting ranking for every
    /// registered connection, the sender included.
    pub async fn record_and_broadcast(
        &self,
        entry: LeaderboardEntry,
    ) -> Result<Snapshot, ProtocolError> {
        let (snapshot, failed) = {
            let mut ranking = self.ranking.lock().await;
            ranking.record_update(entry);
            let snapshot = ranking.snapshot();
            let frame: Frame = Arc::from(encode_frame(&snapshot)?);

            let registry = self.registry.read().await;
            let failed = registry.broadcast(&frame);
            (snapshot, failed)
        };

        for id in failed {
            warn!("Player {} stopped accepting broadcasts", id);
            self.unregister(id).await;
        }

        Ok(snapshot)
    }

    /// Current ranking, highest pumps first
    pub async fn snapshot(&self) -> Snapshot {
        self.ranking.lock().await.snapshot()
    }

    pub async fn connected_players(&self) -> usize {
        self.registry.read().await.len()
    }

    /// Identifiers of the registered connections, in join order
    pub async fn player_ids(&self) -> Vec<PlayerId> {
        self.registry.read().await.ids()
    }

    async fn disconnect_all(&self) {
        self.registry.write().await.clear();
    }
}

/// A bound relay that has not started accepting yet
pub struct RelayServer {
    listener: TcpListener,
    state: Arc<RelayState>,
    shutdown_tx: watch::Sender<bool>,
}

impl RelayServer {
    /// Validates `config` and binds the listening socket.
    pub async fn bind(config: RelayConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let addr = config.socket_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        info!(
            "Relay listening on {} (max {} players, {} leaderboard slots)",
            listener.local_addr().unwrap_or(addr),
            config.max_connections,
            config.max_leaderboard
        );

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            listener,
            state: Arc::new(RelayState::new(
                config.max_connections,
                config.max_leaderboard,
            )),
            shutdown_tx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Address players should connect to
    ///
    /// Same as `local_addr` unless the relay listens on every interface, in
    /// which case the LAN address of this machine is substituted.
    pub async fn advertised_addr(&self) -> Result<SocketAddr, ServerError> {
        let bound = self.local_addr()?;
        if bound.ip().is_unspecified() {
            return Ok(SocketAddr::new(lan_address().await, bound.port()));
        }
        Ok(bound)
    }

    pub fn state(&self) -> Arc<RelayState> {
        Arc::clone(&self.state)
    }

    /// Accepts connections for the rest of the process lifetime.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Accepts connections until `shutdown` resolves, then tells every
    /// connection task to stop and drops all registered connections.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("Relay ready, waiting for players");

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.admit(stream, addr).await,
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
            }
        }

        info!("Relay shutting down");
        self.shutdown_tx.send_replace(true);
        self.state.disconnect_all().await;
        Ok(())
    }

    /// Registers the connection and spawns its tasks, or turns it away when
    /// the relay is full. Rejected connections are never registered.
    async fn admit(&self, stream: TcpStream, addr: SocketAddr) {
        let (outbox, inbox) = outbox_channel();

        let Some(id) = self.state.register(addr, outbox).await else {
            warn!("Max players reached, refusing connection from {}", addr);
            tokio::spawn(reject(stream, addr));
            return;
        };

        let (read_half, write_half) = stream.into_split();

        let writer = tokio::spawn(write_loop(id, write_half, inbox, Arc::clone(&self.state)));
        tokio::spawn(read_loop(
            id,
            read_half,
            writer,
            Arc::clone(&self.state),
            self.shutdown_tx.subscribe(),
        ));
    }
}

async fn reject(mut stream: TcpStream, addr: SocketAddr) {
    if let Err(e) = stream.write_all(rejection_frame().as_bytes()).await {
        debug!("Failed to send rejection to {}: {}", addr, e);
    }
    let _ = stream.shutdown().await;
}

/// Drains the connection's outbox onto the socket until the registry drops
/// the connection, a write fails or a write stalls past `WRITE_TIMEOUT`.
async fn write_loop(
    id: PlayerId,
    mut writer: OwnedWriteHalf,
    mut inbox: mpsc::Receiver<Frame>,
    state: Arc<RelayState>,
) {
    while let Some(frame) = inbox.recv().await {
        match timeout(WRITE_TIMEOUT, writer.write_all(frame.as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Failed to send leaderboard to player {}: {}", id, e);
                state.unregister(id).await;
                break;
            }
            Err(_) => {
                warn!("Player {} stopped reading, dropping connection", id);
                state.unregister(id).await;
                break;
            }
        }
    }

    let _ = timeout(WRITE_TIMEOUT, writer.shutdown()).await;
    debug!("Writer for player {} stopped", id);
}

/// Reads score updates from one player until the connection ends or its
/// writer task finishes.
async fn read_loop(
    id: PlayerId,
    read_half: OwnedReadHalf,
    mut writer: JoinHandle<()>,
    state: Arc<RelayState>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut reader = BufReader::new(read_half);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = &mut writer => {
                debug!("Writer for player {} is gone, closing connection", id);
                break;
            }
            frame = read_frame(&mut reader) => match frame {
                Ok(Some(frame)) => {
                    // Updates from a player dropped for lagging are not applied.
                    if !state.is_registered(id).await {
                        break;
                    }
                    handle_frame(id, &frame, &state).await;
                }
                Ok(None) => {
                    debug!("Connection closed by player {}", id);
                    break;
                }
                Err(e) if e.is_fatal() => {
                    warn!("Read failure on player {}: {}", id, e);
                    break;
                }
                Err(e) => warn!("Dropping message from player {}: {}", id, e),
            },
        }
    }

    state.unregister(id).await;
}

async fn handle_frame(id: PlayerId, frame: &str, state: &RelayState) {
    let update = match decode_update(frame) {
        Ok(update) => update,
        Err(e) => {
            warn!("Could not parse message from player {}: {}", id, e);
            return;
        }
    };

    let entry = update.into_entry(id);
    debug!("Player {} reported {} pumps as {}", id, entry.pumps, entry.id);

    match state.record_and_broadcast(entry).await {
        Ok(snapshot) => debug!("Leaderboard now {:?}", snapshot),
        Err(e) => error!("Failed to broadcast leaderboard: {}", e),
    }
}

/// Control handle for a relay running on a background task
///
/// Dropping the handle without calling `shutdown` also stops the relay.
pub struct RelayHandle {
    local_addr: SocketAddr,
    state: Arc<RelayState>,
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<Result<(), ServerError>>,
}

impl RelayHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn connected_players(&self) -> usize {
        self.state.connected_players().await
    }

    pub async fn leaderboard(&self) -> Snapshot {
        self.state.snapshot().await
    }

    /// Stops accepting, closes every connection and waits for the accept
    /// loop to finish.
    pub async fn shutdown(self) -> Result<(), ServerError> {
        let _ = self.stop_tx.send(());
        self.task.await?
    }
}

/// Binds a relay and runs it on the current tokio runtime.
pub async fn start(config: RelayConfig) -> Result<RelayHandle, ServerError> {
    let server = RelayServer::bind(config).await?;
    let local_addr = server.local_addr()?;
    let state = server.state();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(server.run_until(async move {
        let _ = stop_rx.await;
    }));

    Ok(RelayHandle {
        local_addr,
        state,
        stop_tx,
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::OUTBOX_CAPACITY;
    use shared::framing::{decode_snapshot, is_rejection};
    use tokio::io::AsyncBufReadExt;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn small_config(max_connections: usize) -> RelayConfig {
        RelayConfig {
            max_connections,
            ..RelayConfig::local_ephemeral()
        }
    }

    async fn read_line(reader: &mut BufReader<TcpStream>) -> String {
        let mut line = String::new();
        timeout(WAIT, reader.read_line(&mut line))
            .await
            .expect("timed out waiting for the relay")
            .unwrap();
        line
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_registered() {
        let state = RelayState::new(4, 8);
        let (tx1, mut rx1) = outbox_channel();
        let (tx2, mut rx2) = outbox_channel();
        state.register(addr(), tx1).await.unwrap();
        state.register(addr(), tx2).await.unwrap();

        let snapshot = state
            .record_and_broadcast(LeaderboardEntry::new("1", 5))
            .await
            .unwrap();
        assert_eq!(snapshot, vec![LeaderboardEntry::new("1", 5)]);

        let expected = "[{\"id\":\"1\",\"pumps\":5}]\n";
        assert_eq!(&*rx1.recv().await.unwrap(), expected);
        assert_eq!(&*rx2.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_dead_recipient_is_unregistered() {
        let state = RelayState::new(4, 8);
        let (tx1, rx1) = outbox_channel();
        let (tx2, mut rx2) = outbox_channel();
        let dead = state.register(addr(), tx1).await.unwrap();
        let alive = state.register(addr(), tx2).await.unwrap();
        drop(rx1);

        state
            .record_and_broadcast(LeaderboardEntry::new("x", 1))
            .await
            .unwrap();

        assert_eq!(state.player_ids().await, vec![alive]);
        assert!(!state.player_ids().await.contains(&dead));
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_lagging_recipient_is_unregistered() {
        let state = RelayState::new(4, 8);
        let (tx1, _stalled_rx) = outbox_channel();
        let (tx2, mut rx2) = outbox_channel();
        let stalled = state.register(addr(), tx1).await.unwrap();
        let alive = state.register(addr(), tx2).await.unwrap();

        for pumps in 0..OUTBOX_CAPACITY as u64 {
            state
                .record_and_broadcast(LeaderboardEntry::new("x", pumps))
                .await
                .unwrap();
            assert!(rx2.recv().await.is_some());
        }
        assert_eq!(state.player_ids().await, vec![stalled, alive]);

        // One broadcast past the limit drops the player that never drained.
        state
            .record_and_broadcast(LeaderboardEntry::new("x", 1000))
            .await
            .unwrap();

        assert_eq!(state.player_ids().await, vec![alive]);
        assert!(!state.is_registered(stalled).await);
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_bind_error() {
        let first = RelayServer::bind(RelayConfig::local_ephemeral())
            .await
            .unwrap();
        let taken = first.local_addr().unwrap();

        let config = RelayConfig {
            port: taken.port(),
            ..RelayConfig::local_ephemeral()
        };
        match RelayServer::bind(config).await {
            Err(ServerError::Bind { addr, .. }) => assert_eq!(addr, taken),
            other => panic!("expected bind error, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_advertised_addr() {
        let loopback = RelayServer::bind(RelayConfig::local_ephemeral())
            .await
            .unwrap();
        assert_eq!(
            loopback.advertised_addr().await.unwrap(),
            loopback.local_addr().unwrap()
        );

        let everywhere = RelayServer::bind(RelayConfig {
            bind_address: std::net::Ipv4Addr::UNSPECIFIED.into(),
            ..RelayConfig::local_ephemeral()
        })
        .await
        .unwrap();
        let advertised = everywhere.advertised_addr().await.unwrap();
        assert!(!advertised.ip().is_unspecified());
        assert_eq!(advertised.port(), everywhere.local_addr().unwrap().port());
    }

    #[tokio::test]
    async fn test_invalid_config_is_refused() {
        let config = RelayConfig {
            max_connections: 0,
            ..RelayConfig::local_ephemeral()
        };
        assert!(matches!(
            RelayServer::bind(config).await,
            Err(ServerError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_update_over_tcp_is_echoed() {
        let relay = start(small_config(2)).await.unwrap();
        let stream = TcpStream::connect(relay.local_addr()).await.unwrap();
        let mut reader = BufReader::new(stream);

        reader
            .get_mut()
            .write_all(b"{\"id\":\"1\",\"pumps\":5}\n")
            .await
            .unwrap();

        let line = read_line(&mut reader).await;
        assert_eq!(
            decode_snapshot(line.trim_end()).unwrap(),
            vec![LeaderboardEntry::new("1", 5)]
        );

        relay.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_anonymous_update_uses_player_id() {
        let relay = start(small_config(2)).await.unwrap();
        let stream = TcpStream::connect(relay.local_addr()).await.unwrap();
        let mut reader = BufReader::new(stream);

        reader.get_mut().write_all(b"{\"pumps\":3}\n").await.unwrap();

        let line = read_line(&mut reader).await;
        assert_eq!(
            decode_snapshot(line.trim_end()).unwrap(),
            vec![LeaderboardEntry::new(1u64, 3)]
        );

        relay.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_full_relay_rejects_with_notice() {
        let relay = start(small_config(1)).await.unwrap();

        let _first = TcpStream::connect(relay.local_addr()).await.unwrap();
        // Make sure the first connection is registered before the second arrives.
        timeout(WAIT, async {
            while relay.connected_players().await < 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let second = TcpStream::connect(relay.local_addr()).await.unwrap();
        let mut reader = BufReader::new(second);
        let line = read_line(&mut reader).await;
        assert!(is_rejection(&line));

        // The relay closes the rejected socket right after the notice.
        assert!(read_line(&mut reader).await.is_empty());
        assert_eq!(relay.connected_players().await, 1);

        relay.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_closes_connections() {
        let relay = start(small_config(2)).await.unwrap();
        let stream = TcpStream::connect(relay.local_addr()).await.unwrap();
        let mut reader = BufReader::new(stream);

        timeout(WAIT, async {
            while relay.connected_players().await < 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        relay.shutdown().await.unwrap();

        // EOF once the writer task drops its half.
        assert!(read_line(&mut reader).await.is_empty());
    }
}
