//! Relay client: sends score updates and caches the pushed leaderboard
//!
//! `connect` splits the TCP stream. The write half stays with the caller for
//! `send_update`; the read half moves into a background listener task that
//! replaces the cached leaderboard whenever the relay pushes a new one. The
//! presentation loop therefore never waits on the network to draw a ranking.

use crate::error::ClientError;
use log::{debug, error, info, warn};
use shared::framing::{decode_snapshot, encode_frame, is_rejection, read_frame};
use shared::{PlayerTag, ScoreUpdate, Snapshot};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Flags the listener task reports back through.
#[derive(Debug, Default)]
struct ListenerStatus {
    stopped: AtomicBool,
    rejected: AtomicBool,
}

pub struct RelayClient {
    tag: Option<PlayerTag>,
    server_addr: SocketAddr,
    writer: Mutex<Option<OwnedWriteHalf>>,
    leaderboard: watch::Receiver<Snapshot>,
    status: Arc<ListenerStatus>,
    stop_tx: watch::Sender<bool>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl RelayClient {
    /// Connects without a player tag; the relay labels this player's scores
    /// with the identifier it assigns to the connection.
    pub async fn connect<A>(addr: A) -> Result<Self, ClientError>
    where
        A: ToSocketAddrs + fmt::Display,
    {
        Self::connect_as(addr, None).await
    }

    /// Connects and labels every update with `tag`. There is no retry; a
    /// failed connect is reported once as `ClientError::Connect`.
    pub async fn connect_as<A>(addr: A, tag: Option<PlayerTag>) -> Result<Self, ClientError>
    where
        A: ToSocketAddrs + fmt::Display,
    {
        let label = addr.to_string();
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: label.clone(),
                source,
            })?;
        let server_addr = stream
            .peer_addr()
            .map_err(|source| ClientError::Connect {
                addr: label,
                source,
            })?;
        let _ = stream.set_nodelay(true);
        info!("Connected to relay at {}", server_addr);

        let (read_half, write_half) = stream.into_split();
        let (board_tx, board_rx) = watch::channel(Snapshot::new());
        let (stop_tx, stop_rx) = watch::channel(false);
        let status = Arc::new(ListenerStatus::default());

        let listener = tokio::spawn(listen_for_updates(
            BufReader::new(read_half),
            board_tx,
            Arc::clone(&status),
            stop_rx,
        ));

        Ok(Self {
            tag,
            server_addr,
            writer: Mutex::new(Some(write_half)),
            leaderboard: board_rx,
            status,
            stop_tx,
            listener: Mutex::new(Some(listener)),
        })
    }

    pub fn tag(&self) -> Option<&PlayerTag> {
        self.tag.as_ref()
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Reports a finished trial. Failures are logged, never returned, so a
    /// dropped network cannot interrupt the experiment.
    pub async fn send_update(&self, pumps: u64) {
        if let Err(e) = self.try_send_update(pumps).await {
            error!("Sending failed: {}", e);
        }
    }

    pub async fn try_send_update(&self, pumps: u64) -> Result<(), ClientError> {
        let frame = encode_frame(&ScoreUpdate::new(self.tag.clone(), pumps))?;

        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or(ClientError::Closed)?;
        writer
            .write_all(frame.as_bytes())
            .await
            .map_err(ClientError::Send)?;

        debug!("Sent {} pumps", pumps);
        Ok(())
    }

    /// Latest leaderboard pushed by the relay, empty until the first push.
    pub fn get_leaderboard(&self) -> Snapshot {
        self.leaderboard.borrow().clone()
    }

    /// Receiver that is notified every time a new leaderboard arrives.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.leaderboard.clone()
    }

    /// True once the listener has exited, whether the relay went away or
    /// `close` was called. The cached leaderboard stays readable.
    pub fn is_stopped(&self) -> bool {
        self.status.stopped.load(Ordering::SeqCst)
    }

    /// True if the relay turned this connection away because it was full.
    pub fn was_rejected(&self) -> bool {
        self.status.rejected.load(Ordering::SeqCst)
    }

    /// Stops the listener and closes the socket. Later sends fail with
    /// `ClientError::Closed`; calling `close` again is a no-op.
    pub async fn close(&self) {
        self.stop_tx.send_replace(true);

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!("Error shutting down relay connection: {}", e);
            }
        }

        if let Some(listener) = self.listener.lock().await.take() {
            if let Err(e) = listener.await {
                warn!("Leaderboard listener ended abnormally: {}", e);
            }
        }
    }
}

/// Background task: replaces the cached leaderboard with every pushed one.
async fn listen_for_updates(
    mut reader: BufReader<OwnedReadHalf>,
    board: watch::Sender<Snapshot>,
    status: Arc<ListenerStatus>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            frame = read_frame(&mut reader) => match frame {
                Ok(Some(frame)) if is_rejection(&frame) => {
                    warn!("Relay refused the connection: {}", frame.trim());
                    status.rejected.store(true, Ordering::SeqCst);
                }
                Ok(Some(frame)) => match decode_snapshot(&frame) {
                    Ok(snapshot) => {
                        debug!("Leaderboard update: {:?}", snapshot);
                        board.send_replace(snapshot);
                    }
                    Err(e) => warn!("Ignoring leaderboard push: {}", e),
                },
                Ok(None) => {
                    info!("Relay closed the connection");
                    break;
                }
                Err(e) if e.is_fatal() => {
                    error!("Listening failed: {}", e);
                    break;
                }
                Err(e) => warn!("Ignoring leaderboard push: {}", e),
            },
        }
    }

    status.stopped.store(true, Ordering::SeqCst);
}
