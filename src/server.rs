//! Server listener (spec §4.6).
//!
//! The teacher's `start_server_with_config` pushes every new connection
//! straight onto one `mpsc::Sender<Event>`, so the accept loop and all
//! per-connection events share a single unbounded-feeling channel. spec §4.6
//! asks for the queue-based model
//! `original_source/source/websocketserver.cpp` actually implements:
//! `m_pendingConnections` is a bounded `QQueue`, `addPendingConnection` drops
//! the connection if the queue is already at `maxPendingConnections()`, and
//! `nextPendingConnection()` lets the caller pull finished handshakes at
//! their own pace. This rewrite keeps the teacher's `tokio::spawn` accept
//! loop and TLS wiring but replaces the single event channel with that
//! bounded queue.

use crate::close::CloseCode;
use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::Error;
use crate::event::ServerEvent;
use crate::handshake::accept_async_tls;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Pending-connection bookkeeping shared between the accept loop, the
/// in-flight handshake tasks it spawns, and `next_pending_connection`.
/// `in_flight` reserves a slot for a handshake that hasn't finished yet, so
/// capacity is enforced the instant a socket is accepted rather than after
/// the (slow) handshake completes.
struct Occupancy {
    queue: VecDeque<Connection>,
    in_flight: usize,
}

impl Occupancy {
    fn len(&self) -> usize {
        self.queue.len() + self.in_flight
    }
}

/// A WebSocket listener with a bounded FIFO of connections that finished
/// their handshake but haven't yet been claimed by the caller.
pub struct Server {
    occupancy: Arc<Mutex<Occupancy>>,
    events: mpsc::Receiver<ServerEvent>,
    event_tx: mpsc::Sender<ServerEvent>,
    accept_task: JoinHandle<()>,
    max_pending_connections: usize,
    local_addr: std::net::SocketAddr,
}

impl Server {
    /// Binds `address:port` and starts the accept loop in a background
    /// task. Mirrors the teacher's `start_server_with_config`, now yielding
    /// a `Server` handle instead of an `EventStream`.
    pub async fn listen(address: &str, port: u16, config: ServerConfig) -> Result<Self, Error> {
        let listener = TcpListener::bind(format!("{address}:{port}")).await?;
        let local_addr = listener.local_addr()?;
        let (event_tx, event_rx) = mpsc::channel(256);
        let occupancy = Arc::new(Mutex::new(Occupancy {
            queue: VecDeque::new(),
            in_flight: 0,
        }));
        let max_pending_connections = config.max_pending_connections;

        let accept_occupancy = occupancy.clone();
        let handshake_timeout = config.handshake_timeout;
        let config = Arc::new(config);
        let accept_event_tx = event_tx.clone();

        let accept_task = tokio::spawn(async move {
            loop {
                let (tcp, _addr) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        let _ = accept_event_tx.send(ServerEvent::AcceptError(err.into())).await;
                        continue;
                    }
                };

                // Reserve a slot (or reject outright) before doing any
                // handshake I/O: spec §4.6 "no additional accepts are
                // processed until space frees" — a socket accepted while at
                // capacity never gets a handshake, so the peer observes a
                // dropped connection instead of a completed upgrade.
                {
                    let mut occupancy = accept_occupancy.lock().await;
                    if occupancy.len() >= config.max_pending_connections {
                        drop(occupancy);
                        drop(tcp);
                        let _ = accept_event_tx
                            .send(ServerEvent::ServerError(Some(CloseCode::AbnormalDisconnection)))
                            .await;
                        continue;
                    }
                    occupancy.in_flight += 1;
                }

                let config = config.clone();
                let occupancy = accept_occupancy.clone();
                let event_tx = accept_event_tx.clone();

                tokio::spawn(async move {
                    let handshake = accept_async_tls(tcp, &config);
                    let connection = match timeout(handshake_timeout, handshake).await {
                        Ok(Ok(connection)) => connection,
                        Ok(Err(err)) => {
                            occupancy.lock().await.in_flight -= 1;
                            let _ = event_tx.send(ServerEvent::AcceptError(err)).await;
                            return;
                        }
                        Err(_) => {
                            // Handshake took too long; drop the connection
                            // silently, matching websocketserver_p's
                            // per-socket handshake timer.
                            occupancy.lock().await.in_flight -= 1;
                            return;
                        }
                    };

                    let mut occupancy = occupancy.lock().await;
                    occupancy.in_flight -= 1;
                    occupancy.queue.push_back(connection);
                    drop(occupancy);
                    let _ = event_tx.send(ServerEvent::NewConnection).await;
                });
            }
        });

        Ok(Self {
            occupancy,
            events: event_rx,
            event_tx,
            accept_task,
            max_pending_connections,
            local_addr,
        })
    }

    /// The address the listener is bound to. Useful when `listen` was called
    /// with port `0` and the caller needs to know which port the OS picked.
    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }

    /// Pops the oldest handshaked connection off the pending queue, if any.
    pub async fn next_pending_connection(&self) -> Option<Connection> {
        self.occupancy.lock().await.queue.pop_front()
    }

    pub async fn has_pending_connections(&self) -> bool {
        !self.occupancy.lock().await.queue.is_empty()
    }

    pub fn max_pending_connections(&self) -> usize {
        self.max_pending_connections
    }

    /// Awaits the next server-level event (new connection available, accept
    /// error, origin rejection, etc).
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        self.events.recv().await
    }

    pub fn is_listening(&self) -> bool {
        !self.accept_task.is_finished()
    }

    /// Tears down the listening socket and reports it. spec §4.6: "emit
    /// `closed` after the listening socket is down" — the accept task is
    /// aborted and awaited before `ServerEvent::Closed` goes out, so the
    /// event is never observed ahead of the socket actually closing.
    pub async fn close(&mut self) {
        self.accept_task.abort();
        let _ = (&mut self.accept_task).await;
        let _ = self.event_tx.send(ServerEvent::Closed).await;
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}
