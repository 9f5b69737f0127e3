// ============================================
// File: crates/corelink-service/src/service.rs
// ============================================
//! # Link Service Driver
//!
//! ## Creation Reason
//! `CoreState` is synchronous and single-owner. This module gives it a
//! home on one tokio task and feeds it transport events, due timers and
//! requests from local clients.
//!
//! ## Main Functionality
//! - `LinkService`: owns the state and the event loop
//! - `ServiceHandle`: cloneable front door for clients and key exchange
//! - Frame flushing: granted frames are written through the `Link`
//!
//! ## Event Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      LinkService::run                       │
//! │                                                             │
//! │   shutdown_rx ──┐                                           │
//! │   link events ──┼──► tokio::select! ──► CoreState ──┐       │
//! │   commands ─────┤                                   │       │
//! │   next timer ───┘                                   ▼       │
//! │                                      take_outgoing → send   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Outgoing frames are flushed before every wait, never inside a branch
//! - A fatal transport error ends the loop like a shutdown signal
//!
//! ## Last Modified
//! v0.1.0 - Initial driver

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use corelink_common::PeerId;
use corelink_transport::Link;

use crate::state::{CoreState, PeerInfo};
use crate::error::{Result, ServiceError};
use crate::services::admission::{ClientId, ClientOptions};
use crate::services::handshake::HandshakeEvent;

// ============================================
// Commands
// ============================================

/// Requests carried from a [`ServiceHandle`] to the event loop.
#[derive(Debug)]
enum Command {
    Enqueue {
        peer: PeerId,
        payload: Bytes,
        priority: u32,
        deadline: Instant,
        reply: oneshot::Sender<Result<()>>,
    },
    ClientConnect {
        client: ClientId,
        options: ClientOptions,
        types: Vec<u16>,
    },
    ClientDisconnect {
        client: ClientId,
    },
    RequestSend {
        client: ClientId,
        peer: PeerId,
        size: usize,
        priority: u32,
        request_id: u32,
        reply: oneshot::Sender<Result<()>>,
    },
    CancelSend {
        client: ClientId,
        peer: PeerId,
    },
    PeerInfo {
        peer: PeerId,
        limit_outbound: u32,
        reserve_inbound: i32,
        preference_change: u64,
        reply: oneshot::Sender<PeerInfo>,
    },
    Connect {
        peer: PeerId,
        reply: oneshot::Sender<Result<()>>,
    },
    Handshake {
        peer: PeerId,
        event: HandshakeEvent,
    },
}

// ============================================
// ServiceHandle
// ============================================

/// Cloneable access to a running [`LinkService`].
///
/// Every call fails with `ShuttingDown` once the loop has exited.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    commands: mpsc::UnboundedSender<Command>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ServiceHandle {
    fn submit(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| ServiceError::ShuttingDown)
    }

    async fn ask<T>(&self, command: Command, reply: oneshot::Receiver<T>) -> Result<T> {
        self.submit(command)?;
        reply.await.map_err(|_| ServiceError::ShuttingDown)
    }

    /// Queues one message for `peer`.
    ///
    /// # Errors
    /// Whatever [`CoreState::enqueue_plaintext`] returns, or `ShuttingDown`.
    pub async fn enqueue(
        &self,
        peer: PeerId,
        payload: Bytes,
        priority: u32,
        deadline: Instant,
    ) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.ask(
            Command::Enqueue {
                peer,
                payload,
                priority,
                deadline,
                reply,
            },
            rx,
        )
        .await?
    }

    /// Registers a local client.
    ///
    /// # Errors
    /// `ShuttingDown` if the loop is gone.
    pub fn client_connect(&self, client: ClientId, options: ClientOptions, types: &[u16]) -> Result<()> {
        self.submit(Command::ClientConnect {
            client,
            options,
            types: types.to_vec(),
        })
    }

    /// Unregisters a local client.
    ///
    /// # Errors
    /// `ShuttingDown` if the loop is gone.
    pub fn client_disconnect(&self, client: ClientId) -> Result<()> {
        self.submit(Command::ClientDisconnect { client })
    }

    /// Asks for a send slot towards `peer`.
    ///
    /// # Errors
    /// Whatever [`CoreState::client_request_send`] returns, or `ShuttingDown`.
    pub async fn request_send(
        &self,
        client: ClientId,
        peer: PeerId,
        size: usize,
        priority: u32,
        request_id: u32,
    ) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.ask(
            Command::RequestSend {
                client,
                peer,
                size,
                priority,
                request_id,
                reply,
            },
            rx,
        )
        .await?
    }

    /// Withdraws a pending send request.
    ///
    /// # Errors
    /// `ShuttingDown` if the loop is gone.
    pub fn cancel_send(&self, client: ClientId, peer: PeerId) -> Result<()> {
        self.submit(Command::CancelSend { client, peer })
    }

    /// Adjusts and reports bandwidth information for `peer`.
    ///
    /// # Errors
    /// `ShuttingDown` if the loop is gone.
    pub async fn peer_info(
        &self,
        peer: PeerId,
        limit_outbound: u32,
        reserve_inbound: i32,
        preference_change: u64,
    ) -> Result<PeerInfo> {
        let (reply, rx) = oneshot::channel();
        self.ask(
            Command::PeerInfo {
                peer,
                limit_outbound,
                reserve_inbound,
                preference_change,
                reply,
            },
            rx,
        )
        .await
    }

    /// Asks the transport to connect to `peer`.
    ///
    /// # Errors
    /// `LocalPeer` for our own identity, or `ShuttingDown`.
    pub async fn connect(&self, peer: PeerId) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.ask(Command::Connect { peer, reply }, rx).await?
    }

    /// Forwards a key exchange transition.
    ///
    /// # Errors
    /// `ShuttingDown` if the loop is gone.
    pub fn handshake_event(&self, peer: PeerId, event: HandshakeEvent) -> Result<()> {
        self.submit(Command::Handshake { peer, event })
    }

    /// Asks the loop to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

// ============================================
// LinkService
// ============================================

/// The link layer running on a `Link`.
///
/// # Lifecycle
/// 1. Create with `LinkService::new(state, link)`
/// 2. Keep a `handle()` for clients
/// 3. `run().await` until `ServiceHandle::shutdown` or a fatal link error
pub struct LinkService {
    state: CoreState,
    link: Arc<dyn Link>,
    commands: mpsc::UnboundedReceiver<Command>,
    shutdown_rx: broadcast::Receiver<()>,
    handle: ServiceHandle,
}

impl LinkService {
    /// Wraps `state` and the event side of its transport.
    #[must_use]
    pub fn new(state: CoreState, link: Arc<dyn Link>) -> Self {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        Self {
            state,
            link,
            commands,
            shutdown_rx,
            handle: ServiceHandle {
                commands: commands_tx,
                shutdown_tx,
            },
        }
    }

    /// Handle for clients of this service.
    #[must_use]
    pub fn handle(&self) -> ServiceHandle {
        self.handle.clone()
    }

    /// Runs the event loop. Returns the final state after shutdown.
    ///
    /// # Errors
    /// Errors from shutting down the link.
    pub async fn run(self) -> Result<CoreState> {
        let Self {
            mut state,
            link,
            mut commands,
            mut shutdown_rx,
            handle,
        } = self;
        drop(handle);
        info!(peer = %state.local_peer(), "Link service started");

        loop {
            flush(&mut state, link.as_ref()).await;
            let next_timer = state.next_deadline();

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("Link service received shutdown signal");
                    break;
                }
                event = link.next_event() => match event {
                    Ok(event) => state.on_transport_event(event),
                    Err(e) if e.is_fatal() => {
                        info!(error = %e, "Transport closed");
                        break;
                    }
                    Err(e) => warn!(error = %e, "Transport event error"),
                },
                command = commands.recv() => match command {
                    Some(command) => apply(&mut state, command),
                    None => {
                        debug!("All service handles dropped");
                        break;
                    }
                },
                () = sleep_until(next_timer) => state.run_due(Instant::now()),
            }
        }

        flush(&mut state, link.as_ref()).await;
        state.shutdown();
        if let Err(e) = link.shutdown().await {
            error!(error = %e, "Link shutdown failed");
            return Err(e.into());
        }
        info!("Link service stopped");
        Ok(state)
    }
}

impl std::fmt::Debug for LinkService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkService")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

// ============================================
// Loop Helpers
// ============================================

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn flush(state: &mut CoreState, link: &dyn Link) {
    for (peer, frame) in state.take_outgoing() {
        if let Err(e) = link.send(&peer, frame).await {
            warn!(peer = %peer, error = %e, "Failed to write frame");
            state.on_send_error(peer);
        }
    }
}

fn apply(state: &mut CoreState, command: Command) {
    match command {
        Command::Enqueue {
            peer,
            payload,
            priority,
            deadline,
            reply,
        } => {
            let _ = reply.send(state.enqueue_plaintext(peer, payload, priority, deadline));
        }
        Command::ClientConnect {
            client,
            options,
            types,
        } => state.client_connect(client, options, &types),
        Command::ClientDisconnect { client } => state.client_disconnect(client),
        Command::RequestSend {
            client,
            peer,
            size,
            priority,
            request_id,
            reply,
        } => {
            let _ = reply.send(state.client_request_send(client, peer, size, priority, request_id));
        }
        Command::CancelSend { client, peer } => {
            state.client_cancel_send(client, &peer);
        }
        Command::PeerInfo {
            peer,
            limit_outbound,
            reserve_inbound,
            preference_change,
            reply,
        } => {
            let _ = reply.send(state.request_peer_info(
                peer,
                limit_outbound,
                reserve_inbound,
                preference_change,
            ));
        }
        Command::Connect { peer, reply } => {
            let _ = reply.send(state.request_connect(peer));
        }
        Command::Handshake { peer, event } => state.on_handshake_event(peer, event),
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use corelink_transport::MemoryTransport;

    use crate::config::CoreConfig;
    use crate::state::Collaborators;
    use crate::services::admission::{ClientNotification, ClientOutbox};
    use crate::services::handshake::RecordingKeyExchange;
    use crate::stats::InMemoryStats;

    fn service() -> (LinkService, Arc<ClientOutbox>) {
        let local = PeerId::new([1; 32]);
        let transport = Arc::new(MemoryTransport::new(local));
        let outbox = Arc::new(ClientOutbox::new());
        let state = CoreState::new(
            local,
            CoreConfig::default(),
            Collaborators {
                transport: transport.clone(),
                key_exchange: Arc::new(RecordingKeyExchange::new()),
                clients: outbox.clone(),
                stats: Arc::new(InMemoryStats::new()),
            },
        );
        (LinkService::new(state, transport), outbox)
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop() {
        let (service, _) = service();
        let handle = service.handle();
        let task = tokio::spawn(service.run());

        handle.shutdown();
        let state = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(state.neighbour_count(), 0);
        assert!(matches!(
            handle.connect(PeerId::new([2; 32])).await,
            Err(ServiceError::ShuttingDown)
        ));
    }

    #[tokio::test]
    async fn test_loopback_send_through_handle() {
        let (service, outbox) = service();
        let local = PeerId::new([1; 32]);
        let handle = service.handle();
        let task = tokio::spawn(service.run());

        let client = ClientId(7);
        handle
            .client_connect(client, ClientOptions::default(), &[1000])
            .unwrap();
        handle.request_send(client, local, 8, 1, 42).await.unwrap();
        handle
            .enqueue(local, Bytes::from_static(&[0, 8, 0x03, 0xE8, 1, 2, 3, 4]), 1, Instant::now())
            .await
            .unwrap();
        handle.shutdown();
        task.await.unwrap().unwrap();

        let seen = outbox.take_for(client);
        assert!(matches!(
            seen[0],
            ClientNotification::SendReady { request_id: 42, size: 8, .. }
        ));
        assert!(matches!(
            &seen[1],
            ClientNotification::Inbound { header_only: false, message, .. } if message.len() == 8
        ));
    }
}
