// ============================================
// File: crates/corelink-service/tests/link.rs
// ============================================
//! End-to-end behaviour of two nodes wired through linked
//! `MemoryTransport`s, with key offers handed across by the test.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use corelink_common::PeerId;
use corelink_service::services::admission::{ClientId, ClientNotification, ClientOptions, ClientOutbox};
use corelink_service::services::handshake::{HandshakeEvent, HandshakeState, RecordingKeyExchange};
use corelink_service::stats::{self, InMemoryStats};
use corelink_service::{Collaborators, CoreConfig, CoreState, ServiceError};
use corelink_transport::{Link, MemoryTransport, TransportEvent};

// ============================================
// Harness
// ============================================

struct Node {
    id: PeerId,
    state: CoreState,
    transport: Arc<MemoryTransport>,
    keys: Arc<RecordingKeyExchange>,
    outbox: Arc<ClientOutbox>,
    stats: Arc<InMemoryStats>,
}

fn node(seed: u8) -> Node {
    let id = PeerId::new([seed; 32]);
    let transport = Arc::new(MemoryTransport::new(id));
    let keys = Arc::new(RecordingKeyExchange::new());
    let outbox = Arc::new(ClientOutbox::new());
    let stats = Arc::new(InMemoryStats::new());
    let state = CoreState::new(
        id,
        CoreConfig::default(),
        Collaborators {
            transport: transport.clone(),
            key_exchange: keys.clone(),
            clients: outbox.clone(),
            stats: stats.clone(),
        },
    );
    Node {
        id,
        state,
        transport,
        keys,
        outbox,
        stats,
    }
}

fn hand_over_keys(from: &Node, to: &mut Node) -> bool {
    let offers = from.keys.take();
    let progressed = !offers.is_empty();
    for offer in offers {
        if offer.peer == to.id {
            to.state.on_handshake_event(
                from.id,
                HandshakeEvent::KeyReceived {
                    key: offer.key,
                    created: offer.created,
                    sender_state: offer.state,
                },
            );
        }
    }
    progressed
}

async fn drain(node: &mut Node) -> bool {
    let mut progressed = false;
    while node.transport.pending_events() > 0 {
        let event = node.transport.next_event().await.unwrap();
        node.state.on_transport_event(event);
        progressed = true;
    }
    for (peer, frame) in node.state.take_outgoing() {
        node.transport.send(&peer, frame).await.unwrap();
        progressed = true;
    }
    progressed
}

/// Moves keys, events and frames until both nodes are quiet.
async fn pump(a: &mut Node, b: &mut Node) {
    for _ in 0..64 {
        let mut progressed = hand_over_keys(a, b);
        progressed |= hand_over_keys(b, a);
        progressed |= drain(a).await;
        progressed |= drain(b).await;
        if !progressed {
            return;
        }
    }
    panic!("nodes never went quiet");
}

async fn tick(a: &mut Node, b: &mut Node, by: Duration) {
    tokio::time::advance(by).await;
    let now = Instant::now();
    a.state.run_due(now);
    b.state.run_due(now);
    pump(a, b).await;
}

/// Confirmed pair with no time elapsed since the handshake.
async fn fresh_pair() -> (Node, Node) {
    let mut a = node(1);
    let mut b = node(2);
    MemoryTransport::connect(&a.transport, &b.transport);
    pump(&mut a, &mut b).await;
    (a, b)
}

async fn confirmed_pair() -> (Node, Node) {
    let pair = fresh_pair().await;
    tokio::time::advance(Duration::from_secs(1)).await;
    pair
}

fn message(msg_type: u16, body_len: usize, fill: u8) -> Bytes {
    let size = u16::try_from(4 + body_len).unwrap();
    let mut out = size.to_be_bytes().to_vec();
    out.extend_from_slice(&msg_type.to_be_bytes());
    out.resize(4 + body_len, fill);
    Bytes::from(out)
}

fn inbound_payloads(notifications: &[ClientNotification]) -> Vec<Bytes> {
    notifications
        .iter()
        .filter_map(|n| match n {
            ClientNotification::Inbound { message, .. } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

fn subscribe(node: &mut Node, client: ClientId, options: ClientOptions, types: &[u16]) {
    node.state.client_connect(client, options, types);
}

// ============================================
// Handshake
// ============================================

#[tokio::test(start_paused = true)]
async fn test_handshake_confirms_both_sides() {
    let mut a = node(1);
    let mut b = node(2);
    let watcher = ClientId(1);
    subscribe(
        &mut a,
        watcher,
        ClientOptions {
            connect: true,
            ..ClientOptions::default()
        },
        &[],
    );

    MemoryTransport::connect(&a.transport, &b.transport);
    pump(&mut a, &mut b).await;

    assert_eq!(a.state.neighbour(&b.id).unwrap().state, HandshakeState::KeyConfirmed);
    assert_eq!(b.state.neighbour(&a.id).unwrap().state, HandshakeState::KeyConfirmed);
    assert_eq!(a.stats.get(stats::KEYS_CONFIRMED), 1);
    assert_eq!(b.stats.get(stats::KEYS_CONFIRMED), 1);
    assert!(a
        .outbox
        .take_for(watcher)
        .iter()
        .any(|n| matches!(n, ClientNotification::Connect { peer, .. } if *peer == b.id)));
}

#[tokio::test(start_paused = true)]
async fn test_frames_before_key_are_dropped_and_retry_recovers() {
    let mut a = node(1);
    let mut b = node(2);
    MemoryTransport::connect(&a.transport, &b.transport);

    // Both first key offers are lost; the PINGs sent with them are undecryptable.
    drain(&mut a).await;
    drain(&mut b).await;
    a.keys.take();
    b.keys.take();
    pump(&mut a, &mut b).await;

    assert_eq!(a.stats.get(stats::FRAMES_WITHOUT_KEY), 1);
    assert_eq!(b.stats.get(stats::FRAMES_WITHOUT_KEY), 1);
    assert_eq!(a.state.neighbour(&b.id).unwrap().state, HandshakeState::KeySent);

    tick(&mut a, &mut b, CoreConfig::default().timers.set_key_retry()).await;

    assert!(a.state.neighbour(&b.id).unwrap().state.is_confirmed());
    assert!(b.state.neighbour(&a.id).unwrap().state.is_confirmed());
}

#[tokio::test(start_paused = true)]
async fn test_reset_notifies_and_rekeys() {
    let (mut a, mut b) = confirmed_pair().await;
    let watcher = ClientId(3);
    subscribe(
        &mut a,
        watcher,
        ClientOptions {
            disconnect: true,
            ..ClientOptions::default()
        },
        &[],
    );

    a.state.on_handshake_event(b.id, HandshakeEvent::Reset);

    assert!(a
        .outbox
        .take_for(watcher)
        .iter()
        .any(|n| matches!(n, ClientNotification::Disconnect { peer } if *peer == b.id)));
    let offers = a.keys.take();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].state, HandshakeState::KeySent);
    assert_eq!(a.state.neighbour(&b.id).unwrap().last_sequence_number_sent, 1);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_handshake_reported_as_status_change() {
    let mut a = node(1);
    let mut b = node(2);
    let watcher = ClientId(4);
    subscribe(
        &mut a,
        watcher,
        ClientOptions {
            status_change: true,
            ..ClientOptions::default()
        },
        &[],
    );
    MemoryTransport::connect(&a.transport, &b.transport);

    // Keys never cross, so neither side can confirm.
    drain(&mut a).await;
    drain(&mut b).await;
    a.keys.take();
    b.keys.take();
    drain(&mut a).await;
    assert!(a.outbox.take_for(watcher).is_empty());

    tokio::time::advance(a.state.config().timers.set_key_retry()).await;
    a.state.run_due(Instant::now());

    let seen = a.outbox.take_for(watcher);
    assert!(seen
        .iter()
        .any(|n| matches!(n, ClientNotification::StatusChange { peer, .. } if *peer == b.id)));
    assert_eq!(a.keys.take().len(), 1);
    assert_eq!(a.state.neighbour(&b.id).unwrap().state, HandshakeState::KeySent);
    assert!(a.stats.get(stats::STATUS_CHANGES) >= 1);
}

// ============================================
// Delivery
// ============================================

#[tokio::test(start_paused = true)]
async fn test_message_delivered_after_handshake() {
    let (mut a, mut b) = confirmed_pair().await;
    let reader = ClientId(10);
    let observer = ClientId(11);
    subscribe(&mut b, reader, ClientOptions::default(), &[1000]);
    subscribe(
        &mut a,
        observer,
        ClientOptions {
            full_outbound: true,
            ..ClientOptions::default()
        },
        &[],
    );

    let payload = message(1000, 60, 0x5A);
    a.state
        .enqueue_plaintext(b.id, payload.clone(), 10, Instant::now())
        .unwrap();
    pump(&mut a, &mut b).await;

    assert_eq!(inbound_payloads(&b.outbox.take_for(reader)), vec![payload.clone()]);
    assert!(matches!(
        &a.outbox.take_for(observer)[..],
        [ClientNotification::Outbound { message, header_only: false, .. }] if *message == payload
    ));
    assert!(a.stats.get(stats::ENCRYPTED_BYTES_SENT) > 0);
}

#[tokio::test(start_paused = true)]
async fn test_header_only_subscribers_get_four_bytes() {
    let (mut a, mut b) = confirmed_pair().await;
    let client = ClientId(12);
    subscribe(
        &mut b,
        client,
        ClientOptions {
            hdr_inbound: true,
            ..ClientOptions::default()
        },
        &[],
    );

    a.state
        .enqueue_plaintext(b.id, message(2000, 100, 1), 1, Instant::now())
        .unwrap();
    pump(&mut a, &mut b).await;

    let seen = b.outbox.take_for(client);
    assert!(matches!(
        &seen[..],
        [ClientNotification::Inbound { message, header_only: true, .. }] if message.len() == 4
    ));
}

#[tokio::test(start_paused = true)]
async fn test_fifo_order_within_one_frame() {
    let (mut a, mut b) = confirmed_pair().await;
    let reader = ClientId(13);
    subscribe(&mut b, reader, ClientOptions::default(), &[1000]);

    // The first message corks, the later ones join it.
    let later = Instant::now() + Duration::from_secs(30);
    let sent: Vec<Bytes> = (0..3u8).map(|i| message(1000, 20, i)).collect();
    for payload in &sent {
        a.state
            .enqueue_plaintext(b.id, payload.clone(), 1, later)
            .unwrap();
    }
    pump(&mut a, &mut b).await;
    assert!(b.outbox.take_for(reader).is_empty());

    tick(&mut a, &mut b, CoreConfig::default().timers.max_cork_delay()).await;

    assert_eq!(inbound_payloads(&b.outbox.take_for(reader)), sent);
}

#[tokio::test(start_paused = true)]
async fn test_corked_message_leaves_after_max_delay() {
    let (mut a, mut b) = confirmed_pair().await;
    let reader = ClientId(14);
    subscribe(&mut b, reader, ClientOptions::default(), &[1000]);
    let cork = CoreConfig::default().timers.max_cork_delay();

    a.state
        .enqueue_plaintext(b.id, message(1000, 40, 7), 1, Instant::now() + Duration::from_secs(60))
        .unwrap();
    pump(&mut a, &mut b).await;

    assert_eq!(a.stats.get(stats::TRANSMISSIONS_CORKED), 1);
    assert!(b.outbox.take_for(reader).is_empty());

    tick(&mut a, &mut b, cork - Duration::from_millis(1)).await;
    assert!(b.outbox.take_for(reader).is_empty());

    tick(&mut a, &mut b, Duration::from_millis(1)).await;
    assert_eq!(inbound_payloads(&b.outbox.take_for(reader)).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_message_discarded_before_selection() {
    let (mut a, mut b) = confirmed_pair().await;
    let reader = ClientId(15);
    subscribe(&mut b, reader, ClientOptions::default(), &[1000]);
    tokio::time::advance(Duration::from_secs(5)).await;

    let stale = Instant::now() - Duration::from_secs(2);
    a.state
        .enqueue_plaintext(b.id, message(1000, 40, 7), 1, stale)
        .unwrap();
    pump(&mut a, &mut b).await;

    assert_eq!(a.stats.get(stats::MESSAGES_EXPIRED), 1);
    assert!(a.state.neighbour(&b.id).unwrap().messages.is_empty());
    assert!(b.outbox.take_for(reader).is_empty());
}

// ============================================
// Integrity
// ============================================

#[tokio::test(start_paused = true)]
async fn test_tampered_frame_rejected() {
    let (mut a, mut b) = confirmed_pair().await;
    let reader = ClientId(20);
    subscribe(&mut b, reader, ClientOptions::default(), &[1000]);

    a.state
        .enqueue_plaintext(b.id, message(1000, 40, 9), 1, Instant::now())
        .unwrap();
    drain(&mut a).await;
    // The frame went straight into B's inbox; replace it with a forged copy.
    let frame = match b.transport.next_event().await.unwrap() {
        TransportEvent::Received { frame, .. } => frame,
        other => panic!("unexpected event {other:?}"),
    };
    let mut forged = frame.to_vec();
    let last = forged.len() - 1;
    forged[last] ^= 0x01;
    b.state.on_transport_event(TransportEvent::Received {
        peer: a.id,
        frame: Bytes::from(forged),
        hints: Vec::new(),
    });

    assert_eq!(b.stats.get(stats::AUTH_FAILURES), 1);
    assert!(b.outbox.take_for(reader).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_replayed_frame_delivered_once() {
    let (mut a, mut b) = confirmed_pair().await;
    let reader = ClientId(21);
    subscribe(&mut b, reader, ClientOptions::default(), &[1000]);

    a.state
        .enqueue_plaintext(b.id, message(1000, 40, 3), 1, Instant::now())
        .unwrap();
    drain(&mut a).await;
    let event = b.transport.next_event().await.unwrap();
    b.state.on_transport_event(event.clone());
    b.state.on_transport_event(event);

    assert_eq!(b.stats.get(stats::DUPLICATES), 1);
    assert_eq!(inbound_payloads(&b.outbox.take_for(reader)).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sequence_numbers_strictly_increase() {
    let (mut a, mut b) = confirmed_pair().await;
    let mut previous = a.state.neighbour(&b.id).unwrap().last_sequence_number_sent;

    for i in 0..4u8 {
        a.state
            .enqueue_plaintext(b.id, message(1000, 16, i), 1, Instant::now())
            .unwrap();
        pump(&mut a, &mut b).await;
        tokio::time::advance(Duration::from_millis(100)).await;

        let current = a.state.neighbour(&b.id).unwrap().last_sequence_number_sent;
        assert!(current > previous);
        assert_eq!(b.state.neighbour(&a.id).unwrap().replay.highest_seen(), current);
        previous = current;
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_transmission_does_not_stall_queue() {
    let (mut a, mut b) = confirmed_pair().await;
    let reader = ClientId(22);
    subscribe(&mut b, reader, ClientOptions::default(), &[1000]);
    a.transport.set_auto_ready(false);

    let lost = message(1000, 24, 1);
    let kept = message(1000, 24, 2);
    a.state.enqueue_plaintext(b.id, lost, 1, Instant::now()).unwrap();
    a.state
        .enqueue_plaintext(b.id, kept.clone(), 1, Instant::now())
        .unwrap();
    assert_eq!(a.state.neighbour(&b.id).unwrap().encrypted.len(), 1);
    assert_eq!(a.state.neighbour(&b.id).unwrap().messages.len(), 1);

    a.transport.fail(&b.id).unwrap();
    drain(&mut a).await;
    assert_eq!(a.stats.get(stats::TRANSMIT_FAILURES), 1);
    assert_eq!(a.transport.pending_count(), 1);

    a.transport.grant(&b.id).unwrap();
    pump(&mut a, &mut b).await;

    assert_eq!(inbound_payloads(&b.outbox.take_for(reader)), vec![kept]);
    assert!(a.state.neighbour(&b.id).unwrap().encrypted.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_refused_and_undersized_grants_discard_one_frame() {
    let (mut a, mut b) = confirmed_pair().await;
    let reader = ClientId(23);
    subscribe(&mut b, reader, ClientOptions::default(), &[1000]);
    a.transport.set_auto_ready(false);

    a.transport.reject_next(1);
    a.state
        .enqueue_plaintext(b.id, message(1000, 24, 1), 1, Instant::now())
        .unwrap();
    assert_eq!(a.stats.get(stats::TRANSMIT_FAILURES), 1);
    assert!(a.state.neighbour(&b.id).unwrap().encrypted.is_empty());

    a.state
        .enqueue_plaintext(b.id, message(1000, 24, 2), 1, Instant::now())
        .unwrap();
    let request = a.transport.requests().last().cloned().unwrap();
    a.transport.inject(TransportEvent::TransmitReady {
        peer: b.id,
        handle: request.handle,
        capacity: request.size - 1,
    });
    drain(&mut a).await;
    assert_eq!(a.stats.get(stats::TRANSMIT_FAILURES), 2);
    // Clear the transport's copy of the consumed request; its late failure is stale.
    a.transport.fail(&b.id).unwrap();
    drain(&mut a).await;
    assert_eq!(a.stats.get(stats::TRANSMIT_FAILURES), 2);

    let delivered = message(1000, 24, 3);
    a.state
        .enqueue_plaintext(b.id, delivered.clone(), 1, Instant::now())
        .unwrap();
    a.transport.grant(&b.id).unwrap();
    pump(&mut a, &mut b).await;

    assert_eq!(inbound_payloads(&b.outbox.take_for(reader)), vec![delivered]);
}

#[tokio::test(start_paused = true)]
async fn test_raised_bandwidth_restarts_parked_queue() {
    let (mut a, mut b) = fresh_pair().await;
    let reader = ClientId(24);
    subscribe(&mut b, reader, ClientOptions::default(), &[1000]);
    let backlog = a.state.config().limits.max_peer_queue_size - 1;

    let info = a.state.request_peer_info(b.id, 0, 0, 0);
    assert_eq!(info.bw_out, 0);
    // Too full to cork, so the scheduler parks until bandwidth shows up.
    let deadline = Instant::now() + Duration::from_secs(5);
    let sent: Vec<Bytes> = (0..backlog)
        .map(|i| message(1000, 24, u8::try_from(i).unwrap()))
        .collect();
    for payload in &sent {
        a.state
            .enqueue_plaintext(b.id, payload.clone(), 1, deadline)
            .unwrap();
    }
    pump(&mut a, &mut b).await;
    assert!(b.outbox.take_for(reader).is_empty());
    assert_eq!(a.state.neighbour(&b.id).unwrap().messages.len(), backlog);

    let info = a.state.request_peer_info(b.id, 10_000, 0, 0);
    assert!(info.bw_out > 0);
    pump(&mut a, &mut b).await;

    assert_eq!(inbound_payloads(&b.outbox.take_for(reader)), sent);
}

// ============================================
// Client Admission
// ============================================

#[tokio::test(start_paused = true)]
async fn test_send_request_needs_confirmed_session() {
    let mut a = node(1);
    let client = ClientId(30);
    subscribe(&mut a, client, ClientOptions::default(), &[]);
    let stranger = PeerId::new([9; 32]);

    assert!(matches!(
        a.state.client_request_send(client, stranger, 100, 1, 1),
        Err(ServiceError::NeighbourNotFound(_))
    ));
    a.state.request_connect(stranger).unwrap();
    assert!(matches!(
        a.state.client_request_send(client, stranger, 100, 1, 2),
        Err(ServiceError::SessionNotReady { .. })
    ));
    assert_eq!(a.stats.get(stats::SEND_REQUESTS_DROPPED), 2);
    assert!(matches!(
        a.state.client_request_send(ClientId(99), stranger, 100, 1, 3),
        Err(ServiceError::UnknownClient(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_full_queue_grants_highest_priority_first() {
    let (mut a, mut b) = confirmed_pair().await;
    a.transport.set_auto_ready(false);
    let max = a.state.config().limits.max_peer_queue_size;

    // The first message occupies the encrypted queue, the rest fill the plaintext queue.
    for i in 0..=max {
        a.state
            .enqueue_plaintext(b.id, message(1000, 16, u8::try_from(i).unwrap()), 1, Instant::now())
            .unwrap();
    }
    assert!(matches!(
        a.state.enqueue_plaintext(b.id, message(1000, 16, 0), 1, Instant::now()),
        Err(ServiceError::QueueFull { .. })
    ));

    let low = ClientId(31);
    let high = ClientId(32);
    subscribe(&mut a, low, ClientOptions::default(), &[]);
    subscribe(&mut a, high, ClientOptions::default(), &[]);
    a.state.client_request_send(low, b.id, 20, 5, 1).unwrap();
    a.state.client_request_send(high, b.id, 20, 9, 2).unwrap();
    assert!(a.outbox.take().is_empty());
    assert_eq!(a.state.pending_requests(), 2);

    a.transport.grant(&b.id);
    drain(&mut a).await;

    let granted = a.outbox.take();
    assert!(matches!(
        granted.first(),
        Some((client, ClientNotification::SendReady { request_id: 2, .. })) if *client == high
    ));
}

#[tokio::test(start_paused = true)]
async fn test_loopback_delivery_and_grants() {
    let mut a = node(1);
    let client = ClientId(33);
    subscribe(&mut a, client, ClientOptions::default(), &[1000]);
    let payload = message(1000, 8, 4);

    a.state.client_request_send(client, a.id, 12, 1, 77).unwrap();
    a.state
        .enqueue_plaintext(a.id, payload.clone(), 1, Instant::now())
        .unwrap();

    let seen = a.outbox.take_for(client);
    assert!(matches!(seen[0], ClientNotification::SendReady { request_id: 77, .. }));
    assert_eq!(inbound_payloads(&seen), vec![payload]);
    assert_eq!(a.state.neighbour_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_peer_info_preference_and_reservation() {
    let (mut a, b) = confirmed_pair().await;

    let info = a.state.request_peer_info(b.id, 10_000, 500, 7);
    assert_eq!(info.bw_out, 10_000);
    assert_eq!(info.preference, 7);
    assert_eq!(info.reserved_amount, 500);
    assert_eq!(a.state.preference_sum(), 7);

    let greedy = a.state.request_peer_info(b.id, 10_000, i32::MAX, 0);
    assert_eq!(greedy.reserved_amount, 0);
    assert!(greedy.reserve_delay > Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_preference_decay_halves_every_neighbour() {
    let (mut a, b) = confirmed_pair().await;
    let peer = b.id;
    let info = a.state.request_peer_info(peer, 32_768, 0, 40);
    assert_eq!(info.preference, 40);
    assert_eq!(a.state.preference_sum(), 40);

    tokio::time::advance(a.state.config().timers.preference_decay()).await;
    a.state.run_due(Instant::now());

    assert_eq!(a.state.neighbour(&peer).unwrap().current_preference, 20);
    assert_eq!(a.state.preference_sum(), 20);
}

// ============================================
// Lifecycle
// ============================================

#[tokio::test(start_paused = true)]
async fn test_idle_neighbour_evicted_exactly_at_bound() {
    let mut a = node(1);
    let idle = a.state.config().timers.idle_timeout();
    let peer = PeerId::new([5; 32]);
    a.transport.reject_next(1);
    a.state.request_connect(peer).unwrap();
    assert_eq!(a.state.neighbour_count(), 1);

    tokio::time::advance(idle - Duration::from_millis(1)).await;
    a.state.run_due(Instant::now());
    assert_eq!(a.state.neighbour_count(), 1);

    tokio::time::advance(Duration::from_millis(1)).await;
    a.state.run_due(Instant::now());
    assert_eq!(a.state.neighbour_count(), 0);
    assert_eq!(a.stats.get(stats::NEIGHBOURS_EVICTED), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_notifies_and_drops_requests() {
    let (mut a, mut b) = confirmed_pair().await;
    let client = ClientId(40);
    subscribe(
        &mut a,
        client,
        ClientOptions {
            disconnect: true,
            ..ClientOptions::default()
        },
        &[],
    );
    a.transport.set_auto_ready(false);
    for i in 0..=a.state.config().limits.max_peer_queue_size {
        a.state
            .enqueue_plaintext(b.id, message(1000, 16, u8::try_from(i).unwrap()), 1, Instant::now())
            .unwrap();
    }
    a.state.client_request_send(client, b.id, 20, 1, 1).unwrap();
    assert_eq!(a.state.pending_requests(), 1);

    MemoryTransport::disconnect(&a.transport, &b.transport);
    drain(&mut a).await;

    assert_eq!(a.state.pending_requests(), 0);
    assert!(a
        .outbox
        .take_for(client)
        .iter()
        .any(|n| matches!(n, ClientNotification::Disconnect { peer } if *peer == b.id)));
    assert!(!a.state.neighbour(&b.id).unwrap().is_connected);
}

#[tokio::test(start_paused = true)]
async fn test_keep_alive_pings_connected_neighbour() {
    let (mut a, mut b) = confirmed_pair().await;
    let before = a.stats.get(stats::PINGS_CREATED);
    let half_idle = a.state.config().timers.idle_timeout() / 2;

    tick(&mut a, &mut b, half_idle).await;

    assert!(a.stats.get(stats::PINGS_CREATED) > before);
    assert!(b.stats.get(stats::PONGS_CREATED) >= 2);
    assert_eq!(a.state.neighbour_count(), 1);
}
