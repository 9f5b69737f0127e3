// ============================================
// File: crates/corelink-service/src/stats.rs
// ============================================
//! # Statistics
//!
//! ## Main Functionality
//! - `StatisticsSink`: named counter updates
//! - `InMemoryStats`: map-backed sink used by the daemon and by tests
//! - Counter names as constants so call sites and tests agree
//!
//! ## Last Modified
//! v0.1.0 - Initial statistics sink

use std::collections::BTreeMap;

use parking_lot::Mutex;

/// Queued messages dropped past their deadline.
pub const MESSAGES_EXPIRED: &str = "# messages discarded (expired prior to transmission)";
/// Bytes handed to the transport.
pub const ENCRYPTED_BYTES_SENT: &str = "# encrypted bytes given to transport";
/// Scheduling passes that decided to cork.
pub const TRANSMISSIONS_CORKED: &str = "# transmissions delayed due to corking";
/// Plaintext bytes recovered from frames.
pub const BYTES_DECRYPTED: &str = "# bytes decrypted";
/// Plaintext bytes sealed into frames.
pub const BYTES_ENCRYPTED: &str = "# bytes encrypted";
/// PING frames built.
pub const PINGS_CREATED: &str = "# PING messages created";
/// PONG frames built.
pub const PONGS_CREATED: &str = "# PONG messages created";
/// Sessions moved to confirmed by a PONG.
pub const KEYS_CONFIRMED: &str = "# session keys confirmed via PONG";
/// Frames failing HMAC or AEAD checks.
pub const AUTH_FAILURES: &str = "# failed to authenticate message";
/// Frames repeating a sequence number.
pub const DUPLICATES: &str = "# duplicate messages received";
/// Frames outside the replay window or too old.
pub const STALE: &str = "# stale messages received";
/// Status-change notifications issued.
pub const STATUS_CHANGES: &str = "# peer status changes";
/// Neighbours freed for idleness.
pub const NEIGHBOURS_EVICTED: &str = "# neighbours evicted";
/// Frames lost to transport failure.
pub const TRANSMIT_FAILURES: &str = "# transmit requests failed";
/// Current number of neighbour entries.
pub const NEIGHBOUR_ENTRIES: &str = "# active neighbours";
/// Bytes in frames whose timestamp was older than the message age bound.
pub const BYTES_ANCIENT: &str = "# bytes dropped (ancient message)";
/// Frames that arrived before a decryption key was known.
pub const FRAMES_WITHOUT_KEY: &str = "# frames dropped (no session key)";
/// PINGs decrypted and accepted.
pub const PINGS_RECEIVED: &str = "# PING messages received";
/// PONGs decrypted and accepted.
pub const PONGS_RECEIVED: &str = "# PONG messages received";
/// Peer keys accepted from the key exchange.
pub const KEYS_RECEIVED: &str = "# session keys received";
/// Connection hints issued to the transport.
pub const CONNECT_REQUESTS: &str = "# connection requests received";
/// Current node-wide preference sum.
pub const TOTAL_PREFERENCE: &str = "# total peer preference";
/// Client send requests refused for lack of a confirmed session.
pub const SEND_REQUESTS_DROPPED: &str = "# send requests dropped (disconnected)";

/// Destination for named counters.
pub trait StatisticsSink: Send + Sync {
    /// Adds `delta` to counter `name`.
    fn update(&self, name: &str, delta: i64);

    /// Overwrites counter `name`.
    fn set(&self, name: &str, value: i64);
}

/// Counters kept in a map.
#[derive(Debug, Default)]
pub struct InMemoryStats {
    counters: Mutex<BTreeMap<String, i64>>,
}

impl InMemoryStats {
    /// Creates an empty set of counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `name`, zero if never touched.
    #[must_use]
    pub fn get(&self, name: &str) -> i64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    /// Copy of all counters.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, i64> {
        self.counters.lock().clone()
    }
}

impl StatisticsSink for InMemoryStats {
    fn update(&self, name: &str, delta: i64) {
        *self.counters.lock().entry(name.to_string()).or_insert(0) += delta;
    }

    fn set(&self, name: &str, value: i64) {
        self.counters.lock().insert(name.to_string(), value);
    }
}
