// ============================================
// File: crates/corelink-service/src/services/mod.rs
// ============================================
//! # Link-Layer Services
//!
//! ## Creation Reason
//! The building blocks `CoreState` combines: per-neighbour state, the
//! plaintext scheduler, frame assembly, client admission, handshake
//! transitions and preference bookkeeping.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`neighbour`]: per-peer record, queues and timer slots
//! - [`plan`]: deadline / priority / corking message selection
//! - [`assembler`]: marked messages to one plaintext batch
//! - [`admission`]: local clients and their pending send requests
//! - [`handshake`]: session states and the key exchange seam
//! - [`preference`]: preference sum and inbound quota
//! - [`replay`]: 32-wide sliding replay window
//!
//! ## Service Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  client request ──► admission ──SendReady──► client         │
//! │                                                 │           │
//! │  enqueue_plaintext ◄────────────────────────────┘           │
//! │        │                                                    │
//! │        ▼                                                    │
//! │  neighbour.messages ──► plan ──► assembler ──► seal         │
//! │                                                 │           │
//! │  neighbour.encrypted ◄──────────────────────────┘           │
//! │        │                                                    │
//! │        ▼                                                    │
//! │    transport                                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - None of these modules schedule timers; `CoreState` owns that
//! - `plan` and `assembler` must agree on queue order
//!
//! ## Last Modified
//! v0.1.0 - Initial services structure

pub mod admission;
pub mod assembler;
pub mod handshake;
pub mod neighbour;
pub mod plan;
pub mod preference;
pub mod replay;

// Re-export primary types
pub use admission::{
    ClientId, ClientNotification, ClientOptions, ClientOutbox, ClientRegistry, ClientRequest,
    ClientSink, RequestTable,
};
pub use handshake::{HandshakeEvent, HandshakeState, KeyExchange, RecordingKeyExchange};
pub use neighbour::{EncryptedFrame, MessageEntry, Neighbour};
pub use plan::{PlanParams, Selection};
pub use replay::{ReplayCheckResult, ReplayWindow};
