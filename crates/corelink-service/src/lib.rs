// ============================================
// File: crates/corelink-service/src/lib.rs
// ============================================
//! # CoreLink Service Library
//!
//! ## Creation Reason
//! The encrypted neighbour link layer: everything between "a local
//! client wants these bytes delivered to peer X" and "the transport may
//! now send a frame to peer X".
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: TOML configuration
//! - [`state`]: `CoreState`, the single owner of all link-layer state
//! - [`service`]: tokio driver and client handle
//! - [`services`]: scheduling, assembly, handshake, admission, preference
//!   - [`services::plan`]: corking and bandwidth-aware message selection
//!   - [`services::assembler`]: plaintext batches
//!   - [`services::handshake`]: session state machine
//!   - [`services::admission`]: clients and send-slot grants
//!   - [`services::preference`]: preference sum and inbound quota
//!   - [`services::replay`]: sequence number window
//!   - [`services::neighbour`]: per-peer record
//! - [`handlers`]: inbound frame processing
//! - [`timers`]: deadline-ordered task queue
//! - [`stats`]: named counters
//! - [`error`]: service error types
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        corelink-service                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ServiceHandle ──► LinkService (tokio task) ──► CoreState        │
//! │                                                   │             │
//! │        ┌───────────────┬──────────────┬───────────┤             │
//! │        ▼               ▼              ▼           ▼             │
//! │  ┌──────────┐   ┌───────────┐  ┌───────────┐ ┌─────────┐        │
//! │  │ Planner  │   │ Assembler │  │ Handshake │ │Admission│        │
//! │  └──────────┘   └───────────┘  └───────────┘ └─────────┘        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   corelink-core (frame crypto, codec)   corelink-transport      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! Client → enqueue → plan → assemble → seal → transport
//! Client ← deliver ← classify ← open ← transport
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `CoreState` never blocks and never awaits; keep it that way
//! - Key exchange and transports are collaborators behind traits
//!
//! ## Last Modified
//! v0.1.0 - Initial service library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod service;
pub mod services;
pub mod state;
pub mod stats;
pub mod timers;

// Re-export primary types
pub use crate::config::CoreConfig;
pub use crate::state::{Collaborators, CoreState, PeerInfo};
pub use crate::error::{Result, ServiceError};
pub use crate::service::{LinkService, ServiceHandle};
