// ============================================
// File: crates/corelink-transport/src/lib.rs
// ============================================
//! # Corelink Transport - Collaborator Interfaces
//!
//! ## Creation Reason
//! The link layer never touches sockets. It asks a transport for
//! permission to send, is told when it may, and hands over finished
//! frames. This crate defines those seams and the bandwidth tracker used
//! to pace outbound traffic.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`traits`]: `Transport` (request/cancel/quota) and `Link` (events/send)
//! - [`bandwidth`]: `BandwidthTracker` trait and `WindowTracker`
//! - [`memory`]: `MemoryTransport`, an in-process transport
//! - [`error`]: Transport-specific error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              corelink-service                       │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   corelink-core        corelink-transport          │
//! │                        You are here ◄──            │
//! │         │                     │                    │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │             corelink-common                        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Hand-off Sequence
//! ```text
//!  service                     transport
//!     │ request_transmit(peer,size) │
//!     │ ───────────────────────────►│
//!     │       TransmitReady(handle) │
//!     │ ◄───────────────────────────│
//!     │ send(peer, frame)           │
//!     │ ───────────────────────────►│
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - At most one outstanding request per peer; implementations refuse a
//!   second one
//! - Always code against the traits so tests can use `MemoryTransport`
//!
//! ## Last Modified
//! v0.1.0 - Initial transport abstractions

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bandwidth;
pub mod error;
pub mod memory;
pub mod traits;

pub use bandwidth::{BandwidthTracker, WindowTracker};
pub use error::{Result, TransportError};
pub use memory::MemoryTransport;
pub use traits::{Link, PerformanceHint, TransmitHandle, Transport, TransportEvent};
