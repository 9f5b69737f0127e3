// ============================================
// File: crates/corelink-common/src/lib.rs
// ============================================
//! # Corelink Common - Shared Types
//!
//! ## Creation Reason
//! Holds the handful of types every corelink crate agrees on: who a
//! neighbour is, how wire timestamps are expressed, and the base error.
//!
//! ## Main Functionality
//! - [`types`]: `PeerId`, the 32-byte identity of a neighbour
//! - [`time`]: `Timestamp`, microseconds since the Unix epoch
//! - [`error`]: Common error types and result aliases
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              corelink-service                       │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   corelink-core        corelink-transport          │
//! │         │                     │                    │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │             corelink-common  ◄── You are here     │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Leaf crate: no internal dependencies, keep external ones minimal
//! - `PeerId` appears on the wire; its byte layout must not change
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod time;
pub mod types;

pub use error::{CommonError, Result};
pub use time::Timestamp;
pub use types::PeerId;
