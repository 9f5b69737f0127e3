// ============================================
// File: crates/corelink-service/src/handlers/mod.rs
// ============================================
//! # Frame Handlers
//!
//! ## Creation Reason
//! Keeps the per-frame crypto and validation work apart from the
//! scheduling and lifecycle logic in `CoreState`.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`inbound`]: authenticate, decrypt and split inbound frames
//!
//! ## Handler Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Transport ──Received──► InboundHandler::open               │
//! │                             │                               │
//! │                             ▼                               │
//! │                   InboundHandler::classify                  │
//! │                 ┌───────────┼──────────────┐                │
//! │                 ▼           ▼              ▼                │
//! │               PING        PONG        application           │
//! │             (answer)   (confirm)   (local clients)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Handlers never schedule anything; they only report what they saw
//! - Log suspicious frames at `warn`, ordinary drops at `debug`
//!
//! ## Last Modified
//! v0.1.0 - Initial handlers structure

pub mod inbound;

pub use inbound::{InboundHandler, InboundMessage, OpenedBatch};
