//! Session-state engine for the zero-knowledge ephemeral signaling relay:
//! the chunked relay mailbox (C3), the WebRTC envelope handshake (C4), peer
//! discovery and signal mailboxes (C5), lifecycle/GC policy (C6), and the
//! action-dispatched service surface (C7) that `relay-server` calls into.
//!
//! This crate has no HTTP dependency; it speaks `ServiceError`, not status
//! codes.

pub mod discovery;
pub mod envelope;
pub mod error;
pub mod lifecycle;
pub mod relay;
pub mod service;
pub mod validation;

pub use error::ServiceError;
pub use service::RelayService;
