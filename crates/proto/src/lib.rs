//! Shared protocol types for the streaming completion gateway.
//!
//! This crate defines the request/event model exchanged between the HTTP
//! surface, the gateway session, and the provider adapters, plus the
//! strongly-typed error enums shared across the workspace.

pub mod error;
pub mod event;
pub mod message;

/// Re-export of all protocol error types.
pub use error::*;
/// Re-export of the normalized stream event type.
pub use event::StreamEvent;
/// Re-export of request/message/identity types.
pub use message::{ChatMessage, CompletionRequest, Provider, Role, SessionId};
