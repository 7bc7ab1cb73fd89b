//! Streaming completion gateway: per-request session orchestration, SSE
//! encoding, and the HTTP surface.

pub mod encoder;
pub mod server;
pub mod session;

/// Re-export of the SSE encoder and sentinel payloads.
pub use encoder::{END_SENTINEL, ERROR_SENTINEL, SseEncoder};
/// Re-export of the HTTP server and caller identity.
pub use server::{CallerIdentity, GatewayServer};
/// Re-export of session orchestration types.
pub use session::{GatewaySession, SessionLimits, SessionState};
