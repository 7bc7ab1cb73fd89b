//! Provider adapters for the streaming completion gateway.
//!
//! Each adapter translates one upstream provider's native streaming protocol
//! (SDK chunk stream or raw HTTP SSE) into the normalized
//! [`proto::StreamEvent`] sequence consumed by the gateway session.

pub mod adapter;
pub mod mock;
pub mod openai;
pub mod qwen;
pub mod registry;
pub mod sse;

/// Re-export of the adapter contract and event stream.
pub use adapter::{EventStream, ProviderAdapter};
/// Re-export of the offline adapter.
pub use mock::MockAdapter;
/// Re-export of the SDK-backed OpenAI adapter.
pub use openai::OpenAiAdapter;
/// Re-export of the raw-HTTP DashScope adapter.
pub use qwen::QwenAdapter;
/// Re-export of provider settings and the closed registry.
pub use registry::{
    AdapterRegistry, DEFAULT_QWEN_URL, MockSettings, OpenAiSettings, ProviderSettings,
    QwenSettings,
};
/// Re-export of the incremental SSE decoder.
pub use sse::FrameDecoder;
