//! HTTP surface: the completion endpoint, health check, bearer-token
//! middleware, and CORS.

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use proto::{ChatMessage, CompletionRequest, Provider, ServerError, SessionError};
use providers::AdapterRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use crate::encoder::SSE_HEADERS;
use crate::session::{GatewaySession, SessionLimits};

/// Frames buffered between the session task and the response body.
const BODY_CHANNEL_CAPACITY: usize = 32;

/// Identity attached by the auth middleware before the gateway runs.
/// The gateway itself performs no verification beyond this check.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    /// Opaque subject of the verified token.
    pub subject: String,
}

/// Shared, read-only state for the HTTP handlers.
struct AppState {
    registry: AdapterRegistry,
    limits: SessionLimits,
    auth_token: String,
}

/// Streaming completion gateway HTTP server.
pub struct GatewayServer {
    port: u16,
    cors_origins: String,
    state: Arc<AppState>,
}

impl GatewayServer {
    /// Creates a server over the given registry and limits. An empty
    /// `auth_token` disables the bearer check.
    pub fn new(
        port: u16,
        auth_token: String,
        cors_origins: String,
        registry: AdapterRegistry,
        limits: SessionLimits,
    ) -> Self {
        Self {
            port,
            cors_origins,
            state: Arc::new(AppState {
                registry,
                limits,
                auth_token,
            }),
        }
    }

    /// Builds the router: the completion endpoint behind the bearer check,
    /// the health endpoint outside it, CORS on everything.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/v1/completions", post(completions_handler))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                require_bearer,
            ))
            .route("/health", get(health_handler))
            .with_state(self.state.clone())
            .layer(build_cors(&self.cors_origins))
    }

    /// Binds the listener and serves until ctrl-c.
    pub async fn run(self) -> Result<(), ServerError> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", self.port))
            .await
            .map_err(|e| ServerError::Bind(e.to_string()))?;

        info!(port = self.port, "gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        info!("gateway stopped");
        Ok(())
    }
}

/// Builds the CORS layer from the configured origins string.
fn build_cors(origins: &str) -> CorsLayer {
    if origins == "*" {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

// ─── Request/response bodies ───────────────────────────────

/// Inbound completion request body.
#[derive(Debug, Deserialize)]
struct CompletionBody {
    /// Provider tag; validated against the closed provider set.
    provider: String,
    /// Ordered prompt messages.
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

impl CompletionBody {
    /// Validates the provider tag and builds the immutable request.
    fn into_request(self) -> Result<CompletionRequest, SessionError> {
        let provider: Provider = self.provider.parse()?;
        Ok(CompletionRequest::new(provider, self.messages))
    }
}

/// JSON error payload for non-streaming failures.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

// ─── Handlers ──────────────────────────────────────────────

/// Health check endpoint.
async fn health_handler() -> &'static str {
    "ok"
}

/// Accepts one completion request and answers with a live SSE stream.
///
/// Validation failures (unknown provider, empty prompt) are rejected with a
/// non-streaming 400 before any SSE header is sent. Otherwise the response
/// headers go out immediately and the session task feeds the body channel;
/// dropping the body (client disconnect) is observed by the session through
/// channel closure.
async fn completions_handler(
    State(state): State<Arc<AppState>>,
    caller: Option<axum::Extension<CallerIdentity>>,
    Json(body): Json<CompletionBody>,
) -> Response {
    if body.messages.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "messages must not be empty");
    }

    let request = match body.into_request() {
        Ok(request) => request,
        Err(err) => {
            debug!(error = %err, "rejecting completion request");
            return error_response(StatusCode::BAD_REQUEST, err.to_string());
        }
    };

    let adapter = state.registry.adapter_for(request.provider);
    let session = GatewaySession::new(request, state.limits);
    let subject = caller
        .as_ref()
        .map(|c| c.subject.as_str())
        .unwrap_or("anonymous");
    debug!(session_id = %session.id(), caller = subject, "starting stream session");

    let (tx, rx) = mpsc::channel::<Bytes>(BODY_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        session.run(adapter, tx).await;
    });

    let frames = ReceiverStream::new(rx).map(Ok::<_, std::convert::Infallible>);
    (StatusCode::OK, SSE_HEADERS, Body::from_stream(frames)).into_response()
}

// ─── Auth middleware ───────────────────────────────────────

/// Verifies the bearer token and attaches the caller identity. An empty
/// configured token disables the check.
async fn require_bearer(State(state): State<Arc<AppState>>, mut request: Request, next: Next) -> Response {
    if state.auth_token.is_empty() {
        return next.run(request).await;
    }
    match bearer_token(request.headers()) {
        Some(token) if token == state.auth_token => {
            request.extensions_mut().insert(CallerIdentity {
                subject: "api-token".to_string(),
            });
            next.run(request).await
        }
        _ => error_response(StatusCode::UNAUTHORIZED, "invalid or missing bearer token"),
    }
}

/// Extracts the token from an `Authorization: Bearer ...` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
