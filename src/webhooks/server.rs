//! Admission webhook server.
//!
//! Serves the mutating webhook over HTTPS. The transport layer is thin:
//! it decodes the AdmissionReview envelope, hands the request to the
//! decision builder, and encodes the decision back. Business rejections
//! travel as `allowed: false` inside a 200 response; HTTP 400/500 are
//! reserved for malformed envelopes and internal failures before a
//! decision could be made.
//!
//! TLS certificates are expected at the configured paths, typically
//! mounted from a cert-manager secret at /etc/webhook/certs/.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use tracing::{debug, error, info};

use crate::allocator::engine::Allocator;
use crate::config::Settings;
use crate::health::HealthState;
use crate::webhooks::admission::{Decision, decide};

/// Shared state for webhook handlers
pub struct WebhookState {
    pub allocator: Allocator,
    pub settings: Settings,
    pub health: Arc<HealthState>,
}

impl WebhookState {
    pub fn new(allocator: Allocator, settings: Settings, health: Arc<HealthState>) -> Self {
        Self {
            allocator,
            settings,
            health,
        }
    }
}

fn operation_name(operation: &Operation) -> &'static str {
    match operation {
        Operation::Create => "CREATE",
        Operation::Update => "UPDATE",
        Operation::Delete => "DELETE",
        Operation::Connect => "CONNECT",
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/mutate", post(mutate))
        .with_state(state)
}

/// Mutating admission webhook handler for namespace lifecycle events
async fn mutate(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> Response {
    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to extract admission request");
            return (
                StatusCode::BAD_REQUEST,
                Json(
                    AdmissionResponse::invalid(format!("Invalid AdmissionReview: {}", e))
                        .into_review(),
                ),
            )
                .into_response();
        }
    };

    let uid = request.uid.clone();
    let operation = operation_name(&request.operation);
    debug!(
        uid = %uid,
        operation,
        kind = %request.kind.kind,
        name = %request.name,
        "Processing admission request"
    );

    let decision = match decide(&state.allocator, &state.settings, &request).await {
        Ok(decision) => decision,
        Err(e) => {
            error!(uid = %uid, operation, error = %e, "Admission request failed");
            state.health.metrics.record_admission(operation, "error");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("could not process admission request: {}", e),
            )
                .into_response();
        }
    };

    let Decision {
        allowed,
        message,
        patch,
        released,
    } = decision;

    if released {
        state.health.metrics.record_release();
    }

    if !allowed {
        let message = message.unwrap_or_else(|| "request denied".to_string());
        info!(uid = %uid, operation, message = %message, "Admission request denied");
        state.health.metrics.record_admission(operation, "denied");
        return (
            StatusCode::OK,
            Json(AdmissionResponse::from(&request).deny(message).into_review()),
        )
            .into_response();
    }

    let mut response = AdmissionResponse::from(&request);
    if let Some(patch) = patch {
        response = match response.with_patch(patch) {
            Ok(response) => response,
            Err(e) => {
                error!(uid = %uid, error = %e, "Failed to serialize patch");
                state.health.metrics.record_admission(operation, "error");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("could not serialize patch: {}", e),
                )
                    .into_response();
            }
        };
        state.health.metrics.record_patch();
    }

    info!(uid = %uid, operation, "Admission request allowed");
    state.health.metrics.record_admission(operation, "allowed");
    (StatusCode::OK, Json(response.into_review())).into_response()
}

/// Errors that can occur when running the webhook server
#[derive(Debug)]
pub enum WebhookError {
    /// TLS configuration error
    TlsConfig(String),
    /// Server error
    Server(String),
}

impl std::fmt::Display for WebhookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookError::TlsConfig(msg) => write!(f, "TLS configuration error: {}", msg),
            WebhookError::Server(msg) => write!(f, "Webhook server error: {}", msg),
        }
    }
}

impl std::error::Error for WebhookError {}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0 on the configured port and serves the /mutate
/// endpoint. TLS certificates are loaded from the configured paths.
pub async fn run_webhook_server(state: Arc<WebhookState>) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let port = state.settings.webhook_port;
    let config = RustlsConfig::from_pem_file(
        PathBuf::from(&state.settings.cert_path),
        PathBuf::from(&state.settings.key_path),
    )
    .await
    .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let app = create_webhook_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "Webhook server listening with TLS");

    axum_server::bind_rustls(addr, config)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}
