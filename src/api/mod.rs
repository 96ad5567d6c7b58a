//! HTTP surface: account creation and lookup, health and metrics.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::application::{AccountsGauge, ProvisionError, ProvisioningService, ServiceError};
use crate::domain::CreateAccountRequest;

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<ProvisioningService>,
    pub metrics: Arc<AccountsGauge>,
}

/// Error returned to HTTP callers as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Status for a service failure. Server-side failures get `fallback` as
/// their message so internal details stay in the logs.
fn service_error(err: ServiceError, fallback: &str) -> ApiError {
    match &err {
        ServiceError::InvalidRequest(message) => ApiError::bad_request(message.clone()),
        ServiceError::LimitExceeded { .. } => {
            ApiError::new(StatusCode::FORBIDDEN, "service out of available accounts")
        }
        ServiceError::AlreadyExists => {
            error!(error = %err, "account with address or public key already exists");
            ApiError::new(
                StatusCode::CONFLICT,
                "account with address or public key already exists",
            )
        }
        ServiceError::NotFound(_) => ApiError::new(StatusCode::NOT_FOUND, err.to_string()),
        ServiceError::Provisioning(ProvisionError::TimedOut { .. }) => {
            error!(error = %err, "{}", fallback);
            ApiError::new(StatusCode::GATEWAY_TIMEOUT, fallback)
        }
        ServiceError::Provisioning(ProvisionError::Cancelled) => {
            error!(error = %err, "{}", fallback);
            ApiError::new(StatusCode::SERVICE_UNAVAILABLE, fallback)
        }
        ServiceError::Provisioning(_) | ServiceError::StorageUnavailable(_) => {
            error!(error = %err, "{}", fallback);
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, fallback)
        }
    }
}

/// Build the application router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/accounts", get(get_account).post(create_account))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Serve the API on `addr` until `shutdown` resolves.
pub async fn serve(
    addr: SocketAddr,
    state: ApiState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(addr = %addr, "account API listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
}

async fn create_account(State(state): State<ApiState>, body: Bytes) -> Response {
    // Over-limit requests are refused before the body is looked at.
    if let Err(err) = state.service.check_admission().await {
        return service_error(err, "failed to create account").into_response();
    }

    let request: CreateAccountRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(_) => return ApiError::bad_request("invalid request payload").into_response(),
    };

    match state.service.provision_account(request).await {
        Ok(account) => (StatusCode::CREATED, Json(account)).into_response(),
        Err(err) => service_error(err, "failed to create account").into_response(),
    }
}

async fn get_account(
    State(state): State<ApiState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let mut public_keys = params
        .into_iter()
        .filter(|(name, _)| name == "publicKey")
        .map(|(_, value)| value);

    let public_key = match (public_keys.next(), public_keys.next()) {
        (None, _) => return ApiError::bad_request("publicKey is required").into_response(),
        (Some(_), Some(_)) => {
            return ApiError::bad_request("must provide one public key").into_response();
        }
        (Some(key), None) => key,
    };

    match state.service.lookup_account(&public_key).await {
        Ok(account) => (StatusCode::OK, Json(account)).into_response(),
        Err(err) => service_error(err, "failed to get account by public key").into_response(),
    }
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<ApiState>) -> Response {
    match state.metrics.encode_text() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics")
                .into_response()
        }
    }
}
