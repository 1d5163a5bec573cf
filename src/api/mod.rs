//! JSON HTTP surface over the ledger.
//!
//! Handlers only translate requests into ledger calls; no hashing or chain
//! logic lives here.

pub mod routes;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::config::AppConfig;
use crate::error::LedgerError;
use crate::ledger::{Ledger, LedgerStore};

pub struct AppState<S> {
    pub ledger: Arc<Ledger<S>>,
    pub config: Arc<AppConfig>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S: LedgerStore + 'static> AppState<S> {
    pub fn new(ledger: Ledger<S>, config: AppConfig) -> Self {
        Self {
            ledger: Arc::new(ledger),
            config: Arc::new(config),
        }
    }
}

pub fn router<S: LedgerStore + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/", get(routes::health))
        .route("/api/health", get(routes::health))
        .route("/api/report", post(routes::submit_report::<S>))
        .route("/api/explorer", get(routes::explorer::<S>))
        .route("/api/block/:index", get(routes::get_block::<S>))
        .route("/api/block/:index/proof", get(routes::leaf_proof::<S>))
        .route("/api/block/:index/verify-proof", post(routes::verify_leaf::<S>))
        .route("/api/search", get(routes::search::<S>))
        .route("/api/verify", post(routes::verify_file::<S>))
        .route("/api/chain/verify", get(routes::verify_chain::<S>))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .into_inner(),
        )
        .with_state(state)
}

/// Ledger error rendered as `{"error": ...}` with a matching status code
#[derive(Debug)]
pub struct ApiError(pub LedgerError);

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::InvalidInput(_) | LedgerError::Canonicalization(_) => {
                StatusCode::BAD_REQUEST
            }
            LedgerError::ConcurrentAppendConflict(_) => StatusCode::CONFLICT,
            LedgerError::IntegrityViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::Storage(_) | LedgerError::Signing(_) | LedgerError::Config(_) => {
                error!("Request failed: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}
