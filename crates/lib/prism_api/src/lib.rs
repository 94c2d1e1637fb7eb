//! # prism_api
//!
//! HTTP API library for Prism: the vault surface and its session gate.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use prism_core::session::SessionStore;
use prism_core::storage::BlobStore;
use prism_core::store::DocumentStore;
use prism_core::vault::VaultController;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ApiConfig;
use crate::handlers::{health, share, vault};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Vault access controller.
    pub vault: VaultController,
    /// Session records backing the bearer gate.
    pub sessions: SessionStore,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    /// Wire state over a document store and a blob store.
    pub fn new(
        docs: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        config: ApiConfig,
    ) -> Self {
        Self {
            vault: VaultController::new(docs.clone(), blobs),
            sessions: SessionStore::new(docs),
            config,
        }
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no session required)
    let public = Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/vault/share",
            get(share::get_share_handler).post(share::verify_share_handler),
        );

    // Admin routes (bearer session required)
    let admin = Router::new()
        .route(
            "/vault",
            get(vault::get_vault_handler)
                .post(vault::upload_vault_handler)
                .patch(vault::update_vault_handler)
                .delete(vault::delete_vault_handler),
        )
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_session,
        ));

    Router::new()
        .merge(public)
        .merge(admin)
        .layer(cors)
        .with_state(state)
}
