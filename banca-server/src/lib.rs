//! Banca Server - REST API over banca-core
//!
//! Every route lives under `/api` and answers with the same envelope:
//! `success`, `message`, and either `data` or `error { code, message }`.

pub mod error;
pub mod extract;
mod handlers;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use banca_core::services::{LogEvent, LoggingService};
use banca_core::{BancaContext, OperationResult};

use crate::error::ApiError;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<BancaContext>,
    /// Operational event log; absent when logs.duckdb could not be opened
    pub logger: Option<Arc<LoggingService>>,
}

impl AppState {
    pub fn new(ctx: BancaContext, logger: Option<LoggingService>) -> Self {
        Self {
            ctx: Arc::new(ctx),
            logger: logger.map(Arc::new),
        }
    }

    /// Record an event in the operational log, ignoring failures
    pub fn log_event(&self, event: LogEvent) {
        if let Some(logger) = &self.logger {
            if let Err(e) = logger.log(event) {
                tracing::debug!("failed to write log event: {}", e);
            }
        }
    }
}

/// Successful response envelope
pub struct ApiResponse<T> {
    status: StatusCode,
    body: OperationResult<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            body: OperationResult::ok(data),
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: OperationResult::ok_with_message(data, message),
        }
    }

    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CREATED,
            body: OperationResult::ok_with_message(data, message),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

/// Build the application router
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        // Clients
        .route("/clients", get(handlers::admin::list_clients).post(handlers::admin::create_client))
        .route("/clients/{id}", get(handlers::admin::get_client).put(handlers::admin::update_client))
        .route("/clients/{id}/deactivate", put(handlers::admin::deactivate_client))
        .route("/clients/{id}/activate", put(handlers::admin::activate_client))
        // Accounts
        .route("/accounts", get(handlers::admin::list_accounts).post(handlers::admin::open_account))
        .route("/accounts/active", get(handlers::admin::list_active_accounts))
        .route("/accounts/{id}", get(handlers::admin::get_account).put(handlers::admin::update_account))
        .route("/accounts/{id}/deactivate", put(handlers::admin::deactivate_account))
        .route("/accounts/{id}/activate", put(handlers::admin::activate_account))
        .route("/accounts/{id}/transfers", get(handlers::ledger::list_account_transfers))
        // Catalogs
        .route(
            "/account-types",
            get(handlers::admin::list_account_types).post(handlers::admin::create_account_type),
        )
        .route("/account-types/{id}", put(handlers::admin::update_account_type))
        .route(
            "/service-types",
            get(handlers::admin::list_service_types).post(handlers::admin::create_service_type),
        )
        .route("/service-types/{id}", put(handlers::admin::update_service_type))
        // RFID cards
        .route("/cards", get(handlers::admin::list_cards).post(handlers::admin::assign_card))
        .route(
            "/cards/{id}",
            get(handlers::admin::get_card)
                .put(handlers::admin::update_card)
                .delete(handlers::admin::remove_card),
        )
        // Money movement
        .route("/payments", get(handlers::ledger::list_payments).post(handlers::ledger::pay))
        .route("/payments/card", post(handlers::ledger::pay_with_card))
        .route("/payments/{id}", get(handlers::ledger::get_payment))
        .route("/transfers", get(handlers::ledger::list_transfers).post(handlers::ledger::create_transfer))
        .route("/transfers/{id}", get(handlers::ledger::get_transfer))
        // Staff
        .route("/roles", get(handlers::users::list_roles).post(handlers::users::create_role))
        .route("/roles/{id}", put(handlers::users::update_role))
        .route("/users", get(handlers::users::list_users).post(handlers::users::create_user))
        .route("/users/{id}", put(handlers::users::update_user))
        .route("/users/{id}/deactivate", put(handlers::users::deactivate_user))
        .route("/login", post(handlers::users::login))
        // Audit trail
        .route("/audits", get(handlers::list_audits));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
