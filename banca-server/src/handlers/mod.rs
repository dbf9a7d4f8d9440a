//! HTTP handlers
//!
//! Service calls hit DuckDB synchronously, so each one runs on the blocking
//! pool through [`blocking`].

pub mod admin;
pub mod ledger;
pub mod users;

use axum::extract::State;
use serde::{Deserialize, Serialize};

use banca_core::services::StatusSummary;
use banca_core::AuditEntry;

use crate::error::ApiError;
use crate::extract::ApiQuery;
use crate::{ApiResponse, ApiResult, AppState};

/// Run `work` on the blocking pool with a clone of the state
pub(crate) async fn blocking<T, F>(state: &AppState, work: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppState) -> T + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || work(&state))
        .await
        .map_err(|e| ApiError::internal(format!("worker task failed: {}", e)))
}

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
    version: &'static str,
}

/// GET /api/health
pub async fn health() -> ApiResponse<Health> {
    ApiResponse::ok(Health {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /api/status
pub async fn status(State(state): State<AppState>) -> ApiResult<StatusSummary> {
    let summary = blocking(&state, |s| s.ctx.status_service.get_status()).await??;
    Ok(ApiResponse::ok(summary))
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    entity: Option<String>,
    limit: Option<usize>,
}

/// GET /api/audits?entity=&limit=
pub async fn list_audits(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AuditQuery>,
) -> ApiResult<Vec<AuditEntry>> {
    let entries = blocking(&state, move |s| {
        s.ctx.audit_service.list(query.entity.as_deref(), query.limit)
    })
    .await??;
    Ok(ApiResponse::ok(entries))
}
