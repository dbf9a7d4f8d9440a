//! Transfers and service payments
//!
//! The authorizing user comes from the request body. Rejected requests are
//! recorded in the operational log by code only; balances and amounts are
//! never written there.

use axum::extract::State;

use banca_core::services::LogEvent;
use banca_core::{
    CardPaymentRequest, PaymentError, PaymentRequest, ServicePayment, Transfer, TransferError,
    TransferRequest, TransferView,
};

use super::blocking;
use crate::extract::{ApiJson, IdPath};
use crate::{ApiResponse, ApiResult, AppState};

const TRANSFERS_ROUTE: &str = "/api/transfers";
const PAYMENTS_ROUTE: &str = "/api/payments";
const CARD_PAYMENTS_ROUTE: &str = "/api/payments/card";

// === Transfers ===

pub async fn list_transfers(State(state): State<AppState>) -> ApiResult<Vec<TransferView>> {
    let transfers = blocking(&state, |s| s.ctx.transfer_service.list_views()).await??;
    Ok(ApiResponse::ok(transfers))
}

pub async fn get_transfer(State(state): State<AppState>, IdPath(id): IdPath) -> ApiResult<Transfer> {
    let transfer = blocking(&state, move |s| s.ctx.transfer_service.get(id)).await??;
    Ok(ApiResponse::ok(transfer))
}

pub async fn list_account_transfers(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<Vec<TransferView>> {
    let transfers =
        blocking(&state, move |s| s.ctx.transfer_service.list_views_for_account(id)).await??;
    Ok(ApiResponse::ok(transfers))
}

pub async fn create_transfer(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<TransferRequest>,
) -> ApiResult<Transfer> {
    let transfer = blocking(&state, move |s| {
        s.ctx.transfer_service.create(request).inspect_err(|e| {
            s.log_event(
                LogEvent::new("transfer_rejected")
                    .with_route(TRANSFERS_ROUTE)
                    .with_error(e.code(), transfer_log_message(e)),
            )
        })
    })
    .await??;
    Ok(ApiResponse::created(transfer, "Transfer completed"))
}

fn transfer_log_message(err: &TransferError) -> String {
    match err {
        TransferError::InsufficientFunds { account_id, .. } => {
            format!("Insufficient funds in account {}", account_id)
        }
        other => other.to_string(),
    }
}

// === Payments ===

pub async fn list_payments(State(state): State<AppState>) -> ApiResult<Vec<ServicePayment>> {
    let payments = blocking(&state, |s| s.ctx.payment_service.list()).await??;
    Ok(ApiResponse::ok(payments))
}

pub async fn get_payment(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<ServicePayment> {
    let payment = blocking(&state, move |s| s.ctx.payment_service.get(id)).await??;
    Ok(ApiResponse::ok(payment))
}

pub async fn pay(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<PaymentRequest>,
) -> ApiResult<ServicePayment> {
    let payment = blocking(&state, move |s| {
        s.ctx
            .payment_service
            .pay(request)
            .inspect_err(|e| log_payment_rejection(s, PAYMENTS_ROUTE, e))
    })
    .await??;
    Ok(ApiResponse::created(payment, "Payment completed"))
}

pub async fn pay_with_card(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CardPaymentRequest>,
) -> ApiResult<ServicePayment> {
    let payment = blocking(&state, move |s| {
        s.ctx
            .payment_service
            .pay_with_card(request)
            .inspect_err(|e| log_payment_rejection(s, CARD_PAYMENTS_ROUTE, e))
    })
    .await??;
    Ok(ApiResponse::created(payment, "Payment completed"))
}

fn log_payment_rejection(state: &AppState, route: &str, err: &PaymentError) {
    let message = match err {
        PaymentError::InsufficientFunds { account_id, .. } => {
            format!("Insufficient funds in account {}", account_id)
        }
        other => other.to_string(),
    };
    state.log_event(
        LogEvent::new("payment_rejected")
            .with_route(route)
            .with_error(err.code(), message),
    );
}
