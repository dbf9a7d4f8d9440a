//! Clients, accounts, catalogs and RFID cards

use axum::extract::State;

use banca_core::services::{AccountUpdate, CardInput, CatalogInput, ClientInput, OpenAccount};
use banca_core::{Account, AccountType, AccountView, Client, RfidCard, ServiceType};

use super::blocking;
use crate::extract::{ApiJson, CurrentUser, IdPath};
use crate::{ApiResponse, ApiResult, AppState};

// === Clients ===

pub async fn list_clients(State(state): State<AppState>) -> ApiResult<Vec<Client>> {
    let clients = blocking(&state, |s| s.ctx.client_service.list()).await??;
    Ok(ApiResponse::ok(clients))
}

pub async fn get_client(State(state): State<AppState>, IdPath(id): IdPath) -> ApiResult<Client> {
    let client = blocking(&state, move |s| s.ctx.client_service.get(id)).await??;
    Ok(ApiResponse::ok(client))
}

pub async fn create_client(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiJson(input): ApiJson<ClientInput>,
) -> ApiResult<Client> {
    let client = blocking(&state, move |s| s.ctx.client_service.create(input, &actor)).await??;
    Ok(ApiResponse::created(client, "Client created"))
}

pub async fn update_client(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    IdPath(id): IdPath,
    ApiJson(input): ApiJson<ClientInput>,
) -> ApiResult<Client> {
    let client =
        blocking(&state, move |s| s.ctx.client_service.update(id, input, &actor)).await??;
    Ok(ApiResponse::with_message(client, "Client updated"))
}

pub async fn deactivate_client(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    IdPath(id): IdPath,
) -> ApiResult<Client> {
    let client = blocking(&state, move |s| s.ctx.client_service.deactivate(id, &actor)).await??;
    Ok(ApiResponse::with_message(client, "Client deactivated"))
}

pub async fn activate_client(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    IdPath(id): IdPath,
) -> ApiResult<Client> {
    let client = blocking(&state, move |s| s.ctx.client_service.activate(id, &actor)).await??;
    Ok(ApiResponse::with_message(client, "Client activated"))
}

// === Accounts ===

pub async fn list_accounts(State(state): State<AppState>) -> ApiResult<Vec<AccountView>> {
    let accounts = blocking(&state, |s| s.ctx.account_service.list()).await??;
    Ok(ApiResponse::ok(accounts))
}

pub async fn list_active_accounts(State(state): State<AppState>) -> ApiResult<Vec<AccountView>> {
    let accounts = blocking(&state, |s| s.ctx.account_service.list_active()).await??;
    Ok(ApiResponse::ok(accounts))
}

pub async fn get_account(State(state): State<AppState>, IdPath(id): IdPath) -> ApiResult<Account> {
    let account = blocking(&state, move |s| s.ctx.account_service.get(id)).await??;
    Ok(ApiResponse::ok(account))
}

pub async fn open_account(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiJson(input): ApiJson<OpenAccount>,
) -> ApiResult<Account> {
    let account = blocking(&state, move |s| s.ctx.account_service.open(input, &actor)).await??;
    Ok(ApiResponse::created(account, "Account opened"))
}

pub async fn update_account(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    IdPath(id): IdPath,
    ApiJson(input): ApiJson<AccountUpdate>,
) -> ApiResult<Account> {
    let account =
        blocking(&state, move |s| s.ctx.account_service.update(id, input, &actor)).await??;
    Ok(ApiResponse::with_message(account, "Account updated"))
}

pub async fn deactivate_account(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    IdPath(id): IdPath,
) -> ApiResult<Account> {
    let account =
        blocking(&state, move |s| s.ctx.account_service.deactivate(id, &actor)).await??;
    Ok(ApiResponse::with_message(account, "Account deactivated"))
}

pub async fn activate_account(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    IdPath(id): IdPath,
) -> ApiResult<Account> {
    let account = blocking(&state, move |s| s.ctx.account_service.activate(id, &actor)).await??;
    Ok(ApiResponse::with_message(account, "Account activated"))
}

// === Account and service types ===

pub async fn list_account_types(State(state): State<AppState>) -> ApiResult<Vec<AccountType>> {
    let types = blocking(&state, |s| s.ctx.catalog_service.list_account_types()).await??;
    Ok(ApiResponse::ok(types))
}

pub async fn create_account_type(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiJson(input): ApiJson<CatalogInput>,
) -> ApiResult<AccountType> {
    let account_type = blocking(&state, move |s| {
        s.ctx.catalog_service.create_account_type(input, &actor)
    })
    .await??;
    Ok(ApiResponse::created(account_type, "Account type created"))
}

pub async fn update_account_type(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    IdPath(id): IdPath,
    ApiJson(input): ApiJson<CatalogInput>,
) -> ApiResult<AccountType> {
    let account_type = blocking(&state, move |s| {
        s.ctx.catalog_service.update_account_type(id, input, &actor)
    })
    .await??;
    Ok(ApiResponse::with_message(account_type, "Account type updated"))
}

pub async fn list_service_types(State(state): State<AppState>) -> ApiResult<Vec<ServiceType>> {
    let types = blocking(&state, |s| s.ctx.catalog_service.list_service_types()).await??;
    Ok(ApiResponse::ok(types))
}

pub async fn create_service_type(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiJson(input): ApiJson<CatalogInput>,
) -> ApiResult<ServiceType> {
    let service_type = blocking(&state, move |s| {
        s.ctx.catalog_service.create_service_type(input, &actor)
    })
    .await??;
    Ok(ApiResponse::created(service_type, "Service type created"))
}

pub async fn update_service_type(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    IdPath(id): IdPath,
    ApiJson(input): ApiJson<CatalogInput>,
) -> ApiResult<ServiceType> {
    let service_type = blocking(&state, move |s| {
        s.ctx.catalog_service.update_service_type(id, input, &actor)
    })
    .await??;
    Ok(ApiResponse::with_message(service_type, "Service type updated"))
}

// === RFID cards ===

pub async fn list_cards(State(state): State<AppState>) -> ApiResult<Vec<RfidCard>> {
    let cards = blocking(&state, |s| s.ctx.card_service.list()).await??;
    Ok(ApiResponse::ok(cards))
}

pub async fn get_card(State(state): State<AppState>, IdPath(id): IdPath) -> ApiResult<RfidCard> {
    let card = blocking(&state, move |s| s.ctx.card_service.get(id)).await??;
    Ok(ApiResponse::ok(card))
}

pub async fn assign_card(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiJson(input): ApiJson<CardInput>,
) -> ApiResult<RfidCard> {
    let card = blocking(&state, move |s| s.ctx.card_service.assign(input, &actor)).await??;
    Ok(ApiResponse::created(card, "Card assigned"))
}

pub async fn update_card(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    IdPath(id): IdPath,
    ApiJson(input): ApiJson<CardInput>,
) -> ApiResult<RfidCard> {
    let card = blocking(&state, move |s| s.ctx.card_service.update(id, input, &actor)).await??;
    Ok(ApiResponse::with_message(card, "Card updated"))
}

pub async fn remove_card(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    IdPath(id): IdPath,
) -> ApiResult<()> {
    blocking(&state, move |s| s.ctx.card_service.remove(id, &actor)).await??;
    Ok(ApiResponse::with_message((), "Card removed"))
}
