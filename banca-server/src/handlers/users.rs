//! Staff roles, users and login

use axum::extract::State;
use serde::Deserialize;

use banca_core::services::{NewUser, RoleInput, UserUpdate};
use banca_core::{Role, User};

use super::blocking;
use crate::extract::{ApiJson, CurrentUser, IdPath};
use crate::{ApiResponse, ApiResult, AppState};

pub async fn list_roles(State(state): State<AppState>) -> ApiResult<Vec<Role>> {
    let roles = blocking(&state, |s| s.ctx.user_service.list_roles()).await??;
    Ok(ApiResponse::ok(roles))
}

pub async fn create_role(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiJson(input): ApiJson<RoleInput>,
) -> ApiResult<Role> {
    let role = blocking(&state, move |s| s.ctx.user_service.create_role(input, &actor)).await??;
    Ok(ApiResponse::created(role, "Role created"))
}

pub async fn update_role(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    IdPath(id): IdPath,
    ApiJson(input): ApiJson<RoleInput>,
) -> ApiResult<Role> {
    let role =
        blocking(&state, move |s| s.ctx.user_service.update_role(id, input, &actor)).await??;
    Ok(ApiResponse::with_message(role, "Role updated"))
}

pub async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    let users = blocking(&state, |s| s.ctx.user_service.list_users()).await??;
    Ok(ApiResponse::ok(users))
}

pub async fn create_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiJson(input): ApiJson<NewUser>,
) -> ApiResult<User> {
    let user = blocking(&state, move |s| s.ctx.user_service.create_user(input, &actor)).await??;
    Ok(ApiResponse::created(user, "User created"))
}

pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    IdPath(id): IdPath,
    ApiJson(input): ApiJson<UserUpdate>,
) -> ApiResult<User> {
    let user =
        blocking(&state, move |s| s.ctx.user_service.update_user(id, input, &actor)).await??;
    Ok(ApiResponse::with_message(user, "User updated"))
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    IdPath(id): IdPath,
) -> ApiResult<User> {
    let user = blocking(&state, move |s| s.ctx.user_service.deactivate_user(id, &actor)).await??;
    Ok(ApiResponse::with_message(user, "User deactivated"))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<User> {
    let user = blocking(&state, move |s| {
        s.ctx
            .user_service
            .authenticate(&request.username, &request.password)
    })
    .await??;
    Ok(ApiResponse::with_message(user, "Login successful"))
}
