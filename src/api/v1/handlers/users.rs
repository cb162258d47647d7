/*
 * Responsibility
 * - /users 系 handler (register / login / me / assign)
 * - JsonBody で受け、DTO validation → AccountService 呼び出し
 * - users は UUID をそのまま扱う (復号化なし)
 */
use axum::{Json, extract::State, http::StatusCode};

use crate::{
    api::v1::{
        dto::users::{
            AssignRoleRequest, LoginRequest, RegisterRequest, TokenResponse, UserResponse,
        },
        extractors::{AuthCtxExtractor, JsonBody},
    },
    error::AppError,
    services::auth::{LoginAttempt, Registration},
    state::AppState,
};

pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    req.validate()
        .map_err(|msg| AppError::bad_request("INVALID_INPUT", msg))?;

    let user = state
        .accounts
        .register(Registration {
            username: req.username,
            password: req.password,
            role: req.role,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    req.validate()
        .map_err(|msg| AppError::bad_request("INVALID_INPUT", msg))?;

    let issued = state
        .accounts
        .login(LoginAttempt {
            username: req.username,
            password: req.password,
            role: req.role,
        })
        .await?;

    Ok(Json(TokenResponse {
        token: issued.token,
        token_type: "Bearer",
        expires_in: issued.expires_in,
    }))
}

pub async fn me(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.accounts.current_user(ctx.user_id).await?;
    Ok(Json(user.into()))
}

pub async fn assign_role(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    JsonBody(req): JsonBody<AssignRoleRequest>,
) -> Result<Json<UserResponse>, AppError> {
    req.validate()
        .map_err(|msg| AppError::bad_request("INVALID_INPUT", msg))?;

    let user = state
        .accounts
        .assign_role(&ctx.identity(), &req.username, req.role)
        .await?;

    Ok(Json(user.into()))
}
