/*
 * Responsibility
 * - アプリ共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / JSON error body `{ "error", "code" }`)
 * - 各層のエラー (repo / id codec / accounts / gate / body decode) を統一的に変換
 * - 内部エラーの詳細はログにのみ出し、レスポンスには汎用メッセージだけを返す
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::api::v1::extractors::DecodeError;
use crate::repos::error::RepoError;
use crate::services::auth::{AccountError, GateError, TokenError};
use crate::services::id_codec::IdCodecError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{code}: {message}")]
    BadRequest { code: &'static str, message: String },
    #[error("{code}: {message}")]
    Unauthorized { code: &'static str, message: String },
    #[error("{code}: {message}")]
    Forbidden { code: &'static str, message: String },
    #[error("{code}: {message}")]
    NotFound { code: &'static str, message: String },
    #[error("{code}: {message}")]
    Conflict { code: &'static str, message: String },
    #[error("{code}: {message}")]
    PayloadTooLarge { code: &'static str, message: String },
    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(code: &'static str, message: impl Into<String>) -> Self {
        Self::Unauthorized {
            code,
            message: message.into(),
        }
    }

    pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        Self::Forbidden {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound {
            code,
            message: message.into(),
        }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
        }
    }

    /// Log the underlying failure and collapse it into a generic 500.
    pub fn internal(err: &dyn std::error::Error) -> Self {
        error!(error = %err, source = ?err.source(), "internal failure");
        Self::Internal
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match self {
            AppError::BadRequest { code, message }
            | AppError::Unauthorized { code, message }
            | AppError::Forbidden { code, message }
            | AppError::NotFound { code, message }
            | AppError::Conflict { code, message }
            | AppError::PayloadTooLarge { code, message } => (code, message),
            AppError::Internal => ("INTERNAL_SERVER_ERROR", "internal server error".into()),
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                code,
            }),
        )
            .into_response()
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => AppError::not_found("NOT_FOUND", "resource not found"),
            RepoError::DuplicateUsername => {
                AppError::conflict("USER_ALREADY_EXISTS", "username already exists")
            }
            RepoError::BootstrapTaken => AppError::conflict(
                "BOOTSTRAP_CONFLICT",
                "the first account was created concurrently; retry registration",
            ),
            other => AppError::internal(&other),
        }
    }
}

impl From<IdCodecError> for AppError {
    fn from(e: IdCodecError) -> Self {
        if e.is_client_error() {
            // Client supplied a malformed public id (e.g. /tasks/{task_id})
            AppError::bad_request("INVALID_PUBLIC_ID", "invalid id")
        } else {
            AppError::internal(&e)
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::TokenExpired => AppError::unauthorized("TOKEN_EXPIRED", e.to_string()),
            TokenError::TokenNotYetValid => {
                AppError::unauthorized("TOKEN_NOT_YET_VALID", e.to_string())
            }
            TokenError::Signing(_) => AppError::internal(&e),
            _ => AppError::bad_request("INVALID_TOKEN", e.to_string()),
        }
    }
}

impl From<GateError> for AppError {
    fn from(e: GateError) -> Self {
        match e {
            GateError::MissingAuthHeader => {
                AppError::unauthorized("MISSING_AUTH_HEADER", e.to_string())
            }
            GateError::MalformedAuthHeader => {
                AppError::unauthorized("MALFORMED_AUTH_HEADER", e.to_string())
            }
            GateError::Token(token) => token.into(),
            GateError::IdentityNotFound => AppError::not_found("USER_NOT_FOUND", e.to_string()),
            GateError::Forbidden { .. } => {
                AppError::forbidden("FORBIDDEN", "you are not authorized to use this route")
            }
            GateError::Store(store) => AppError::internal(&store),
        }
    }
}

impl From<AccountError> for AppError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::InvalidInput(message) => AppError::bad_request("INVALID_INPUT", message),
            AccountError::UserAlreadyExists => {
                AppError::conflict("USER_ALREADY_EXISTS", e.to_string())
            }
            AccountError::PrivilegeEscalationDenied => {
                AppError::conflict("PRIVILEGE_ESCALATION_DENIED", e.to_string())
            }
            AccountError::BootstrapConflict => {
                AppError::conflict("BOOTSTRAP_CONFLICT", e.to_string())
            }
            AccountError::UserNotFound => AppError::not_found("USER_NOT_FOUND", e.to_string()),
            AccountError::IncorrectCredentials => {
                AppError::unauthorized("INVALID_CREDENTIALS", e.to_string())
            }
            AccountError::Forbidden => AppError::forbidden("FORBIDDEN", e.to_string()),
            AccountError::Password(inner) => AppError::internal(&inner),
            AccountError::Token(inner) => AppError::internal(&inner),
            AccountError::Store(inner) => AppError::internal(&inner),
        }
    }
}

impl From<DecodeError> for AppError {
    fn from(e: DecodeError) -> Self {
        let message = e.to_string();
        match e {
            DecodeError::Syntax(_) => AppError::bad_request("JSON_SYNTAX_ERROR", message),
            DecodeError::DataMismatch(_) => AppError::bad_request("JSON_DATA_ERROR", message),
            DecodeError::MissingContentType => {
                AppError::bad_request("MISSING_JSON_CONTENT_TYPE", message)
            }
            DecodeError::TooLarge => AppError::PayloadTooLarge {
                code: "PAYLOAD_TOO_LARGE",
                message,
            },
            DecodeError::Other(_) => AppError::bad_request("INVALID_BODY", message),
        }
    }
}
