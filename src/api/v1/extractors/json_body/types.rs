/*
 * Responsibility
 * - JSON body の decode 失敗を分類したエラー型
 * - axum の JsonRejection をここで一度だけ解釈し、以降は enum で分岐する
 */
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("request body is not valid JSON: {0}")]
    Syntax(String),
    #[error("request body does not match the expected shape: {0}")]
    DataMismatch(String),
    #[error("expected request with `Content-Type: application/json`")]
    MissingContentType,
    #[error("request body is too large")]
    TooLarge,
    #[error("failed to read request body: {0}")]
    Other(String),
}

impl From<JsonRejection> for DecodeError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonSyntaxError(e) => Self::Syntax(e.body_text()),
            JsonRejection::JsonDataError(e) => Self::DataMismatch(e.body_text()),
            JsonRejection::MissingJsonContentType(_) => Self::MissingContentType,
            JsonRejection::BytesRejection(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                Self::TooLarge
            }
            other => Self::Other(other.body_text()),
        }
    }
}
