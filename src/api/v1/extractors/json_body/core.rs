/*
 * Responsibility
 * - Json<T> の薄いラッパー。rejection を DecodeError に変換する
 * - handler はこの extractor だけを使い、エラー応答の形は AppError 側で統一する
 */
use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    response::{IntoResponse, Response},
};

use super::DecodeError;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = DecodeError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

impl IntoResponse for DecodeError {
    fn into_response(self) -> Response {
        tracing::debug!(error = %self, "request body rejected");
        AppError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, header};
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Payload {
        name: String,
    }

    fn request(content_type: Option<&str>, body: &'static str) -> Request {
        let mut builder = HttpRequest::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn decode(req: Request) -> Result<JsonBody<Payload>, DecodeError> {
        JsonBody::<Payload>::from_request(req, &()).await
    }

    #[tokio::test]
    async fn valid_body_is_decoded() {
        let JsonBody(p) = decode(request(Some("application/json"), r#"{"name":"a"}"#))
            .await
            .unwrap();
        assert_eq!(p.name, "a");
    }

    #[tokio::test]
    async fn syntax_error_is_tagged() {
        let err = decode(request(Some("application/json"), "{nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, DecodeError::Syntax(_)));
    }

    #[tokio::test]
    async fn wrong_shape_is_data_mismatch() {
        let err = decode(request(Some("application/json"), r#"{"name":1}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, DecodeError::DataMismatch(_)));
    }

    #[tokio::test]
    async fn missing_content_type_is_tagged() {
        let err = decode(request(None, r#"{"name":"a"}"#)).await.unwrap_err();
        assert!(matches!(err, DecodeError::MissingContentType));
    }

    #[tokio::test]
    async fn rejection_renders_as_400() {
        let err = decode(request(Some("application/json"), "{nope"))
            .await
            .unwrap_err();
        assert_eq!(
            err.into_response().status(),
            axum::http::StatusCode::BAD_REQUEST
        );
    }
}
