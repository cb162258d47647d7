/*
 * Responsibility
 * - Query<T> の薄いラッパー。rejection を AppError (400 INVALID_QUERY) に変換する
 * - エラー応答を JSON `{ "error", "code" }` に揃える
 */
use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryParams<T>(pub T);

impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                AppError::bad_request("INVALID_QUERY", rejection.body_text())
            })?;
        Ok(Self(value))
    }
}
