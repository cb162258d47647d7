//! Bearer token 検証 → AuthCtx を extensions に入れる
//!
//! 判定そのもの (header 形式 / 署名・期限 / store 再解決 / method × role) は
//! `services::auth::RequestGate` が行い、ここは HTTP との接続だけを担う。

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::api::v1::extractors::AuthCtx;
use crate::error::AppError;
use crate::state::AppState;

/// gate 配下にしたい Router に認証・認可の middleware を適用する。
///
/// ```ignore
/// let gated = middleware::auth::access::apply(gated, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let identity = state.gate.admit(req.headers(), req.method()).await?;

    // middleware → extractor への受け渡し
    req.extensions_mut().insert(AuthCtx::from(identity));

    Ok(next.run(req).await)
}
