/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - 認証不要 (health / register / login) と gate 配下 (users/me, users/assign, tasks) を分けて merge
 * - gate は middleware::auth::access::apply で gated 側にだけ掛ける
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware;
use crate::state::AppState;

use crate::api::v1::handlers::{
    health::health,
    tasks::{create_task, delete_task, get_task, list_tasks, update_task},
    users::{assign_role, login, me, register},
};

pub fn routes(state: AppState) -> Router<AppState> {
    let open = Router::new()
        .route("/health", get(health))
        .route("/users/register", post(register))
        .route("/users/login", post(login));

    let gated = Router::new()
        .route("/users/me", get(me))
        .route("/users/assign", post(assign_role))
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/{task_id}",
            get(get_task).put(update_task).delete(delete_task),
        );
    let gated = middleware::auth::access::apply(gated, state);

    open.merge(gated)
}
