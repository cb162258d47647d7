/*
 * Responsibility
 * - /tasks 系 CRUD handler (すべて gate の内側)
 * - Path の公開 ID は PublicTaskId extractor で内部 ID に復号済み
 * - レスポンスの id は IdCodec で encode して返す
 */
use axum::{Json, extract::State, http::StatusCode};

use crate::{
    api::v1::{
        dto::tasks::{CreateTaskRequest, ListTasksQuery, TaskResponse, UpdateTaskRequest},
        extractors::{AuthCtxExtractor, JsonBody, PublicTaskId, QueryParams},
    },
    deadline::Deadline,
    error::AppError,
    models::Task,
    state::AppState,
};

fn to_response(state: &AppState, task: Task) -> Result<TaskResponse, AppError> {
    let public_id = state.id_codec.encode(task.id)?;
    Ok(TaskResponse::new(public_id, task))
}

fn task_not_found() -> AppError {
    AppError::not_found("TASK_NOT_FOUND", "task not found")
}

pub async fn list_tasks(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListTasksQuery>,
) -> Result<Json<Vec<TaskResponse>>, AppError> {
    let (limit, offset) = query.bounds();
    let rows = state
        .tasks
        .list(limit, offset, Deadline::after(state.store_timeout))
        .await?;

    let res = rows
        .into_iter()
        .map(|t| to_response(&state, t))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(res))
}

pub async fn get_task(
    State(state): State<AppState>,
    task_id: PublicTaskId,
) -> Result<Json<TaskResponse>, AppError> {
    let task = state
        .tasks
        .get(task_id.id, Deadline::after(state.store_timeout))
        .await?
        .ok_or_else(task_not_found)?;

    Ok(Json(to_response(&state, task)?))
}

pub async fn create_task(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    JsonBody(req): JsonBody<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), AppError> {
    req.validate()
        .map_err(|msg| AppError::bad_request("INVALID_INPUT", msg))?;

    let task = state
        .tasks
        .create(
            req.into_new_task(ctx.user_id),
            Deadline::after(state.store_timeout),
        )
        .await?;

    tracing::info!(task_id = task.id, created_by = %ctx.username, "task created");
    Ok((StatusCode::CREATED, Json(to_response(&state, task)?)))
}

pub async fn update_task(
    State(state): State<AppState>,
    task_id: PublicTaskId,
    JsonBody(req): JsonBody<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, AppError> {
    req.validate()
        .map_err(|msg| AppError::bad_request("INVALID_INPUT", msg))?;

    let task = state
        .tasks
        .update(
            task_id.id,
            req.into_patch(),
            Deadline::after(state.store_timeout),
        )
        .await?
        .ok_or_else(task_not_found)?;

    Ok(Json(to_response(&state, task)?))
}

pub async fn delete_task(
    State(state): State<AppState>,
    task_id: PublicTaskId,
) -> Result<StatusCode, AppError> {
    let deleted = state
        .tasks
        .delete(task_id.id, Deadline::after(state.store_timeout))
        .await?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(task_not_found())
    }
}
