/*
 * Responsibility
 * - tasks CRUD の抽象 TaskRepository と Postgres 実装
 * - 内部 ID は BIGSERIAL (公開時は IdCodec で encode する)
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::deadline::Deadline;
use crate::models::{NewTask, Task, TaskPatch};
use crate::repos::bounded;
use crate::repos::error::RepoResult;

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn list(&self, limit: i64, offset: i64, deadline: Deadline) -> RepoResult<Vec<Task>>;

    async fn get(&self, id: i64, deadline: Deadline) -> RepoResult<Option<Task>>;

    async fn create(&self, new_task: NewTask, deadline: Deadline) -> RepoResult<Task>;

    async fn update(&self, id: i64, patch: TaskPatch, deadline: Deadline)
    -> RepoResult<Option<Task>>;

    async fn delete(&self, id: i64, deadline: Deadline) -> RepoResult<bool>;
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct TaskRow {
    id: i64,
    title: String,
    description: String,
    status: String,
    priority: String,
    due_date: Option<DateTime<Utc>>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            id: row.id,
            title: row.title,
            description: row.description,
            status: row.status,
            priority: row.priority,
            due_date: row.due_date,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PgTaskRepo {
    pool: PgPool,
}

impl PgTaskRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for PgTaskRepo {
    async fn list(&self, limit: i64, offset: i64, deadline: Deadline) -> RepoResult<Vec<Task>> {
        let rows = bounded(
            deadline,
            sqlx::query_as::<_, TaskRow>(
                r#"
                SELECT
                    id, title, description, status, priority, due_date,
                    created_by, created_at, updated_at
                FROM tasks
                ORDER BY id DESC
                LIMIT $1 OFFSET $2
                "#,
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool),
        )
        .await?;

        Ok(rows.into_iter().map(Task::from).collect())
    }

    async fn get(&self, id: i64, deadline: Deadline) -> RepoResult<Option<Task>> {
        let row = bounded(
            deadline,
            sqlx::query_as::<_, TaskRow>(
                r#"
                SELECT
                    id, title, description, status, priority, due_date,
                    created_by, created_at, updated_at
                FROM tasks
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.map(Task::from))
    }

    async fn create(&self, new_task: NewTask, deadline: Deadline) -> RepoResult<Task> {
        let row = bounded(
            deadline,
            sqlx::query_as::<_, TaskRow>(
                r#"
                INSERT INTO tasks (title, description, status, priority, due_date, created_by)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING
                    id, title, description, status, priority, due_date,
                    created_by, created_at, updated_at
                "#,
            )
            .bind(&new_task.title)
            .bind(&new_task.description)
            .bind(&new_task.status)
            .bind(&new_task.priority)
            .bind(new_task.due_date)
            .bind(new_task.created_by)
            .fetch_one(&self.pool),
        )
        .await?;

        Ok(row.into())
    }

    async fn update(
        &self,
        id: i64,
        patch: TaskPatch,
        deadline: Deadline,
    ) -> RepoResult<Option<Task>> {
        let row = bounded(
            deadline,
            sqlx::query_as::<_, TaskRow>(
                r#"
                UPDATE tasks
                SET
                    title = COALESCE($2, title),
                    description = COALESCE($3, description),
                    status = COALESCE($4, status),
                    priority = COALESCE($5, priority),
                    due_date = CASE
                        WHEN $6 = false THEN due_date
                        ELSE $7
                    END,
                    updated_at = now()
                WHERE id = $1
                RETURNING
                    id, title, description, status, priority, due_date,
                    created_by, created_at, updated_at
                "#,
            )
            .bind(id)
            .bind(patch.title.as_deref())
            .bind(patch.description.as_deref())
            .bind(patch.status.as_deref())
            .bind(patch.priority.as_deref())
            .bind(patch.due_date.is_some()) // $6: flag to set due_date
            .bind(patch.due_date.flatten()) // $7: new due_date value
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.map(Task::from))
    }

    async fn delete(&self, id: i64, deadline: Deadline) -> RepoResult<bool> {
        let result = bounded(
            deadline,
            sqlx::query(
                r#"
                DELETE FROM tasks
                WHERE id = $1
                "#,
            )
            .bind(id)
            .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
