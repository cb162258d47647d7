/*
 * Responsibility
 * - Tasks の request/response DTO
 * - 公開 ID は encode 済みの値を返す (内部 ID を漏らさない)
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::models::{NewTask, Task, TaskPatch};

const DEFAULT_STATUS: &str = "pending";
const DEFAULT_PRIORITY: &str = "medium";
const MAX_TITLE_CHARS: usize = 200;

/// `null` -> `Some(None)`; combined with `#[serde(default)]` a missing field stays `None`.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

impl CreateTaskRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err("title is required");
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err("title must be <= 200 chars");
        }
        if let Some(status) = &self.status
            && status.trim().is_empty()
        {
            return Err("status cannot be empty");
        }
        if let Some(priority) = &self.priority
            && priority.trim().is_empty()
        {
            return Err("priority cannot be empty");
        }
        Ok(())
    }

    pub fn into_new_task(self, created_by: Uuid) -> NewTask {
        NewTask {
            title: self.title.trim().to_string(),
            description: self.description,
            status: self.status.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            priority: self.priority.unwrap_or_else(|| DEFAULT_PRIORITY.to_string()),
            due_date: self.due_date,
            created_by,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    // Tri-state:
    // - None: field missing (do not update)
    // - Some(None): null (clear)
    // - Some(Some(v)): set value
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl UpdateTaskRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err("title cannot be empty");
            }
            if title.trim().chars().count() > MAX_TITLE_CHARS {
                return Err("title must be <= 200 chars");
            }
        }
        if let Some(status) = &self.status
            && status.trim().is_empty()
        {
            return Err("status cannot be empty");
        }
        if let Some(priority) = &self.priority
            && priority.trim().is_empty()
        {
            return Err("priority cannot be empty");
        }
        Ok(())
    }

    pub fn into_patch(self) -> TaskPatch {
        TaskPatch {
            title: self.title.map(|t| t.trim().to_string()),
            description: self.description,
            status: self.status,
            priority: self.priority,
            due_date: self.due_date,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListTasksQuery {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 200;

    pub fn bounds(&self) -> (i64, i64) {
        let limit = self
            .limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: String, // encoded
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub due_date: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskResponse {
    pub fn new(public_id: String, task: Task) -> Self {
        Self {
            id: public_id,
            title: task.title,
            description: task.description,
            status: task.status,
            priority: task.priority,
            due_date: task.due_date,
            created_by: task.created_by,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}
