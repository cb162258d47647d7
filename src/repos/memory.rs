//! In-memory repositories.
//!
//! Used by the tests and by local runs without `DATABASE_URL`. They enforce the same
//! constraints as the Postgres schema (unique username, single bootstrap row) and honour the
//! caller's `Deadline`. An optional artificial latency lets tests exercise timeouts.
use std::collections::BTreeMap;
use std::sync::Arc;
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::deadline::Deadline;
use crate::models::{NewTask, NewUser, Role, Task, TaskPatch, User};
use crate::repos::error::{RepoError, RepoResult};
use crate::repos::task_repo::TaskRepository;
use crate::repos::user_repo::UserRepository;

#[derive(Debug, Default)]
struct UserTable {
    rows: Vec<StoredUser>,
}

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    bootstrap: bool,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryUserRepo {
    table: Arc<RwLock<UserTable>>,
    #[cfg(test)]
    reads: Arc<AtomicUsize>,
    latency: Option<Duration>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of read calls (`find_*`, `count`) served so far.
    #[cfg(test)]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn record_read(&self) {
        #[cfg(test)]
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepo {
    async fn find_by_username(
        &self,
        username: &str,
        deadline: Deadline,
    ) -> RepoResult<Option<User>> {
        self.record_read();
        deadline
            .within(async {
                self.simulate_latency().await;
                let table = self.table.read().await;
                table
                    .rows
                    .iter()
                    .find(|r| r.user.username == username)
                    .map(|r| r.user.clone())
            })
            .await
            .map_err(|_| RepoError::Timeout)
    }

    async fn find_by_id(&self, id: Uuid, deadline: Deadline) -> RepoResult<Option<User>> {
        self.record_read();
        deadline
            .within(async {
                self.simulate_latency().await;
                let table = self.table.read().await;
                table
                    .rows
                    .iter()
                    .find(|r| r.user.id == id)
                    .map(|r| r.user.clone())
            })
            .await
            .map_err(|_| RepoError::Timeout)
    }

    async fn count(&self, deadline: Deadline) -> RepoResult<u64> {
        self.record_read();
        deadline
            .within(async {
                self.simulate_latency().await;
                self.table.read().await.rows.len() as u64
            })
            .await
            .map_err(|_| RepoError::Timeout)
    }

    async fn create(&self, new_user: NewUser, deadline: Deadline) -> RepoResult<User> {
        deadline
            .within(async {
                self.simulate_latency().await;
                let mut table = self.table.write().await;

                if table
                    .rows
                    .iter()
                    .any(|r| r.user.username == new_user.username)
                {
                    return Err(RepoError::DuplicateUsername);
                }
                if new_user.bootstrap && table.rows.iter().any(|r| r.bootstrap) {
                    return Err(RepoError::BootstrapTaken);
                }

                let user = User {
                    id: Uuid::new_v4(),
                    username: new_user.username,
                    password_hash: new_user.password_hash,
                    role: new_user.role,
                };
                table.rows.push(StoredUser {
                    user: user.clone(),
                    bootstrap: new_user.bootstrap,
                });
                Ok(user)
            })
            .await
            .map_err(|_| RepoError::Timeout)?
    }

    async fn update_role(&self, id: Uuid, role: Role, deadline: Deadline) -> RepoResult<User> {
        deadline
            .within(async {
                self.simulate_latency().await;
                let mut table = self.table.write().await;
                let row = table
                    .rows
                    .iter_mut()
                    .find(|r| r.user.id == id)
                    .ok_or(RepoError::NotFound)?;
                row.user.role = role;
                Ok(row.user.clone())
            })
            .await
            .map_err(|_| RepoError::Timeout)?
    }
}

#[derive(Debug, Default)]
struct TaskTable {
    next_id: i64,
    rows: BTreeMap<i64, Task>,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryTaskRepo {
    table: Arc<RwLock<TaskTable>>,
}

impl MemoryTaskRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRepository for MemoryTaskRepo {
    async fn list(&self, limit: i64, offset: i64, deadline: Deadline) -> RepoResult<Vec<Task>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let offset = usize::try_from(offset).unwrap_or(0);
        deadline
            .within(async {
                let table = self.table.read().await;
                table
                    .rows
                    .values()
                    .rev()
                    .skip(offset)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .await
            .map_err(|_| RepoError::Timeout)
    }

    async fn get(&self, id: i64, deadline: Deadline) -> RepoResult<Option<Task>> {
        deadline
            .within(async { self.table.read().await.rows.get(&id).cloned() })
            .await
            .map_err(|_| RepoError::Timeout)
    }

    async fn create(&self, new_task: NewTask, deadline: Deadline) -> RepoResult<Task> {
        deadline
            .within(async {
                let mut table = self.table.write().await;
                table.next_id += 1;
                let now = Utc::now();
                let task = Task {
                    id: table.next_id,
                    title: new_task.title,
                    description: new_task.description,
                    status: new_task.status,
                    priority: new_task.priority,
                    due_date: new_task.due_date,
                    created_by: new_task.created_by,
                    created_at: now,
                    updated_at: now,
                };
                table.rows.insert(task.id, task.clone());
                task
            })
            .await
            .map_err(|_| RepoError::Timeout)
    }

    async fn update(
        &self,
        id: i64,
        patch: TaskPatch,
        deadline: Deadline,
    ) -> RepoResult<Option<Task>> {
        deadline
            .within(async {
                let mut table = self.table.write().await;
                let Some(task) = table.rows.get_mut(&id) else {
                    return None;
                };
                if let Some(title) = patch.title {
                    task.title = title;
                }
                if let Some(description) = patch.description {
                    task.description = description;
                }
                if let Some(status) = patch.status {
                    task.status = status;
                }
                if let Some(priority) = patch.priority {
                    task.priority = priority;
                }
                if let Some(due_date) = patch.due_date {
                    task.due_date = due_date;
                }
                task.updated_at = Utc::now();
                Some(task.clone())
            })
            .await
            .map_err(|_| RepoError::Timeout)
    }

    async fn delete(&self, id: i64, deadline: Deadline) -> RepoResult<bool> {
        deadline
            .within(async { self.table.write().await.rows.remove(&id).is_some() })
            .await
            .map_err(|_| RepoError::Timeout)
    }
}
