/*
 * Responsibility
 * - 永続化の抽象 (trait) と実装 (Postgres / in-memory)
 * - すべての呼び出しは Deadline を受け取り、超過したら RepoError::Timeout
 */
use std::future::Future;

use crate::deadline::Deadline;

pub mod error;
pub mod memory;
pub mod task_repo;
pub mod user_repo;

pub use error::{RepoError, RepoResult};
pub use memory::{MemoryTaskRepo, MemoryUserRepo};
pub use task_repo::{PgTaskRepo, TaskRepository};
pub use user_repo::{PgUserRepo, UserRepository};

/// Run a sqlx future under `deadline`, mapping both failure modes into `RepoError`.
pub(crate) async fn bounded<T, F>(deadline: Deadline, fut: F) -> RepoResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    deadline
        .within(fut)
        .await
        .map_err(|_| RepoError::Timeout)?
        .map_err(RepoError::from_sqlx)
}
