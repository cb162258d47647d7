/*
 * Responsibility
 * - 認証情報ストア (users) の抽象 UserRepository
 * - Postgres 実装 PgUserRepo (PgPool を保持)
 * - username の一意性と bootstrap 管理者の一意性は DB 制約で担保する
 */
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::deadline::Deadline;
use crate::models::{NewUser, Role, User};
use crate::repos::bounded;
use crate::repos::error::{RepoError, RepoResult};

/// Credential store capability consumed by the auth use cases and the request gate.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &str, deadline: Deadline)
    -> RepoResult<Option<User>>;

    async fn find_by_id(&self, id: Uuid, deadline: Deadline) -> RepoResult<Option<User>>;

    async fn count(&self, deadline: Deadline) -> RepoResult<u64>;

    // Fails with DuplicateUsername / BootstrapTaken when a store constraint rejects the row.
    async fn create(&self, new_user: NewUser, deadline: Deadline) -> RepoResult<User>;

    // Fails with NotFound when no user has `id`.
    async fn update_role(&self, id: Uuid, role: Role, deadline: Deadline) -> RepoResult<User>;
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    password_hash: String,
    role: String,
}

impl TryFrom<UserRow> for User {
    type Error = RepoError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|_| RepoError::InvalidRow("role"))?;
        Ok(User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            role,
        })
    }
}

#[derive(Clone, Debug)]
pub struct PgUserRepo {
    pool: PgPool,
}

impl PgUserRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepo {
    async fn find_by_username(
        &self,
        username: &str,
        deadline: Deadline,
    ) -> RepoResult<Option<User>> {
        let row = bounded(
            deadline,
            sqlx::query_as::<_, UserRow>(
                r#"
                SELECT id, username, password_hash, role
                FROM users
                WHERE username = $1
                "#,
            )
            .bind(username)
            .fetch_optional(&self.pool),
        )
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_id(&self, id: Uuid, deadline: Deadline) -> RepoResult<Option<User>> {
        let row = bounded(
            deadline,
            sqlx::query_as::<_, UserRow>(
                r#"
                SELECT id, username, password_hash, role
                FROM users
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn count(&self, deadline: Deadline) -> RepoResult<u64> {
        let n = bounded(
            deadline,
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users").fetch_one(&self.pool),
        )
        .await?;

        u64::try_from(n).map_err(|_| RepoError::InvalidRow("count"))
    }

    async fn create(&self, new_user: NewUser, deadline: Deadline) -> RepoResult<User> {
        let row = bounded(
            deadline,
            sqlx::query_as::<_, UserRow>(
                r#"
                INSERT INTO users (username, password_hash, role, bootstrap)
                VALUES ($1, $2, $3, $4)
                RETURNING id, username, password_hash, role
                "#,
            )
            .bind(&new_user.username)
            .bind(&new_user.password_hash)
            .bind(new_user.role.as_str())
            .bind(new_user.bootstrap)
            .fetch_one(&self.pool),
        )
        .await?;

        User::try_from(row)
    }

    async fn update_role(&self, id: Uuid, role: Role, deadline: Deadline) -> RepoResult<User> {
        let row = bounded(
            deadline,
            sqlx::query_as::<_, UserRow>(
                r#"
                UPDATE users
                SET role = $2
                WHERE id = $1
                RETURNING id, username, password_hash, role
                "#,
            )
            .bind(id)
            .bind(role.as_str())
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(RepoError::NotFound)?;

        User::try_from(row)
    }
}
