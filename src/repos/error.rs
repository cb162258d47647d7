/**
 * Responsibility
 * - repo が上位に伝える意味の定義
 */
use thiserror::Error;

// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";
const BOOTSTRAP_INDEX: &str = "users_single_bootstrap";

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("db error")]
    Db(#[source] sqlx::Error),
    #[error("username already taken")]
    DuplicateUsername,
    #[error("bootstrap account already exists")]
    BootstrapTaken,
    #[error("record not found")]
    NotFound,
    #[error("store call exceeded its deadline")]
    Timeout,
    #[error("invalid stored value in column {0}")]
    InvalidRow(&'static str),
}

pub type RepoResult<T> = Result<T, RepoError>;

impl RepoError {
    pub fn from_sqlx(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(dbe) = &e
            && dbe.code().as_deref() == Some(UNIQUE_VIOLATION)
        {
            return match dbe.constraint() {
                Some(BOOTSTRAP_INDEX) => RepoError::BootstrapTaken,
                _ => RepoError::DuplicateUsername,
            };
        }
        RepoError::Db(e)
    }
}
