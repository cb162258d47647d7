//! Account use cases: registration, login, role assignment, current-user lookup.
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::deadline::Deadline;
use crate::models::{Identity, NewUser, Role, User};
use crate::repos::{RepoError, UserRepository};
use crate::services::auth::password::{MAX_PASSWORD_BYTES, PasswordError, PasswordHasher};
use crate::services::auth::token::{TokenCodec, TokenError};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("username already exists")]
    UserAlreadyExists,
    #[error("an admin needs to promote you to admin")]
    PrivilegeEscalationDenied,
    #[error("the first account was created concurrently; retry registration")]
    BootstrapConflict,
    #[error("user not found")]
    UserNotFound,
    #[error("invalid credentials")]
    IncorrectCredentials,
    #[error("only an admin may assign roles")]
    Forbidden,
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Store(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub username: String,
    pub password: String,
    // Asserted by the caller; checked against the stored role, never used as a grant.
    pub role: Option<Role>,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: u64,
}

pub struct AccountService {
    users: Arc<dyn UserRepository>,
    hasher: PasswordHasher,
    tokens: Arc<TokenCodec>,
    token_ttl: Duration,
    store_timeout: Duration,
}

impl std::fmt::Debug for AccountService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountService")
            .field("hasher", &self.hasher)
            .field("token_ttl", &self.token_ttl)
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        hasher: PasswordHasher,
        tokens: Arc<TokenCodec>,
        token_ttl: Duration,
        store_timeout: Duration,
    ) -> Self {
        Self {
            users,
            hasher,
            tokens,
            token_ttl,
            store_timeout,
        }
    }

    /// Register a new account.
    ///
    /// - The first account in an empty store becomes admin whatever role was requested.
    /// - Afterwards, self-registration as admin is refused.
    ///
    /// The count and the existence check are separate reads. The store rejects a second
    /// bootstrap row, so a concurrent first registration loses with `BootstrapConflict`.
    pub async fn register(&self, reg: Registration) -> Result<User, AccountError> {
        let username = reg.username.trim();
        let password = reg.password.trim();
        if username.is_empty() {
            return Err(AccountError::InvalidInput("username is required"));
        }
        if password.is_empty() {
            return Err(AccountError::InvalidInput("password is required"));
        }
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(AccountError::InvalidInput("password must be <= 72 bytes"));
        }

        let deadline = Deadline::after(self.store_timeout);
        let existing_users = self.users.count(deadline).await?;
        if self
            .users
            .find_by_username(username, deadline)
            .await?
            .is_some()
        {
            return Err(AccountError::UserAlreadyExists);
        }

        let requested = reg.role.unwrap_or_default();
        let (role, bootstrap) = match (existing_users, requested) {
            (0, _) => (Role::Admin, true),
            (_, Role::Admin) => {
                warn!(username, "self-registration as admin refused");
                return Err(AccountError::PrivilegeEscalationDenied);
            }
            (_, role) => (role, false),
        };

        let password_hash = self
            .hasher
            .hash_within(password.to_string(), deadline)
            .await?;
        // A future that is ready on first poll would still complete past the deadline.
        if deadline.is_elapsed() {
            return Err(AccountError::Store(RepoError::Timeout));
        }

        let user = self
            .users
            .create(
                NewUser {
                    username: username.to_string(),
                    password_hash,
                    role,
                    bootstrap,
                },
                deadline,
            )
            .await
            .map_err(|e| match e {
                RepoError::DuplicateUsername => AccountError::UserAlreadyExists,
                RepoError::BootstrapTaken => AccountError::BootstrapConflict,
                other => AccountError::Store(other),
            })?;

        info!(user_id = %user.id, username = %user.username, role = %user.role, bootstrap, "user registered");
        Ok(user)
    }

    /// Verify credentials and issue a session token for the persisted identity.
    ///
    /// A wrong password and a wrong asserted role produce the same error.
    pub async fn login(&self, attempt: LoginAttempt) -> Result<IssuedToken, AccountError> {
        let username = attempt.username.trim();
        let deadline = Deadline::after(self.store_timeout);

        let user = self
            .users
            .find_by_username(username, deadline)
            .await?
            .ok_or(AccountError::UserNotFound)?;

        let password_ok = self
            .hasher
            .verify_within(
                user.password_hash.clone(),
                attempt.password.trim().to_string(),
                deadline,
            )
            .await?;

        if !password_ok || attempt.role != Some(user.role) {
            warn!(username = %user.username, "login rejected");
            return Err(AccountError::IncorrectCredentials);
        }

        let token = self.tokens.issue(&user.username, user.role, self.token_ttl)?;
        info!(user_id = %user.id, role = %user.role, "session token issued");

        Ok(IssuedToken {
            token,
            expires_in: self.token_ttl.as_secs(),
        })
    }

    /// Change another user's role. Only admins may do this.
    pub async fn assign_role(
        &self,
        actor: &Identity,
        username: &str,
        role: Role,
    ) -> Result<User, AccountError> {
        if actor.role != Role::Admin {
            warn!(actor = %actor.username, "role assignment by non-admin refused");
            return Err(AccountError::Forbidden);
        }

        let username = username.trim();
        if username.is_empty() {
            return Err(AccountError::InvalidInput("username is required"));
        }

        let deadline = Deadline::after(self.store_timeout);
        let target = self
            .users
            .find_by_username(username, deadline)
            .await?
            .ok_or(AccountError::UserNotFound)?;

        let updated = self
            .users
            .update_role(target.id, role, deadline)
            .await
            .map_err(|e| match e {
                RepoError::NotFound => AccountError::UserNotFound,
                other => AccountError::Store(other),
            })?;

        info!(actor = %actor.username, target = %updated.username, role = %updated.role, "role assigned");
        Ok(updated)
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<User, AccountError> {
        let deadline = Deadline::after(self.store_timeout);
        self.users
            .find_by_id(user_id, deadline)
            .await?
            .ok_or(AccountError::UserNotFound)
    }
}
