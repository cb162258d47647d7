/*
 * Responsibility
 * - Users / 認証系の request/response DTO
 * - validation (形式チェック) 用の validate() を持たせる
 * - password_hash はレスポンスに含めない
 */
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Role, User};
use crate::services::auth::password::MAX_PASSWORD_BYTES;

const MAX_USERNAME_CHARS: usize = 64;

fn validate_credentials(username: &str, password: &str) -> Result<(), &'static str> {
    let username = username.trim();
    if username.is_empty() {
        return Err("username is required");
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        return Err("username must be <= 64 chars");
    }
    let password = password.trim();
    if password.is_empty() {
        return Err("password is required");
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err("password must be <= 72 bytes");
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub role: Option<Role>,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_credentials(&self.username, &self.password)
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub role: Option<Role>,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.username.trim().is_empty() {
            return Err("username is required");
        }
        if self.password.is_empty() {
            return Err("password is required");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub username: String,
    pub role: Role,
}

impl AssignRoleRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.username.trim().is_empty() {
            return Err("username is required");
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}
