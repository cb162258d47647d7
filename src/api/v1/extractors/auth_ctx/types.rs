/*
 * Responsibility
 * - Handler から見える「認証済みコンテキスト」の型
 * - middleware (RequestGate) が検証して request extensions に格納し、handler はこの型だけを受け取る
 */
use uuid::Uuid;

use crate::models::{Identity, Role};

/// 認証済みのリクエストに付与されるコンテキスト
///
/// - `user_id` は credential store 上の ID (トークンには含まれず、gate が解決する)
/// - `role` はトークンの claim 由来
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCtx {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl AuthCtx {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id,
            username: self.username.clone(),
            role: self.role,
        }
    }
}

impl From<Identity> for AuthCtx {
    fn from(identity: Identity) -> Self {
        Self {
            user_id: identity.user_id,
            username: identity.username,
            role: identity.role,
        }
    }
}
