//! Request gate: the per-request admission pipeline.
//!
//! `NoAuth -> HeaderPresent -> TokenParsed/ClaimsValid -> IdentityResolved -> PolicyChecked
//! -> Admitted`. Every failure is terminal. Steps before identity resolution do no I/O; the
//! pipeline performs at most one credential-store read.
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, Method, header};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::deadline::Deadline;
use crate::models::{Identity, Role};
use crate::repos::{RepoError, UserRepository};
use crate::services::auth::policy::AccessPolicy;
use crate::services::auth::token::{TokenCodec, TokenError};

#[derive(Debug, Error)]
pub enum GateError {
    #[error("authorization header is required")]
    MissingAuthHeader,
    #[error("invalid authorization header")]
    MalformedAuthHeader,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("user not found")]
    IdentityNotFound,
    #[error("role {role} may not use {method}")]
    Forbidden { method: Method, role: Role },
    #[error("credential store failure")]
    Store(#[from] RepoError),
}

pub struct RequestGate {
    users: Arc<dyn UserRepository>,
    tokens: Arc<TokenCodec>,
    policy: Arc<AccessPolicy>,
    store_timeout: Duration,
}

impl std::fmt::Debug for RequestGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGate")
            .field("policy", &self.policy)
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}

impl RequestGate {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: Arc<TokenCodec>,
        policy: Arc<AccessPolicy>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            users,
            tokens,
            policy,
            store_timeout,
        }
    }

    pub async fn admit(&self, headers: &HeaderMap, method: &Method) -> Result<Identity, GateError> {
        let token = bearer_token(headers)?;

        let claims = self.tokens.verify(token).inspect_err(|err| {
            if err.is_freshness() {
                info!(error = %err, "session token outside its validity window");
            } else {
                warn!(error = %err, "session token verification failed");
            }
        })?;

        // Re-resolve so tokens for accounts that no longer exist stop working.
        let deadline = Deadline::after(self.store_timeout);
        let user = self
            .users
            .find_by_username(&claims.username, deadline)
            .await?
            .filter(|u| u.username == claims.username)
            .ok_or_else(|| {
                warn!(username = %claims.username, "token subject not found in store");
                GateError::IdentityNotFound
            })?;

        if !self.policy.is_allowed(method, claims.role) {
            warn!(username = %claims.username, role = %claims.role, %method, "access denied by policy");
            return Err(GateError::Forbidden {
                method: method.clone(),
                role: claims.role,
            });
        }

        debug!(
            username = %user.username,
            role = %claims.role,
            %method,
            issued_at = claims.issued_at,
            expires_at = claims.expires_at,
            "request admitted"
        );
        Ok(Identity {
            user_id: user.id,
            username: user.username,
            role: claims.role,
        })
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// Exactly two whitespace-separated parts; the scheme is compared case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, GateError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(GateError::MissingAuthHeader)?;
    let value = value.to_str().map_err(|_| GateError::MalformedAuthHeader)?;

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(GateError::MalformedAuthHeader),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;
    use crate::models::NewUser;
    use crate::repos::MemoryUserRepo;
    use crate::services::auth::policy::UnlistedMethod;

    const SECRET: &[u8] = b"gate-test-secret-gate-test-secret";
    const HOUR: Duration = Duration::from_secs(3_600);

    struct Fixture {
        repo: MemoryUserRepo,
        tokens: Arc<TokenCodec>,
        gate: RequestGate,
    }

    async fn fixture() -> Fixture {
        let repo = MemoryUserRepo::new();
        for (username, role, bootstrap) in [("root", Role::Admin, true), ("bob", Role::User, false)]
        {
            repo.create(
                NewUser {
                    username: username.to_string(),
                    password_hash: "$2b$04$unused".to_string(),
                    role,
                    bootstrap,
                },
                Deadline::after(HOUR),
            )
            .await
            .unwrap();
        }

        let tokens = Arc::new(TokenCodec::new(SECRET));
        let gate = RequestGate::new(
            Arc::new(repo.clone()),
            tokens.clone(),
            Arc::new(AccessPolicy::new(UnlistedMethod::Deny)),
            Duration::from_secs(5),
        );
        Fixture { repo, tokens, gate }
    }

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token(&headers("Bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(&headers("bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(&headers("BEARER   abc")).unwrap(), "abc");
    }

    #[test]
    fn header_shape_is_enforced() {
        for bad in ["Bearer", "Basic abc", "Bearer a b", "abc", "Token abc"] {
            assert!(
                matches!(
                    bearer_token(&headers(bad)),
                    Err(GateError::MalformedAuthHeader)
                ),
                "{bad:?} should be malformed"
            );
        }
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(GateError::MissingAuthHeader)
        ));
    }

    #[tokio::test]
    async fn missing_header_is_rejected_without_store_io() {
        let f = fixture().await;
        let before = f.repo.read_count();

        let err = f.gate.admit(&HeaderMap::new(), &Method::GET).await.unwrap_err();

        assert!(matches!(err, GateError::MissingAuthHeader));
        assert_eq!(f.repo.read_count(), before);
    }

    #[tokio::test]
    async fn bad_token_is_rejected_without_store_io() {
        let f = fixture().await;
        let before = f.repo.read_count();

        let err = f
            .gate
            .admit(&headers("Bearer not.a.token"), &Method::GET)
            .await
            .unwrap_err();

        assert!(matches!(err, GateError::Token(TokenError::MalformedToken)));
        assert_eq!(f.repo.read_count(), before);
    }

    #[tokio::test]
    async fn admin_token_is_admitted_for_writes() {
        let f = fixture().await;
        let token = f.tokens.issue("root", Role::Admin, HOUR).unwrap();

        let identity = f
            .gate
            .admit(&headers(&format!("Bearer {token}")), &Method::POST)
            .await
            .unwrap();

        assert_eq!(identity.username, "root");
        assert_eq!(identity.role, Role::Admin);
    }

    #[tokio::test]
    async fn user_token_is_read_only() {
        let f = fixture().await;
        let token = f.tokens.issue("bob", Role::User, HOUR).unwrap();
        let h = headers(&format!("Bearer {token}"));

        assert!(f.gate.admit(&h, &Method::GET).await.is_ok());
        let err = f.gate.admit(&h, &Method::POST).await.unwrap_err();
        assert!(matches!(
            err,
            GateError::Forbidden {
                role: Role::User,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn token_for_unknown_user_is_rejected() {
        let f = fixture().await;
        let token = f.tokens.issue("ghost", Role::Admin, HOUR).unwrap();

        let err = f
            .gate
            .admit(&headers(&format!("Bearer {token}")), &Method::GET)
            .await
            .unwrap_err();

        assert!(matches!(err, GateError::IdentityNotFound));
        assert_eq!(f.repo.read_count(), 1);
    }

    #[tokio::test]
    async fn expired_token_is_a_freshness_failure() {
        let f = fixture().await;
        let issued = chrono::Utc::now() - chrono::Duration::hours(2);
        let token = f
            .tokens
            .issue_at("bob", Role::User, HOUR, issued)
            .unwrap();

        let err = f
            .gate
            .admit(&headers(&format!("Bearer {token}")), &Method::GET)
            .await
            .unwrap_err();

        assert!(matches!(err, GateError::Token(TokenError::TokenExpired)));
    }

    #[tokio::test]
    async fn slow_store_surfaces_timeout() {
        let repo = MemoryUserRepo::new().with_latency(Duration::from_millis(200));
        let tokens = Arc::new(TokenCodec::new(SECRET));
        let gate = RequestGate::new(
            Arc::new(repo),
            tokens.clone(),
            Arc::new(AccessPolicy::default()),
            Duration::from_millis(10),
        );
        let token = tokens.issue("bob", Role::User, HOUR).unwrap();

        let err = gate
            .admit(&headers(&format!("Bearer {token}")), &Method::GET)
            .await
            .unwrap_err();

        assert!(matches!(err, GateError::Store(RepoError::Timeout)));
    }
}
