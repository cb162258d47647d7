use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::models::Role;

const HMAC_FAMILY: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
const HMAC_NAMES: [&str; 3] = ["HS256", "HS384", "HS512"];

// Errors returned by session token issuance / verification.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token")]
    MalformedToken,
    #[error("unexpected signing method: {0}")]
    UnexpectedAlgorithm(String),
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token is missing the '{0}' claim")]
    MissingClaim(&'static str),
    #[error("token carries an invalid '{0}' claim")]
    InvalidClaim(&'static str),
    #[error("token expired")]
    TokenExpired,
    #[error("token is not valid yet")]
    TokenNotYetValid,
    #[error("failed to sign token")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl TokenError {
    /// Freshness failures (the token was genuine, only its time window is wrong).
    pub fn is_freshness(&self) -> bool {
        matches!(self, Self::TokenExpired | Self::TokenNotYetValid)
    }
}

/// Wire form of the token payload.
#[derive(Debug, Serialize)]
struct SessionClaims<'a> {
    username: &'a str,
    role: Role,
    iat: i64,
    exp: i64,
}

// Every field optional so absent claims are reported as MissingClaim, not as a JSON error.
#[derive(Debug, Deserialize)]
struct RawClaims {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    exp: Option<i64>,
}

// Only the algorithm is read before the signature check. `jsonwebtoken::decode_header`
// refuses names outside its `Algorithm` enum (e.g. "none"), which would hide them as
// MalformedToken.
#[derive(Debug, Deserialize)]
struct RawHeader {
    alg: String,
}

fn header_algorithm(token: &str) -> Result<String, TokenError> {
    let segment = token.split('.').next().unwrap_or_default();
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::MalformedToken)?;
    let header: RawHeader =
        serde_json::from_slice(&bytes).map_err(|_| TokenError::MalformedToken)?;
    Ok(header.alg)
}

/// Claims of a token that passed every verification step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub username: String,
    pub role: Role,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// HMAC-signed session token codec.
///
/// The server keeps no session record: a token is the session, valid within `[iat, exp)`
/// while its signature verifies against the current secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("TokenCodec")
            .field("algorithms", &self.validation.algorithms)
            .finish()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = HMAC_FAMILY.to_vec();
        // Time window and required claims are checked explicitly in `verify_at`.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn issue(&self, username: &str, role: Role, ttl: Duration) -> Result<String, TokenError> {
        self.issue_at(username, role, ttl, Utc::now())
    }

    /// Deterministic for a fixed `now` and secret.
    pub fn issue_at(
        &self,
        username: &str,
        role: Role,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let iat = now.timestamp();
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = SessionClaims {
            username,
            role,
            iat,
            exp: iat.saturating_add(ttl_secs),
        };

        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".to_string());
        jsonwebtoken::encode(&header, &claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "failed to sign session token");
            TokenError::Signing(e)
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        // 1. structure
        let alg = header_algorithm(token)?;

        // 2. algorithm family (algorithm-confusion defence)
        if !HMAC_NAMES.contains(&alg.as_str()) {
            return Err(TokenError::UnexpectedAlgorithm(alg));
        }

        // 3. signature
        let data = jsonwebtoken::decode::<RawClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::InvalidAlgorithm => TokenError::UnexpectedAlgorithm(alg.clone()),
                _ => TokenError::MalformedToken,
            })?;
        let raw = data.claims;

        // 4. timestamps
        let issued_at = raw.iat.ok_or(TokenError::MissingClaim("iat"))?;
        let expires_at = raw.exp.ok_or(TokenError::MissingClaim("exp"))?;

        // 5. freshness
        let now = now.timestamp();
        if now >= expires_at {
            return Err(TokenError::TokenExpired);
        }
        if now < issued_at {
            return Err(TokenError::TokenNotYetValid);
        }

        // 6. identity
        let role = raw
            .role
            .ok_or(TokenError::MissingClaim("role"))?
            .parse::<Role>()
            .map_err(|_| TokenError::InvalidClaim("role"))?;
        let username = raw
            .username
            .filter(|u| !u.is_empty())
            .ok_or(TokenError::MissingClaim("username"))?;

        Ok(Claims {
            username,
            role,
            issued_at,
            expires_at,
        })
    }
}
