/*
 * Responsibility
 * - 環境変数や設定の読み込み (DATABASE_URL, 署名シークレット, TTL, CORS 許可など)
 * - 設定値のバリデーション (不足なら起動失敗)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

// 720 hours
const DEFAULT_TOKEN_TTL_SECONDS: u64 = 2_592_000;
const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        match std::env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Absent (or blank) -> `default`; present but unparseable -> `ConfigError::Invalid`.
fn parse_or<T: FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid(key)),
    }
}

fn parse_flag(key: &'static str, raw: Option<String>) -> Result<bool, ConfigError> {
    match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") => Ok(false),
        Some("1" | "true" | "yes") => Ok(true),
        Some("0" | "false" | "no") => Ok(false),
        Some(_) => Err(ConfigError::Invalid(key)),
    }
}

fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    parse_or(key, std::env::var(key).ok(), default)
}

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    // None -> in-memory stores (local runs only)
    pub database_url: Option<String>,
    pub store_timeout: Duration,

    pub cors_allowed_origins: Vec<String>,

    pub sqids_min_length: usize,
    pub sqids_alphabet: String,

    pub token_signing_secret: String,
    pub token_ttl_seconds: u64,
    pub bcrypt_cost: u32,
    pub auth_policy_fail_open: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print the signing secret or credentials embedded in DATABASE_URL
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("database", &self.database_url.is_some())
            .field("store_timeout", &self.store_timeout)
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("auth_policy_fail_open", &self.auth_policy_fail_open)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = env_or("PORT", 3000)?;

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_env();

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let store_timeout_ms: u64 = env_or("STORE_TIMEOUT_MS", 5_000)?;
        if store_timeout_ms == 0 {
            return Err(ConfigError::Invalid("STORE_TIMEOUT_MS"));
        }

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let sqids_min_length: usize = env_or("SQIDS_MIN_LENGTH", 10)?;

        let sqids_alphabet = std::env::var("SQIDS_ALPHABET").unwrap_or_else(|_| {
            "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789".to_string()
        });

        let token_signing_secret = std::env::var("TOKEN_SIGNING_SECRET")
            .map_err(|_| ConfigError::Missing("TOKEN_SIGNING_SECRET"))?;
        if token_signing_secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::Invalid("TOKEN_SIGNING_SECRET"));
        }

        let token_ttl_seconds: u64 = env_or("TOKEN_TTL_SECONDS", DEFAULT_TOKEN_TTL_SECONDS)?;
        if token_ttl_seconds == 0 {
            return Err(ConfigError::Invalid("TOKEN_TTL_SECONDS"));
        }

        let bcrypt_cost: u32 = env_or("BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid("BCRYPT_COST"));
        }

        let auth_policy_fail_open = parse_flag(
            "AUTH_POLICY_FAIL_OPEN",
            std::env::var("AUTH_POLICY_FAIL_OPEN").ok(),
        )?;

        Ok(Self {
            addr,
            app_env,
            database_url,
            store_timeout: Duration::from_millis(store_timeout_ms),
            cors_allowed_origins,
            sqids_min_length,
            sqids_alphabet,
            token_signing_secret,
            token_ttl_seconds,
            bcrypt_cost,
            auth_policy_fail_open,
        })
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_seconds)
    }
}

#[cfg(test)]
impl Config {
    /// In-memory configuration with a cheap bcrypt cost.
    pub fn for_tests() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            app_env: AppEnv::Development,
            database_url: None,
            store_timeout: Duration::from_secs(5),
            cors_allowed_origins: Vec::new(),
            sqids_min_length: 10,
            sqids_alphabet: "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789"
                .to_string(),
            token_signing_secret: "test-signing-secret-with-at-least-32-bytes".to_string(),
            token_ttl_seconds: 3_600,
            bcrypt_cost: 4,
            auth_policy_fail_open: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_or_blank_value_uses_default() {
        assert_eq!(parse_or("STORE_TIMEOUT_MS", None, 5_000u64).unwrap(), 5_000);
        assert_eq!(
            parse_or("STORE_TIMEOUT_MS", Some("  ".to_string()), 5_000u64).unwrap(),
            5_000
        );
    }

    #[test]
    fn present_value_is_parsed() {
        assert_eq!(
            parse_or("TOKEN_TTL_SECONDS", Some(" 60 ".to_string()), 1u64).unwrap(),
            60
        );
    }

    #[test]
    fn malformed_value_fails_instead_of_falling_back() {
        for key in ["STORE_TIMEOUT_MS", "TOKEN_TTL_SECONDS", "SQIDS_MIN_LENGTH"] {
            let err = parse_or(key, Some("abc".to_string()), 1usize).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(k) if k == key));
        }
        assert!(parse_or("STORE_TIMEOUT_MS", Some("-5".to_string()), 1u64).is_err());
    }

    #[test]
    fn fail_open_flag_is_strict() {
        let flag = |v: &str| parse_flag("AUTH_POLICY_FAIL_OPEN", Some(v.to_string()));
        assert!(flag("TRUE").unwrap());
        assert!(!flag("no").unwrap());
        assert!(!parse_flag("AUTH_POLICY_FAIL_OPEN", None).unwrap());
        assert!(flag("maybe").is_err());
    }
}
