/// Factory: build the account service and the request gate from application `Config`.
use std::sync::Arc;

use tracing::warn;

use crate::config::Config;
use crate::repos::UserRepository;
use crate::services::auth::{
    AccessPolicy, AccountService, PasswordHasher, RequestGate, TokenCodec, UnlistedMethod,
};

#[derive(Debug, Clone)]
pub struct AuthServices {
    pub accounts: Arc<AccountService>,
    pub gate: Arc<RequestGate>,
}

pub fn build_auth_services(config: &Config, users: Arc<dyn UserRepository>) -> AuthServices {
    let tokens = Arc::new(TokenCodec::new(config.token_signing_secret.as_bytes()));

    let unlisted = if config.auth_policy_fail_open {
        warn!("AUTH_POLICY_FAIL_OPEN is enabled: methods outside the access table are allowed for every role");
        UnlistedMethod::Allow
    } else {
        UnlistedMethod::Deny
    };

    let accounts = AccountService::new(
        users.clone(),
        PasswordHasher::new(config.bcrypt_cost),
        tokens.clone(),
        config.token_ttl(),
        config.store_timeout,
    );
    let gate = RequestGate::new(
        users,
        tokens,
        Arc::new(AccessPolicy::new(unlisted)),
        config.store_timeout,
    );

    AuthServices {
        accounts: Arc::new(accounts),
        gate: Arc::new(gate),
    }
}
