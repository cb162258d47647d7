/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - tasks: TaskRepository, accounts: AccountService, gate: RequestGate, id_codec: IdCodec
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::repos::{TaskRepository, UserRepository};
use crate::services::auth::{AccountService, RequestGate, build_auth_services};
use crate::services::id_codec::{IdCodec, IdCodecError};

#[derive(Clone)]
pub struct AppState {
    pub tasks: Arc<dyn TaskRepository>,
    pub accounts: Arc<AccountService>,
    pub gate: Arc<RequestGate>,
    pub id_codec: IdCodec,
    pub store_timeout: Duration,
}

impl AppState {
    pub fn new(
        config: &Config,
        users: Arc<dyn UserRepository>,
        tasks: Arc<dyn TaskRepository>,
    ) -> Result<Self, IdCodecError> {
        let id_codec = IdCodec::new(config.sqids_min_length, &config.sqids_alphabet)?;
        let auth = build_auth_services(config, users);

        Ok(Self {
            tasks,
            accounts: auth.accounts,
            gate: auth.gate,
            id_codec,
            store_timeout: config.store_timeout,
        })
    }
}
