pub mod accounts;
pub mod factory;
pub mod gate;
pub mod password;
pub mod policy;
pub mod token;

pub use accounts::{AccountError, AccountService, LoginAttempt, Registration};
pub use factory::build_auth_services;
pub use gate::{GateError, RequestGate};
pub use password::PasswordHasher;
pub use policy::{AccessPolicy, UnlistedMethod};
pub use token::{TokenCodec, TokenError};
