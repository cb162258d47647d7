/*
 * Responsibility
 * - handler が受け取る extractor 群の公開窓口
 */
pub mod auth_ctx;
pub mod json_body;
pub mod public_id;
pub mod query_params;

pub use auth_ctx::{AuthCtx, AuthCtxExtractor};
pub use json_body::{DecodeError, JsonBody};
pub use public_id::PublicTaskId;
pub use query_params::QueryParams;
