/**
 * Responsibility
 *  - core と types を束ねる
 */
mod core;
mod types;

pub use core::JsonBody;
pub use types::DecodeError;
