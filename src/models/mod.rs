/*
 * Responsibility
 * - repo / service / handler で共有するドメイン型
 */
pub mod task;
pub mod user;

pub use task::{NewTask, Task, TaskPatch};
pub use user::{Identity, NewUser, Role, User};
