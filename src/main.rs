/*
 * Responsibility
 * - tokio runtime の起動
 * - app::run() の呼び出し（ロジックは置かない）
 */
use anyhow::Result;

mod api;
mod app;
mod config;
mod deadline;
mod error;
mod middleware;
mod models;
mod repos;
mod services;
mod state;

#[tokio::main]
async fn main() -> Result<()> {
    app::run().await
}
