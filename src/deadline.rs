//! Explicit per-operation deadline threaded through store and hashing calls.
use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, error::Elapsed, timeout_at};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self(Instant::now() + budget)
    }

    pub fn is_elapsed(&self) -> bool {
        Instant::now() >= self.0
    }

    /// Drive `fut` until it completes or the deadline passes.
    pub async fn within<F: Future>(self, fut: F) -> Result<F::Output, Elapsed> {
        timeout_at(self.0, fut).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_before_deadline() {
        let deadline = Deadline::after(Duration::from_secs(1));
        let out = deadline.within(async { 7 }).await;
        assert_eq!(out.ok(), Some(7));
        assert!(!deadline.is_elapsed());
    }

    #[tokio::test]
    async fn slow_future_is_cut_off() {
        let deadline = Deadline::after(Duration::from_millis(10));
        let out = deadline
            .within(tokio::time::sleep(Duration::from_millis(200)))
            .await;
        assert!(out.is_err());
        assert!(deadline.is_elapsed());
    }
}
