//! Password hashing (bcrypt).
//!
//! The encoded hash (`$2b$<cost>$<salt+digest>`) carries its own salt and cost, so
//! verification needs nothing but the stored string. bcrypt is CPU-bound; the async
//! variants run it on the blocking pool and bound it by the caller's `Deadline`.
//!
//! bcrypt reads at most 72 bytes. The non-truncating entry points are used so a longer
//! candidate never matches a hash of its prefix.
use bcrypt::BcryptError;
use thiserror::Error;
use tracing::error;

use crate::deadline::Deadline;

pub const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed")]
    HashingFailure(#[source] BcryptError),
    #[error("password exceeds {MAX_PASSWORD_BYTES} bytes")]
    TooLong,
    #[error("stored password hash is not a valid bcrypt encoding")]
    MalformedHash(#[source] BcryptError),
    #[error("password hashing exceeded its deadline")]
    Timeout,
    #[error("password hashing worker failed")]
    Worker(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        bcrypt::non_truncating_hash(plaintext, self.cost).map_err(|e| match e {
            BcryptError::Truncation(_) => PasswordError::TooLong,
            e => {
                error!(error = %e, "bcrypt hash failed");
                PasswordError::HashingFailure(e)
            }
        })
    }

    /// `Ok(false)` on mismatch, including candidates longer than bcrypt can read;
    /// `Err(MalformedHash)` only when `hashed` cannot be parsed.
    pub fn verify(&self, hashed: &str, candidate: &str) -> Result<bool, PasswordError> {
        match bcrypt::non_truncating_verify(candidate, hashed) {
            Ok(matched) => Ok(matched),
            Err(BcryptError::Truncation(_)) => Ok(false),
            Err(e) => Err(PasswordError::MalformedHash(e)),
        }
    }

    pub async fn hash_within(
        &self,
        plaintext: String,
        deadline: Deadline,
    ) -> Result<String, PasswordError> {
        let hasher = *self;
        let job = tokio::task::spawn_blocking(move || hasher.hash(&plaintext));
        deadline
            .within(job)
            .await
            .map_err(|_| PasswordError::Timeout)??
    }

    pub async fn verify_within(
        &self,
        hashed: String,
        candidate: String,
        deadline: Deadline,
    ) -> Result<bool, PasswordError> {
        let hasher = *self;
        let job = tokio::task::spawn_blocking(move || hasher.verify(&hashed, &candidate));
        deadline
            .within(job)
            .await
            .map_err(|_| PasswordError::Timeout)??
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(4)
    }

    #[test]
    fn hash_then_verify_accepts_same_password() {
        let h = hasher();
        let hashed = h.hash("correct horse").unwrap();
        assert!(hashed.starts_with("$2"));
        assert!(h.verify(&hashed, "correct horse").unwrap());
    }

    #[test]
    fn verify_rejects_other_password() {
        let h = hasher();
        let hashed = h.hash("correct horse").unwrap();
        assert!(!h.verify(&hashed, "battery staple").unwrap());
    }

    #[test]
    fn salts_differ_between_hashes() {
        let h = hasher();
        assert_ne!(h.hash("same").unwrap(), h.hash("same").unwrap());
    }

    #[test]
    fn hash_encodes_its_cost() {
        let hashed = hasher().hash("pw").unwrap();
        assert!(hashed.contains("$04$"));
        // A verifier configured with another cost still reads the stored one.
        assert!(PasswordHasher::new(5).verify(&hashed, "pw").unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error_not_a_mismatch() {
        let err = hasher().verify("not-a-bcrypt-hash", "pw").unwrap_err();
        assert!(matches!(err, PasswordError::MalformedHash(_)));
    }

    #[test]
    fn candidate_longer_than_72_bytes_never_matches_its_prefix() {
        let h = hasher();
        let stored = "a".repeat(MAX_PASSWORD_BYTES);
        let hashed = h.hash(&stored).unwrap();

        assert!(h.verify(&hashed, &stored).unwrap());
        assert!(!h.verify(&hashed, &format!("{stored}DIFFERENT-SUFFIX")).unwrap());
    }

    #[test]
    fn hashing_more_than_72_bytes_is_refused() {
        let err = hasher().hash(&"a".repeat(MAX_PASSWORD_BYTES + 1)).unwrap_err();
        assert!(matches!(err, PasswordError::TooLong));
    }

    #[tokio::test]
    async fn async_variants_round_trip() {
        let h = hasher();
        let deadline = Deadline::after(Duration::from_secs(10));
        let hashed = h.hash_within("pw".to_string(), deadline).await.unwrap();
        assert!(
            h.verify_within(hashed.clone(), "pw".to_string(), deadline)
                .await
                .unwrap()
        );
        assert!(
            !h.verify_within(hashed, "nope".to_string(), deadline)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn elapsed_deadline_times_out() {
        // cost 14 takes well over a millisecond
        let h = PasswordHasher::new(14);
        let err = h
            .hash_within("pw".to_string(), Deadline::after(Duration::from_millis(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, PasswordError::Timeout));
    }
}
