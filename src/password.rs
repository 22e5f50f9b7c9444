//! Password hashing with bcrypt.

use std::sync::LazyLock;

use tracing::warn;

/// bcrypt cost factor (2^10 rounds).
pub const BCRYPT_COST: u32 = 10;

/// Hash verified when the login email is unknown, so both failure paths do the same work.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| bcrypt::hash("dummy-password-for-timing", BCRYPT_COST).ok());

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
    #[error("hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Hash a password. The output embeds algorithm, cost and salt (`$2b$10$...`).
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    Ok(bcrypt::hash(password, BCRYPT_COST)?)
}

/// Verify a password against a stored hash.
/// A malformed hash is treated as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match bcrypt::verify(password, hash) {
        Ok(valid) => valid,
        Err(e) => {
            warn!(error = %e, "Stored password hash is malformed");
            false
        }
    }
}

/// Verify against the user's hash, or against a dummy hash when there is no user.
/// Always returns false in the latter case.
pub fn verify_password_or_dummy(password: &str, hash: Option<&str>) -> bool {
    match hash {
        Some(hash) => verify_password(password, hash),
        None => {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = bcrypt::verify(password, dummy);
            }
            false
        }
    }
}

/// Hash on the blocking pool so request workers are not stalled by bcrypt.
pub async fn hash_password_blocking(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}

/// [`verify_password_or_dummy`] on the blocking pool. A failed task counts as a mismatch.
pub async fn verify_password_blocking(password: String, hash: Option<String>) -> bool {
    tokio::task::spawn_blocking(move || verify_password_or_dummy(&password, hash.as_deref()))
        .await
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_self_describing() {
        let hash = hash_password("hunter22").unwrap();
        assert_ne!(hash, "hunter22");
        assert!(hash.starts_with("$2b$10$"), "unexpected hash format: {}", hash);
    }

    #[test]
    fn test_verify_roundtrip() {
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
    }

    #[test]
    fn test_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_fails_verification() {
        assert!(!verify_password("hunter22", "not-a-bcrypt-hash"));
        assert!(!verify_password("hunter22", ""));
    }

    #[test]
    fn test_unknown_user_never_verifies() {
        assert!(!verify_password_or_dummy("dummy-password-for-timing", None));
    }

    #[tokio::test]
    async fn test_blocking_helpers() {
        let hash = hash_password_blocking("hunter22".into()).await.unwrap();
        assert!(verify_password_blocking("hunter22".into(), Some(hash.clone())).await);
        assert!(!verify_password_blocking("wrong".into(), Some(hash)).await);
        assert!(!verify_password_blocking("hunter22".into(), None).await);
    }
}
