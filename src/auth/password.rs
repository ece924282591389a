//! bcrypt hashing, run on the blocking pool so it never stalls the runtime.

use crate::auth::service::AuthError;
use bcrypt::{hash, verify};

pub async fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    let password = password.to_string();

    tokio::task::spawn_blocking(move || {
        hash(password, cost).map_err(|e| AuthError::Hashing(e.to_string()))
    })
    .await
    .map_err(|e| AuthError::Hashing(format!("Task join error: {}", e)))?
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is malformed.
pub async fn verify_password(password: &str, password_hash: &str) -> Result<bool, AuthError> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();

    tokio::task::spawn_blocking(move || {
        verify(password, &password_hash).map_err(|e| AuthError::Hashing(e.to_string()))
    })
    .await
    .map_err(|e| AuthError::Hashing(format!("Task join error: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimum cost bcrypt accepts; keeps the tests fast
    const TEST_COST: u32 = 4;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hashed = hash_password("s3cret-pass", TEST_COST).await.unwrap();
        assert!(hashed.starts_with("$2"));
        assert_ne!(hashed, "s3cret-pass");

        assert!(verify_password("s3cret-pass", &hashed).await.unwrap());
        assert!(!verify_password("wrong-pass", &hashed).await.unwrap());
    }

    #[tokio::test]
    async fn test_hashes_are_salted() {
        let first = hash_password("same-password", TEST_COST).await.unwrap();
        let second = hash_password("same-password", TEST_COST).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_malformed_hash_is_error() {
        let result = verify_password("whatever", "not-a-bcrypt-hash").await;
        assert!(matches!(result, Err(AuthError::Hashing(_))));
    }

    #[tokio::test]
    async fn test_invalid_cost_is_error() {
        let result = hash_password("password", 2).await;
        assert!(matches!(result, Err(AuthError::Hashing(_))));
    }
}
