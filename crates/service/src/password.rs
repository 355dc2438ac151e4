//! Argon2 password hashing for stored client credentials.
//!
//! Hashing and verification are CPU-bound; async callers go through
//! [`blocking`] so they never run on a runtime worker.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::ServiceError;

/// Runs `f` on the blocking thread pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ServiceError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServiceError::Task(e.to_string()))
}

/// Hashes a plaintext password into a PHC string.
///
/// # Errors
/// Returns [`ServiceError::Validation`] for an empty password.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    if password.is_empty() {
        return Err(ServiceError::Validation("password must not be empty".into()));
    }
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ServiceError::Validation(format!("failed to hash password: {e}")))?;
    Ok(hash.to_string())
}

/// `false` for a wrong password or a malformed stored hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("secret").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("secret", &hash));
        assert!(!verify_password("Secret", &hash));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("secret", "secret"));
    }

    #[tokio::test]
    async fn test_blocking_work_leaves_the_runtime_thread() {
        let caller = std::thread::current().id();
        let (worker, verified) = blocking(move || {
            let hash = hash_password("secret").unwrap();
            (std::thread::current().id(), verify_password("secret", &hash))
        })
        .await
        .unwrap();
        assert_ne!(worker, caller);
        assert!(verified);
    }

    #[test]
    fn test_empty_password_is_rejected() {
        assert!(matches!(hash_password(""), Err(ServiceError::Validation(_))));
    }
}
