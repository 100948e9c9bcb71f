/// Argon2id password hashing and verification
///
/// Hashes are stored as PHC strings, so the salt and cost parameters travel
/// with the hash and verification needs no configuration.
use crate::config::PasswordConfig;
use crate::error::{AuthError, AuthResult};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{
    PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};

/// Configured Argon2id hasher
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    pub fn new(config: &PasswordConfig) -> AuthResult<Self> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| AuthError::Internal(format!("Invalid password hash parameters: {}", e)))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a plaintext password with a fresh random salt
    pub fn hash_password(&self, password: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Internal(format!("Failed to hash password: {}", e)))?;

        Ok(hash.to_string())
    }

    /// Hash on the blocking pool
    pub async fn hash(&self, password: String) -> AuthResult<String> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash_password(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    /// Verify on the blocking pool
    pub async fn verify(&self, password: String, hash: String) -> AuthResult<bool> {
        tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("Password verification task failed: {}", e)))
    }
}

/// Verify a plaintext password against a stored PHC hash
///
/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is malformed");
            return false;
        }
    };

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => true,
        Err(argon2::password_hash::Error::Password) => false,
        Err(e) => {
            tracing::warn!(error = %e, "Password verification failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_hasher() -> PasswordHasher {
        PasswordHasher::new(&PasswordConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = cheap_hasher();
        let hash = hasher.hash_password("Secret123!").unwrap();

        assert!(hash.starts_with("$argon2id$"), "expected argon2id PHC prefix");
        assert!(hash.contains("m=1024,t=1,p=1"), "configured costs should be embedded");
        assert!(verify_password("Secret123!", &hash));
        assert!(!verify_password("Secret123?", &hash));
    }

    #[test]
    fn test_salts_differ() {
        let hasher = cheap_hasher();
        let a = hasher.hash_password("Secret123!").unwrap();
        let b = hasher.hash_password("Secret123!").unwrap();
        assert_ne!(a, b, "each hash should use a fresh salt");
    }

    #[test]
    fn test_malformed_hash_is_mismatch() {
        assert!(!verify_password("Secret123!", "not-a-phc-string"));
        assert!(!verify_password("Secret123!", ""));
    }

    #[test]
    fn test_rejects_invalid_params() {
        let result = PasswordHasher::new(&PasswordConfig {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_async_hash_and_verify() {
        let hasher = cheap_hasher();
        let hash = hasher.hash("Secret123!".to_string()).await.unwrap();
        assert!(hasher.verify("Secret123!".to_string(), hash.clone()).await.unwrap());
        assert!(!hasher.verify("wrong".to_string(), hash).await.unwrap());
    }
}
