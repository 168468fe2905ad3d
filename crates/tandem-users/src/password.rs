//! Argon2id password hashing.
//!
//! Hashes are PHC strings (`$argon2id$v=19$m=...`). Values that already parse
//! as an argon2 PHC string are treated as hashed and never hashed again.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::config::SecurityConfig;
use crate::error::{UserError, UserResult};

/// Whether `value` is an argon2 PHC hash rather than a plain password.
pub fn is_hashed(value: &str) -> bool {
    value.starts_with("$argon2")
        && PasswordHash::new(value).is_ok_and(|hash| hash.salt.is_some() && hash.hash.is_some())
}

#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher").finish_non_exhaustive()
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl PasswordHasher {
    pub fn from_config(config: &SecurityConfig) -> UserResult<Self> {
        let params = Params::new(
            config.argon2_memory_kib,
            config.argon2_iterations,
            config.argon2_parallelism,
            None,
        )
        .map_err(|e| UserError::password_hash(format!("invalid argon2 parameters: {e}")))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn hash(&self, password: &str) -> UserResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self.argon2.hash_password(password.as_bytes(), &salt)?;
        Ok(hash.to_string())
    }

    /// Hashes `password` unless it is already a hash.
    pub fn hash_if_plain(&self, password: &str) -> UserResult<String> {
        if is_hashed(password) {
            return Ok(password.to_string());
        }
        self.hash(password)
    }

    /// Checks `password` against a stored hash. A malformed hash is an error.
    pub fn verify(&self, password: &str, hash: &str) -> UserResult<bool> {
        let parsed = PasswordHash::new(hash)?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::from_config(&SecurityConfig::fast_for_tests()).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash("Tr0ub!e-Ok").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(is_hashed(&hash));
        assert!(hasher.verify("Tr0ub!e-Ok", &hash).unwrap());
        assert!(!hasher.verify("wrong", &hash).unwrap());
        assert!(hasher.verify("x", "not-a-hash").is_err());
    }

    #[test]
    fn test_hash_if_plain_skips_hashes() {
        let hasher = hasher();
        let hash = hasher.hash("Tr0ub!e-Ok").unwrap();
        assert_eq!(hasher.hash_if_plain(&hash).unwrap(), hash);
        assert_ne!(hasher.hash_if_plain("Tr0ub!e-Ok").unwrap(), "Tr0ub!e-Ok");
    }

    #[test]
    fn test_salts_differ() {
        let hasher = hasher();
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn test_plain_values_are_not_hashes() {
        assert!(!is_hashed("Tr0ub!e-Ok"));
        assert!(!is_hashed("$argon2id$garbage"));
        assert!(!is_hashed("$2b$10$abcdefghijklmnopqrstuv"));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let config = SecurityConfig {
            argon2_memory_kib: 1,
            ..SecurityConfig::default()
        };
        assert!(PasswordHasher::from_config(&config).is_err());
    }
}
