//! Password Service
//!
//! Argon2id hashing (OWASP recommended) for account passwords and for
//! refresh-token secrets before they are stored.
//! Features:
//! - Configurable parameters following OWASP guidelines
//! - Password length validation
//! - Optional pepper for additional security
//! - Verification through the hash scheme's own constant-time compare

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use zeroize::Zeroizing;

use crate::config::PasswordConfig;
use crate::error::{AuthError, AuthResult};

/// Password service for hashing and verification
#[derive(Clone)]
pub struct PasswordService {
    config: PasswordConfig,
    params: Params,
}

impl PasswordService {
    /// Create a new password service; fails on invalid Argon2 parameters
    pub fn new(config: PasswordConfig) -> AuthResult<Self> {
        let params = Params::new(
            config.memory_cost,
            config.time_cost,
            config.parallelism,
            Some(config.hash_length as usize),
        )
        .map_err(|e| AuthError::Config(format!("Invalid Argon2 params: {}", e)))?;

        Ok(Self { config, params })
    }

    /// Validate and hash a password using Argon2id
    pub fn hash_password(&self, password: &str) -> AuthResult<String> {
        self.validate_password_strength(password)?;
        self.hash_secret(password)
    }

    /// Hash an arbitrary secret (refresh tokens) without strength checks
    pub fn hash_secret(&self, secret: &str) -> AuthResult<String> {
        let peppered = self.pepper(secret);
        let salt = SaltString::generate(&mut OsRng);

        self.argon2()
            .hash_password(peppered.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| AuthError::PasswordHashingFailed)
    }

    /// Verify a password against a stored hash.
    ///
    /// Never fails: an absent hash (federated-only account) or a malformed
    /// stored hash both verify as `false`.
    pub fn verify_password(&self, password: &str, hash: Option<&str>) -> bool {
        let Some(hash) = hash else {
            return false;
        };

        let parsed_hash = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash is malformed");
                return false;
            }
        };

        let peppered = self.pepper(password);
        // Parameters are read from the PHC string, not from `self.params`
        Argon2::default()
            .verify_password(peppered.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Verify a raw refresh token against its stored hash
    pub fn verify_token_hash(&self, token: &str, hash: &str) -> bool {
        self.verify_password(token, Some(hash))
    }

    /// Validate password strength
    pub fn validate_password_strength(&self, password: &str) -> AuthResult<()> {
        let length = password.chars().count();

        if length < self.config.min_password_length {
            return Err(AuthError::WeakPassword(format!(
                "Password must be at least {} characters",
                self.config.min_password_length
            )));
        }

        if length > self.config.max_password_length {
            return Err(AuthError::WeakPassword(format!(
                "Password must be at most {} characters",
                self.config.max_password_length
            )));
        }

        if password.trim().is_empty() {
            return Err(AuthError::WeakPassword(
                "Password must not be blank".to_string(),
            ));
        }

        Ok(())
    }

    /// Check if a password hash was produced with different parameters
    pub fn needs_rehash(&self, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => match Params::try_from(&parsed) {
                Ok(params) => {
                    params.m_cost() != self.params.m_cost()
                        || params.t_cost() != self.params.t_cost()
                        || params.p_cost() != self.params.p_cost()
                }
                Err(_) => true,
            },
            Err(_) => true,
        }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    fn pepper(&self, secret: &str) -> Zeroizing<String> {
        match self.config.pepper {
            Some(ref pepper) => Zeroizing::new(format!("{}{}", secret, pepper)),
            None => Zeroizing::new(secret.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> PasswordService {
        PasswordService::new(PasswordConfig::fast()).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let service = service();
        let hash = service.hash_password("secret123").unwrap();
        assert!(hash.starts_with("$argon2id$"));

        assert!(service.verify_password("secret123", Some(&hash)));
        assert!(!service.verify_password("secret124", Some(&hash)));
    }

    #[test]
    fn test_absent_hash_never_verifies() {
        assert!(!service().verify_password("secret123", None));
    }

    #[test]
    fn test_malformed_hash_is_false_not_error() {
        assert!(!service().verify_password("secret123", Some("not-a-phc-string")));
    }

    #[test]
    fn test_hash_with_pepper() {
        let mut config = PasswordConfig::fast();
        config.pepper = Some("secret-pepper".to_string());
        let peppered = PasswordService::new(config).unwrap();

        let hash = peppered.hash_password("secret123").unwrap();
        assert!(peppered.verify_password("secret123", Some(&hash)));
        assert!(!service().verify_password("secret123", Some(&hash)));
    }

    #[test]
    fn test_password_validation() {
        let service = service();
        assert!(service.validate_password_strength("secret123").is_ok());
        assert!(matches!(
            service.validate_password_strength("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(service.validate_password_strength(&"x".repeat(129)).is_err());
        assert!(service.validate_password_strength("         ").is_err());
    }

    #[test]
    fn test_token_hash_round() {
        let service = service();
        let hash = service.hash_secret("header.payload.signature").unwrap();
        assert!(service.verify_token_hash("header.payload.signature", &hash));
        assert!(!service.verify_token_hash("header.payload.other", &hash));
    }

    #[test]
    fn test_different_salts() {
        let service = service();
        let hash1 = service.hash_password("secret123").unwrap();
        let hash2 = service.hash_password("secret123").unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_needs_rehash() {
        let fast = service();
        let hash = fast.hash_password("secret123").unwrap();
        assert!(!fast.needs_rehash(&hash));

        let strong = PasswordService::new(PasswordConfig::default()).unwrap();
        assert!(strong.needs_rehash(&hash));
        assert!(strong.needs_rehash("garbage"));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let config = PasswordConfig {
            memory_cost: 1,
            ..PasswordConfig::fast()
        };
        assert!(matches!(
            PasswordService::new(config),
            Err(AuthError::Config(_))
        ));
    }
}
