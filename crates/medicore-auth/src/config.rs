//! Authentication configuration
//!
//! Centralized configuration for all authentication components with
//! secure defaults following OWASP recommendations.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main authentication configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JWT configuration
    pub jwt: JwtConfig,
    /// Password hashing configuration
    pub password: PasswordConfig,
    /// Refresh cookie configuration
    pub cookie: CookieConfig,
    /// Federated sign-in configuration
    pub oauth: OAuthConfig,
}

/// JWT token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Secret for signing access tokens
    pub access_secret: String,
    /// Secret for signing refresh tokens; must differ from `access_secret`
    pub refresh_secret: String,
    /// Access token lifetime
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,
    /// Refresh token (and session entry) lifetime
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,
    /// Token issuer claim
    pub issuer: String,
    /// Token audience claim
    pub audience: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            access_secret: String::new(),  // Must be set
            refresh_secret: String::new(), // Must be set
            access_token_lifetime: Duration::from_secs(15 * 60), // 15 minutes
            refresh_token_lifetime: Duration::from_secs(30 * 24 * 60 * 60), // 30 days
            issuer: "medicore".to_string(),
            audience: "medicore-api".to_string(),
        }
    }
}

/// Password hashing configuration (Argon2id)
///
/// The same parameters hash refresh-token secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// Memory cost in KiB (OWASP recommends 19456 KiB = 19 MiB minimum)
    pub memory_cost: u32,
    /// Time cost (iterations) - OWASP recommends 2 minimum
    pub time_cost: u32,
    /// Parallelism factor
    pub parallelism: u32,
    /// Output hash length in bytes
    pub hash_length: u32,
    /// Pepper (additional secret, optional)
    pub pepper: Option<String>,
    /// Minimum password length
    pub min_password_length: usize,
    /// Maximum password length (to prevent DoS)
    pub max_password_length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 19456, // 19 MiB
            time_cost: 2,
            parallelism: 1,
            hash_length: 32,
            pepper: None,
            min_password_length: 8,
            max_password_length: 128,
        }
    }
}

impl PasswordConfig {
    /// Cheap parameters for tests and development mode
    pub fn fast() -> Self {
        Self {
            memory_cost: 1024,
            time_cost: 1,
            ..Self::default()
        }
    }
}

/// Refresh cookie configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Name of the refresh cookie
    pub refresh_name: String,
    /// Name of the legacy access cookie, cleared on logout
    pub access_name: String,
    /// Cookie path, the API root
    pub path: String,
    /// Optional cookie domain
    pub domain: Option<String>,
    /// API and front end are on different origins (`SameSite=None; Secure`)
    pub cross_site: bool,
    /// Set `Secure` even for same-site deployments
    pub secure: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            refresh_name: "refresh_token".to_string(),
            access_name: "access_token".to_string(),
            path: "/api".to_string(),
            domain: None,
            cross_site: false,
            secure: true,
        }
    }
}

/// Federated sign-in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Front-end base URL the callback redirects to
    pub frontend_url: String,
    /// Name of the short-lived state cookie
    pub state_cookie: String,
    /// Lifetime of the state cookie
    #[serde(with = "humantime_serde")]
    pub state_ttl: Duration,
    /// Google provider; federated sign-in is disabled when absent
    pub google: Option<GoogleConfig>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            state_cookie: "oauth_state".to_string(),
            state_ttl: Duration::from_secs(10 * 60),
            google: None,
        }
    }
}

/// Google OAuth client registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Must match the redirect URI registered with Google
    pub redirect_url: String,
}

impl AuthConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        // JWT validation
        if self.jwt.access_secret.is_empty() {
            errors.push("JWT access secret must be set".to_string());
        } else if self.jwt.access_secret.len() < 32 {
            errors.push("JWT access secret should be at least 256 bits (32 bytes)".to_string());
        }
        if self.jwt.refresh_secret.is_empty() {
            errors.push("JWT refresh secret must be set".to_string());
        } else if self.jwt.refresh_secret.len() < 32 {
            errors.push("JWT refresh secret should be at least 256 bits (32 bytes)".to_string());
        }
        if !self.jwt.access_secret.is_empty() && self.jwt.access_secret == self.jwt.refresh_secret
        {
            errors.push("JWT access and refresh secrets must differ".to_string());
        }
        if self.jwt.access_token_lifetime >= self.jwt.refresh_token_lifetime {
            errors.push("Access token lifetime must be shorter than refresh lifetime".to_string());
        }

        // Password validation
        if self.password.memory_cost < 19456 {
            errors.push(
                "Argon2 memory cost should be at least 19456 KiB (OWASP recommendation)"
                    .to_string(),
            );
        }
        if self.password.time_cost < 2 {
            errors.push("Argon2 time cost should be at least 2 (OWASP recommendation)".to_string());
        }
        if self.password.min_password_length < 8 {
            errors.push("Minimum password length should be at least 8".to_string());
        }

        // Cookie validation
        if !self.cookie.path.starts_with('/') {
            errors.push("Cookie path must start with '/'".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AuthConfig {
        let mut config = AuthConfig::default();
        config.jwt.access_secret = "a".repeat(32);
        config.jwt.refresh_secret = "r".repeat(32);
        config
    }

    #[test]
    fn test_default_config() {
        let config = AuthConfig::default();
        assert_eq!(config.jwt.access_token_lifetime, Duration::from_secs(15 * 60));
        assert_eq!(
            config.jwt.refresh_token_lifetime,
            Duration::from_secs(30 * 24 * 60 * 60)
        );
        assert_eq!(config.password.memory_cost, 19456);
        assert_eq!(config.cookie.refresh_name, "refresh_token");
        assert_eq!(config.cookie.path, "/api");
    }

    #[test]
    fn test_config_validation_missing_secret() {
        let result = AuthConfig::default().validate();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_validation_same_secrets() {
        let mut config = valid_config();
        config.jwt.refresh_secret = config.jwt.access_secret.clone();
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("must differ")));
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_durations_deserialize_humantime() {
        let json = r#"{"jwt":{"access_token_lifetime":"5m","refresh_token_lifetime":"14days"}}"#;
        let config: AuthConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.jwt.access_token_lifetime, Duration::from_secs(300));
        assert_eq!(
            config.jwt.refresh_token_lifetime,
            Duration::from_secs(14 * 24 * 60 * 60)
        );
        assert_eq!(config.jwt.issuer, "medicore");
    }
}
