//! JWT Token Service
//!
//! - Access tokens (short-lived, stateless) carry subject and role
//! - Refresh tokens (long-lived) carry subject and a session id that must
//!   match an entry in the account's session list
//!
//! The two token kinds are signed with distinct secrets, so a leaked access
//! secret cannot be used to forge refresh tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use medicore_types::Role;
use serde::Serialize;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};
use crate::types::{AccessClaims, IssuedRefreshToken, RefreshClaims, TokenType};

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// JWT service for token management
pub struct JwtService {
    config: JwtConfig,
    access: KeyPair,
    refresh: KeyPair,
}

impl JwtService {
    /// Create a new JWT service.
    ///
    /// Fails when either secret is unset or both secrets are equal; this is a
    /// startup-time configuration error.
    pub fn new(config: JwtConfig) -> AuthResult<Self> {
        if config.access_secret.is_empty() {
            return Err(AuthError::Config("JWT access secret is not set".to_string()));
        }
        if config.refresh_secret.is_empty() {
            return Err(AuthError::Config("JWT refresh secret is not set".to_string()));
        }
        if config.access_secret == config.refresh_secret {
            return Err(AuthError::Config(
                "JWT access and refresh secrets must differ".to_string(),
            ));
        }

        let access = KeyPair::from_secret(&config.access_secret);
        let refresh = KeyPair::from_secret(&config.refresh_secret);

        Ok(Self {
            config,
            access,
            refresh,
        })
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Sign a short-lived access token
    pub fn sign_access_token(&self, account_id: Uuid, role: Role) -> AuthResult<String> {
        let now = Utc::now();
        let exp = now + lifetime(self.config.access_token_lifetime)?;

        let claims = AccessClaims {
            sub: account_id.to_string(),
            role,
            typ: TokenType::Access,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        encode_with(&self.access.encoding, &claims)
    }

    /// Sign a refresh token embedding a freshly generated session id
    pub fn sign_refresh_token(&self, account_id: Uuid) -> AuthResult<IssuedRefreshToken> {
        let now = Utc::now();
        let expires_at = now + lifetime(self.config.refresh_token_lifetime)?;
        let session_id = Uuid::new_v4();

        let claims = RefreshClaims {
            sub: account_id.to_string(),
            sid: session_id.to_string(),
            typ: TokenType::Refresh,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode_with(&self.refresh.encoding, &claims)?;

        Ok(IssuedRefreshToken {
            token,
            session_id,
            expires_at: truncate_to_seconds(expires_at),
        })
    }

    /// Verify signature, expiry and type of an access token
    pub fn verify_access_token(&self, token: &str) -> AuthResult<AccessClaims> {
        let claims =
            decode::<AccessClaims>(token, &self.access.decoding, &self.validation())?.claims;

        if claims.typ != TokenType::Access {
            return Err(AuthError::InvalidTokenType);
        }

        Ok(claims)
    }

    /// Verify signature, expiry and type of a refresh token
    pub fn verify_refresh_token(&self, token: &str) -> AuthResult<RefreshClaims> {
        let claims =
            decode::<RefreshClaims>(token, &self.refresh.decoding, &self.validation())?.claims;

        if claims.typ != TokenType::Refresh {
            return Err(AuthError::InvalidTokenType);
        }

        Ok(claims)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation
    }
}

fn encode_with<T: Serialize>(key: &EncodingKey, claims: &T) -> AuthResult<String> {
    encode(&Header::default(), claims, key)
        .map_err(|e| AuthError::Internal(format!("Failed to encode token: {}", e)))
}

fn lifetime(duration: std::time::Duration) -> AuthResult<Duration> {
    Duration::from_std(duration).map_err(|e| AuthError::Internal(e.to_string()))
}

fn truncate_to_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(at.timestamp(), 0).unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            access_secret: "test-access-secret-for-jwt-tokens-32-bytes!".to_string(),
            refresh_secret: "test-refresh-secret-for-jwt-tokens-32-bytes".to_string(),
            access_token_lifetime: std::time::Duration::from_secs(900),
            refresh_token_lifetime: std::time::Duration::from_secs(30 * 86400),
            issuer: "test-issuer".to_string(),
            audience: "test-audience".to_string(),
        }
    }

    #[test]
    fn test_missing_or_shared_secret_rejected() {
        let mut config = test_config();
        config.access_secret.clear();
        assert!(matches!(JwtService::new(config), Err(AuthError::Config(_))));

        let mut config = test_config();
        config.refresh_secret = config.access_secret.clone();
        assert!(matches!(JwtService::new(config), Err(AuthError::Config(_))));
    }

    #[test]
    fn test_access_token_round() {
        let service = JwtService::new(test_config()).unwrap();
        let account_id = Uuid::new_v4();

        let token = service.sign_access_token(account_id, Role::Doctor).unwrap();
        let claims = service.verify_access_token(&token).unwrap();
        assert_eq!(claims.sub, account_id.to_string());
        assert_eq!(claims.role, Role::Doctor);
        assert_eq!(claims.typ, TokenType::Access);
    }

    #[test]
    fn test_refresh_token_embeds_session_id() {
        let service = JwtService::new(test_config()).unwrap();
        let account_id = Uuid::new_v4();

        let issued = service.sign_refresh_token(account_id).unwrap();
        let claims = service.verify_refresh_token(&issued.token).unwrap();
        assert_eq!(claims.account_id(), Some(account_id));
        assert_eq!(claims.session_id(), Some(issued.session_id));

        let other = service.sign_refresh_token(account_id).unwrap();
        assert_ne!(other.session_id, issued.session_id);
    }

    #[test]
    fn test_tokens_not_interchangeable() {
        let service = JwtService::new(test_config()).unwrap();
        let account_id = Uuid::new_v4();

        let access = service.sign_access_token(account_id, Role::Patient).unwrap();
        let refresh = service.sign_refresh_token(account_id).unwrap();

        // Different secrets: signature check fails before the type check
        assert!(matches!(
            service.verify_refresh_token(&access),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            service.verify_access_token(&refresh.token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_access_secret_cannot_forge_refresh() {
        let service = JwtService::new(test_config()).unwrap();
        let now = Utc::now().timestamp();
        let forged = RefreshClaims {
            sub: Uuid::new_v4().to_string(),
            sid: Uuid::new_v4().to_string(),
            typ: TokenType::Refresh,
            iat: now,
            exp: now + 3600,
            nbf: now,
            iss: "test-issuer".to_string(),
            aud: "test-audience".to_string(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode_with(&service.access.encoding, &forged).unwrap();
        assert!(service.verify_refresh_token(&token).is_err());
    }

    #[test]
    fn test_expired_access_token() {
        let service = JwtService::new(test_config()).unwrap();
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: Uuid::new_v4().to_string(),
            role: Role::Nurse,
            typ: TokenType::Access,
            iat: now - 3600,
            exp: now - 600,
            nbf: now - 3600,
            iss: "test-issuer".to_string(),
            aud: "test-audience".to_string(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode_with(&service.access.encoding, &claims).unwrap();
        assert!(matches!(
            service.verify_access_token(&token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn test_wrong_audience_rejected() {
        let service = JwtService::new(test_config()).unwrap();
        let mut other_config = test_config();
        other_config.audience = "someone-else".to_string();
        let other = JwtService::new(other_config).unwrap();

        let token = other.sign_access_token(Uuid::new_v4(), Role::Admin).unwrap();
        assert!(service.verify_access_token(&token).is_err());
    }

    #[test]
    fn test_invalid_token() {
        let service = JwtService::new(test_config()).unwrap();
        assert!(matches!(
            service.verify_access_token("invalid-token"),
            Err(AuthError::InvalidToken)
        ));
    }
}
