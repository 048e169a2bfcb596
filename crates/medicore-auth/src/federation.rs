//! Federated identity providers
//!
//! Authorization-code grant: the start route redirects the browser to
//! [`IdentityProvider::authorization_url`] with a random `state`; the callback
//! hands the returned code to [`IdentityProvider::exchange_code`] and gets a
//! [`FederatedProfile`] back.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use serde::Deserialize;

use crate::config::GoogleConfig;
use crate::error::{AuthError, AuthResult};
use crate::types::FederatedProfile;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Short provider name, used in device labels ("oauth:<name>")
    fn name(&self) -> &str;

    /// URL to send the browser to
    fn authorization_url(&self, state: &str) -> String;

    /// Exchange an authorization code for the user's profile
    async fn exchange_code(&self, code: &str) -> AuthResult<FederatedProfile>;
}

/// Random URL-safe value for the OAuth `state` parameter
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
}

/// Google OAuth 2.0 / OpenID Connect provider
pub struct GoogleProvider {
    config: GoogleConfig,
    http: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_client(config: GoogleConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&prompt=select_account",
            GOOGLE_AUTH_URL,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_url),
            urlencoding::encode("openid email profile"),
            urlencoding::encode(state),
        )
    }

    async fn exchange_code(&self, code: &str) -> AuthResult<FederatedProfile> {
        let params = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_url.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let token: TokenResponse = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&params)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::Federation(format!("token exchange: {}", e)))?
            .json()
            .await
            .map_err(|e| AuthError::Federation(format!("token response: {}", e)))?;

        let info: GoogleUserInfo = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::Federation(format!("userinfo: {}", e)))?
            .json()
            .await
            .map_err(|e| AuthError::Federation(format!("userinfo response: {}", e)))?;

        Ok(profile_from_userinfo(info))
    }
}

fn profile_from_userinfo(info: GoogleUserInfo) -> FederatedProfile {
    // An unverified address cannot be trusted to link to an existing account
    let email = info.email.filter(|_| info.email_verified);
    FederatedProfile {
        provider: "google".to_string(),
        subject: info.sub,
        email,
        name: info.name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GoogleProvider {
        GoogleProvider::new(GoogleConfig {
            client_id: "client-123.apps.googleusercontent.com".to_string(),
            client_secret: "shh".to_string(),
            redirect_url: "http://localhost:8080/api/auth/google/callback".to_string(),
        })
    }

    #[test]
    fn test_authorization_url() {
        let url = provider().authorization_url("abc_DEF-123");
        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("client_id=client-123.apps.googleusercontent.com"));
        assert!(url.contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fapi%2Fauth%2Fgoogle%2Fcallback"
        ));
        assert!(url.contains("scope=openid%20email%20profile"));
        assert!(url.contains("state=abc_DEF-123"));
        assert!(!url.contains("shh"));
    }

    #[test]
    fn test_generate_state_is_random() {
        let a = generate_state();
        let b = generate_state();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_unverified_email_dropped() {
        let profile = profile_from_userinfo(GoogleUserInfo {
            sub: "1".to_string(),
            email: Some("a@x.com".to_string()),
            email_verified: false,
            name: Some("A".to_string()),
        });
        assert!(profile.email.is_none());

        let profile = profile_from_userinfo(GoogleUserInfo {
            sub: "1".to_string(),
            email: Some("a@x.com".to_string()),
            email_verified: true,
            name: None,
        });
        assert_eq!(profile.email.as_deref(), Some("a@x.com"));
    }
}
