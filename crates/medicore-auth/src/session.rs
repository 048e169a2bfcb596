//! Refresh-session lifecycle
//!
//! A session entry is created for every issued refresh token and stores only
//! the Argon2id hash of the raw token. Presenting a refresh token is valid
//! only if its session id names a live entry of the account and the hash of
//! the presented token matches.
//!
//! ```text
//! issued ──► rotated (replaced by a new entry)
//!        ├─► logged out (removed)
//!        └─► expired (inert, pruned on next append)
//! ```

use std::sync::Arc;

use chrono::Utc;
use medicore_db::{AccountStore, RefreshSession, RotateOutcome};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::jwt::JwtService;
use crate::password::PasswordService;
use crate::types::{ClientContext, IssuedRefreshToken, SessionView};

/// Successful rotation
#[derive(Debug, Clone)]
pub struct RotatedSession {
    pub account_id: Uuid,
    pub previous_session_id: Uuid,
    /// Device label carried over from the replaced entry
    pub device: String,
    pub refresh: IssuedRefreshToken,
}

/// Session service backed by the account store
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn AccountStore>,
    jwt: Arc<JwtService>,
    password: Arc<PasswordService>,
}

impl SessionService {
    pub fn new(
        store: Arc<dyn AccountStore>,
        jwt: Arc<JwtService>,
        password: Arc<PasswordService>,
    ) -> Self {
        Self {
            store,
            jwt,
            password,
        }
    }

    /// Mint a refresh token and append its session entry
    pub async fn issue(
        &self,
        account_id: Uuid,
        ctx: &ClientContext,
    ) -> AuthResult<IssuedRefreshToken> {
        let refresh = self.jwt.sign_refresh_token(account_id)?;
        let session = self.new_entry(&refresh, ctx.device_label(), ctx)?;

        self.store.append_session(account_id, session).await?;

        tracing::debug!(
            account_id = %account_id,
            session_id = %refresh.session_id,
            "Refresh session issued"
        );

        Ok(refresh)
    }

    /// Exchange a presented refresh token for a new one.
    ///
    /// The presented entry is replaced in one store operation; a second
    /// presentation of the same token finds it gone and is rejected.
    pub async fn rotate(&self, raw_token: &str, ctx: &ClientContext) -> AuthResult<RotatedSession> {
        let claims = self
            .jwt
            .verify_refresh_token(raw_token)
            .map_err(|_| AuthError::InvalidRefreshToken)?;
        let account_id = claims.account_id().ok_or(AuthError::InvalidRefreshToken)?;
        let session_id = claims.session_id().ok_or(AuthError::InvalidRefreshToken)?;

        let refresh = self.jwt.sign_refresh_token(account_id)?;
        // Device label is inherited from the replaced entry by the store
        let replacement = self.new_entry(&refresh, ctx.device_label(), ctx)?;

        let password = self.password.clone();
        let presented = raw_token.to_string();
        let now = Utc::now();
        let check = move |entry: &RefreshSession| {
            !entry.is_expired_at(now) && password.verify_token_hash(&presented, &entry.token_hash)
        };

        match self
            .store
            .rotate_session(account_id, session_id, &check, replacement)
            .await?
        {
            RotateOutcome::Rotated { previous } => Ok(RotatedSession {
                account_id,
                previous_session_id: previous.id,
                device: previous.device,
                refresh,
            }),
            RotateOutcome::Rejected => {
                tracing::info!(
                    account_id = %account_id,
                    session_id = %session_id,
                    "Refresh token rejected (unknown, reused or expired session)"
                );
                Err(AuthError::InvalidRefreshToken)
            }
        }
    }

    /// Best-effort removal of the session a refresh token names.
    ///
    /// Returns the removed `(account_id, session_id)`, or `None` when the
    /// token did not decode or its session was already gone.
    pub async fn revoke(&self, raw_token: &str) -> Option<(Uuid, Uuid)> {
        let claims = self.jwt.verify_refresh_token(raw_token).ok()?;
        let account_id = claims.account_id()?;
        let session_id = claims.session_id()?;

        match self.store.remove_session(account_id, session_id).await {
            Ok(true) => Some((account_id, session_id)),
            Ok(false) => None,
            Err(e) => {
                tracing::warn!(error = %e, account_id = %account_id, "Session removal failed");
                None
            }
        }
    }

    /// Session id of a refresh token, if it belongs to `account_id`
    pub fn session_id_of(&self, raw_token: &str, account_id: Uuid) -> Option<Uuid> {
        let claims = self.jwt.verify_refresh_token(raw_token).ok()?;
        if claims.account_id()? != account_id {
            return None;
        }
        claims.session_id()
    }

    /// Live sessions of an account, newest first
    pub async fn list(&self, account_id: Uuid, current: Option<Uuid>) -> AuthResult<Vec<SessionView>> {
        let sessions = self.store.list_sessions(account_id).await?;
        Ok(sessions
            .into_iter()
            .map(|s| SessionView::new(s, current))
            .collect())
    }

    /// Remove one session of an account
    pub async fn revoke_one(&self, account_id: Uuid, session_id: Uuid) -> AuthResult<()> {
        if self.store.remove_session(account_id, session_id).await? {
            Ok(())
        } else {
            Err(AuthError::SessionNotFound)
        }
    }

    /// Remove every session of an account except `keep`
    pub async fn revoke_others(&self, account_id: Uuid, keep: Option<Uuid>) -> AuthResult<u64> {
        Ok(self.store.remove_other_sessions(account_id, keep).await?)
    }

    fn new_entry(
        &self,
        refresh: &IssuedRefreshToken,
        device: String,
        ctx: &ClientContext,
    ) -> AuthResult<RefreshSession> {
        Ok(RefreshSession {
            id: refresh.session_id,
            token_hash: self.password.hash_secret(&refresh.token)?,
            device,
            ip_address: ctx.ip_address.clone(),
            created_at: Utc::now(),
            expires_at: refresh.expires_at,
        })
    }
}
