//! Auth Gateway
//!
//! Register, login, refresh, logout, federated sign-in and password change.
//! Every token-minting operation returns an [`AuthOutcome`]: the access token
//! goes in the response body, the refresh token only in the http-only cookie.

use medicore_db::{Account, AccountPatch, NewAccount};
use medicore_types::{Department, Role};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::events::AccountEvent;
use crate::types::{AccountView, AuthOutcome, ClientContext, FederatedProfile, RegisterInput};
use crate::AuthService;

fn record_login(outcome: &'static str) {
    metrics::counter!("auth_login_total", "outcome" => outcome).increment(1);
}

fn record_refresh(outcome: &'static str) {
    metrics::counter!("auth_refresh_total", "outcome" => outcome).increment(1);
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

impl AuthService {
    /// Create an account and sign it in.
    ///
    /// Role defaults to `Patient` and department to `None`. Administrative
    /// roles cannot be self-assigned; those accounts are provisioned by an
    /// administrator.
    pub async fn register(&self, input: RegisterInput, ctx: &ClientContext) -> AuthResult<AuthOutcome> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(AuthError::BadRequest("name is required".to_string()));
        }
        if !looks_like_email(input.email.trim()) {
            return Err(AuthError::BadRequest("a valid email is required".to_string()));
        }

        let role = input.role.unwrap_or_default();
        if role.is_administrator() {
            return Err(AuthError::InsufficientPermissions);
        }

        let password_hash = self.password.hash_password(&input.password)?;

        let account = self
            .store()
            .create_account(NewAccount {
                email: input.email,
                name: name.to_string(),
                phone: input.phone,
                password_hash: Some(password_hash),
                role,
                department: input.department.unwrap_or_default(),
            })
            .await?;

        metrics::counter!("auth_register_total").increment(1);
        tracing::info!(account_id = %account.id, role = %account.role, "Account registered");
        self.publish(AccountEvent::Registered {
            account_id: account.id,
            role: account.role,
        });

        self.sign_in(account, ctx).await
    }

    /// Password login.
    ///
    /// Unknown email, wrong password, federated-only account and soft-deleted
    /// account are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str, ctx: &ClientContext) -> AuthResult<AuthOutcome> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::BadRequest("email and password are required".to_string()));
        }

        let Some(credentials) = self.store().find_credentials_by_email(email).await? else {
            record_login("unknown_account");
            return Err(AuthError::InvalidCredentials);
        };

        if !self
            .password
            .verify_password(password, credentials.password_hash.as_deref())
        {
            record_login("bad_password");
            tracing::info!(account_id = %credentials.account.id, "Login failed: bad password");
            return Err(AuthError::InvalidCredentials);
        }

        let account = credentials.account;
        if account.is_deleted() {
            record_login("deleted");
            return Err(AuthError::InvalidCredentials);
        }
        if !account.is_active {
            record_login("disabled");
            return Err(AuthError::AccountDisabled);
        }

        if let Some(hash) = credentials.password_hash.as_deref() {
            if self.password.needs_rehash(hash) {
                self.rehash_password(account.id, password).await;
            }
        }

        record_login("success");
        self.sign_in(account, ctx).await
    }

    /// Re-store a verified password under the current Argon2 parameters
    async fn rehash_password(&self, account_id: Uuid, password: &str) {
        let result = match self.password.hash_secret(password) {
            Ok(hash) => self.store().set_password_hash(account_id, &hash).await.map_err(AuthError::from),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => tracing::info!(account_id = %account_id, "Password hash upgraded"),
            Err(e) => tracing::warn!(account_id = %account_id, error = %e, "Password rehash failed"),
        }
    }

    /// Rotate a refresh token and mint a new access token
    pub async fn refresh(&self, raw_token: Option<&str>, ctx: &ClientContext) -> AuthResult<AuthOutcome> {
        let Some(raw_token) = raw_token.filter(|t| !t.is_empty()) else {
            record_refresh("missing");
            return Err(AuthError::InvalidRefreshToken);
        };

        let rotated = match self.sessions.rotate(raw_token, ctx).await {
            Ok(rotated) => rotated,
            Err(e) => {
                record_refresh("rejected");
                return Err(e);
            }
        };

        let account = match self.store().find_by_id(rotated.account_id).await? {
            Some(account) if !account.is_deleted() && account.is_active => account,
            _ => {
                // The entry was just rotated in; take it back out
                if let Err(e) = self
                    .sessions
                    .revoke_one(rotated.account_id, rotated.refresh.session_id)
                    .await
                {
                    tracing::warn!(
                        account_id = %rotated.account_id,
                        error = %e,
                        "Failed to drop session of inactive account"
                    );
                }
                record_refresh("inactive");
                return Err(AuthError::InvalidRefreshToken);
            }
        };

        let access_token = self.jwt.sign_access_token(account.id, account.role)?;

        record_refresh("success");
        tracing::debug!(
            account_id = %account.id,
            session_id = %rotated.refresh.session_id,
            "Refresh token rotated"
        );
        self.publish(AccountEvent::SessionRotated {
            account_id: account.id,
            previous_session_id: rotated.previous_session_id,
            session_id: rotated.refresh.session_id,
        });

        Ok(AuthOutcome {
            access_token,
            refresh: rotated.refresh,
            account: AccountView::from(account),
        })
    }

    /// End the session a refresh token names. Never fails.
    pub async fn logout(&self, raw_token: Option<&str>) {
        let Some(raw_token) = raw_token.filter(|t| !t.is_empty()) else {
            return;
        };

        if let Some((account_id, session_id)) = self.sessions.revoke(raw_token).await {
            tracing::info!(account_id = %account_id, session_id = %session_id, "Logged out");
            self.publish(AccountEvent::LoggedOut {
                account_id,
                session_id,
            });
        }
    }

    /// Resolve or create the account behind a federated identity and sign it in.
    ///
    /// Existing accounts are reactivated and get a missing name backfilled; a
    /// stored password hash is never touched.
    pub async fn federated_login(&self, profile: FederatedProfile, ctx: &ClientContext) -> AuthResult<AuthOutcome> {
        let email = profile
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AuthError::Federation("provider returned no email".to_string()))?;

        let (account, created) = match self.store().find_by_email(email).await? {
            Some(account) if account.is_deleted() => return Err(AuthError::AccountDeleted),
            Some(account) => {
                let mut patch = AccountPatch::default();
                if !account.is_active {
                    patch.is_active = Some(true);
                }
                if account.name.trim().is_empty() {
                    patch.name = profile.name.clone().filter(|n| !n.trim().is_empty());
                }
                let account = if patch.is_empty() {
                    account
                } else {
                    self.store().update_account(account.id, patch).await?
                };
                (account, false)
            }
            None => {
                let name = profile
                    .name
                    .clone()
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| email.split('@').next().unwrap_or(email).to_string());
                let account = self
                    .store()
                    .create_account(NewAccount {
                        email: email.to_string(),
                        name,
                        phone: None,
                        password_hash: None,
                        role: Role::Patient,
                        department: Department::None,
                    })
                    .await?;
                metrics::counter!("auth_register_total").increment(1);
                (account, true)
            }
        };

        tracing::info!(
            account_id = %account.id,
            provider = %profile.provider,
            created,
            "Federated sign-in"
        );
        self.publish(AccountEvent::FederatedLogin {
            account_id: account.id,
            provider: profile.provider.clone(),
            created,
        });

        let ctx = ClientContext {
            device: Some(format!("oauth:{}", profile.provider)),
            user_agent: ctx.user_agent.clone(),
            ip_address: ctx.ip_address.clone(),
        };
        self.sign_in(account, &ctx).await
    }

    /// Change the password of `account_id`.
    ///
    /// The current password is required when one is set. Every session
    /// except `keep_session` is revoked on success.
    pub async fn change_password(
        &self,
        account_id: Uuid,
        current: Option<&str>,
        new_password: &str,
        keep_session: Option<Uuid>,
    ) -> AuthResult<u64> {
        let credentials = self
            .store()
            .find_credentials_by_id(account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        if credentials.password_hash.is_some() {
            let current = current.ok_or_else(|| {
                AuthError::BadRequest("current password is required".to_string())
            })?;
            if !self
                .password
                .verify_password(current, credentials.password_hash.as_deref())
            {
                return Err(AuthError::InvalidCredentials);
            }
        }

        let hash = self.password.hash_password(new_password)?;
        self.store().set_password_hash(account_id, &hash).await?;
        let revoked = self.sessions.revoke_others(account_id, keep_session).await?;

        tracing::info!(account_id = %account_id, revoked, "Password changed");
        self.publish(AccountEvent::PasswordChanged { account_id });

        Ok(revoked)
    }

    /// Mint an access token and a new session for an account
    async fn sign_in(&self, account: Account, ctx: &ClientContext) -> AuthResult<AuthOutcome> {
        let access_token = self.jwt.sign_access_token(account.id, account.role)?;
        let refresh = self.sessions.issue(account.id, ctx).await?;

        self.publish(AccountEvent::LoggedIn {
            account_id: account.id,
            session_id: refresh.session_id,
            device: ctx.device_label(),
        });

        Ok(AuthOutcome {
            access_token,
            refresh,
            account: AccountView::from(account),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use std::sync::Arc;

    fn input(email: &str) -> RegisterInput {
        RegisterInput {
            name: "A".to_string(),
            email: email.to_string(),
            password: "secret123".to_string(),
            phone: None,
            role: None,
            department: None,
        }
    }

    fn ctx() -> ClientContext {
        ClientContext {
            device: None,
            user_agent: Some("Mozilla/5.0 (X11; Linux x86_64) Firefox/121.0".to_string()),
            ip_address: Some("10.0.0.7".to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_defaults() {
        let (service, _) = testing::service();
        let outcome = service.register(input("a@x.com"), &ctx()).await.unwrap();

        assert_eq!(outcome.account.role, Role::Patient);
        assert_eq!(outcome.account.department, Department::None);
        assert!(!outcome.access_token.is_empty());

        let sessions = service.store().list_sessions(outcome.account.id).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, outcome.refresh.session_id);
        assert_eq!(sessions[0].device, "Firefox on Linux");
        assert_ne!(sessions[0].token_hash, outcome.refresh.token);
    }

    #[tokio::test]
    async fn test_register_duplicate_email_conflict() {
        let (service, _) = testing::service();
        service.register(input("a@x.com"), &ctx()).await.unwrap();
        let err = service.register(input("A@X.COM"), &ctx()).await.unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn test_register_rejects_admin_self_assignment() {
        let (service, _) = testing::service();
        let mut request = input("a@x.com");
        request.role = Some(Role::SuperAdmin);
        assert!(matches!(
            service.register(request, &ctx()).await,
            Err(AuthError::InsufficientPermissions)
        ));
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let (service, _) = testing::service();
        let mut request = input("not-an-email");
        assert!(matches!(
            service.register(request.clone(), &ctx()).await,
            Err(AuthError::BadRequest(_))
        ));
        request.email = "a@x.com".to_string();
        request.password = "short".to_string();
        assert!(matches!(
            service.register(request, &ctx()).await,
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[tokio::test]
    async fn test_login_round_preserves_role() {
        let (service, _) = testing::service();
        let mut request = input("doc@x.com");
        request.role = Some(Role::Doctor);
        request.department = Some(Department::Cardiology);
        service.register(request, &ctx()).await.unwrap();

        let outcome = service.login("DOC@x.com", "secret123", &ctx()).await.unwrap();
        assert_eq!(outcome.account.role, Role::Doctor);
        assert_eq!(outcome.account.department, Department::Cardiology);

        let claims = service.jwt.verify_access_token(&outcome.access_token).unwrap();
        assert_eq!(claims.role, Role::Doctor);
    }

    #[tokio::test]
    async fn test_login_upgrades_stale_password_hash() {
        let store: Arc<dyn medicore_db::AccountStore> = Arc::new(medicore_db::MemoryStore::new());
        let old = AuthService::new(
            store.clone(),
            Arc::new(crate::NoopPublisher),
            testing::test_config(),
        )
        .unwrap();
        old.register(input("a@x.com"), &ctx()).await.unwrap();

        let mut config = testing::test_config();
        config.password.memory_cost = 2048;
        let current = AuthService::new(store.clone(), Arc::new(crate::NoopPublisher), config).unwrap();

        let before = store.find_credentials_by_email("a@x.com").await.unwrap().unwrap();
        let before = before.password_hash.unwrap();
        assert!(current.password.needs_rehash(&before));

        current.login("a@x.com", "secret123", &ctx()).await.unwrap();

        let after = store.find_credentials_by_email("a@x.com").await.unwrap().unwrap();
        let after = after.password_hash.unwrap();
        assert_ne!(before, after);
        assert!(!current.password.needs_rehash(&after));

        // Still verifies, and an up-to-date hash is left alone
        current.login("a@x.com", "secret123", &ctx()).await.unwrap();
        let again = store.find_credentials_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(again.password_hash.unwrap(), after);
    }

    #[tokio::test]
    async fn test_login_failures_are_unauthorized() {
        let (service, _) = testing::service();
        service.register(input("a@x.com"), &ctx()).await.unwrap();

        for _ in 0..3 {
            let err = service.login("a@x.com", "wrong-password", &ctx()).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }
        // No lockout: the right password still works
        assert!(service.login("a@x.com", "secret123", &ctx()).await.is_ok());

        let err = service.login("nobody@x.com", "secret123", &ctx()).await.unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[tokio::test]
    async fn test_login_federated_only_account_is_unauthorized() {
        let (service, _) = testing::service();
        service
            .federated_login(
                FederatedProfile {
                    provider: "google".to_string(),
                    subject: "123".to_string(),
                    email: Some("fed@x.com".to_string()),
                    name: Some("Fed".to_string()),
                },
                &ctx(),
            )
            .await
            .unwrap();

        let err = service.login("fed@x.com", "", &ctx()).await.unwrap_err();
        assert!(matches!(err, AuthError::BadRequest(_)));
        let err = service.login("fed@x.com", "anything", &ctx()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_login_soft_deleted_is_unauthorized() {
        let (service, _) = testing::service();
        let outcome = service.register(input("a@x.com"), &ctx()).await.unwrap();
        service
            .store()
            .soft_delete(outcome.account.id, outcome.account.id)
            .await
            .unwrap();

        let err = service.login("a@x.com", "secret123", &ctx()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_refresh_is_single_use() {
        let (service, _) = testing::service();
        let outcome = service.register(input("a@x.com"), &ctx()).await.unwrap();
        let first = outcome.refresh.token;

        let rotated = service.refresh(Some(&first), &ctx()).await.unwrap();
        assert_ne!(rotated.refresh.token, first);
        assert_ne!(rotated.refresh.session_id, outcome.refresh.session_id);

        let err = service.refresh(Some(&first), &ctx()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRefreshToken));

        // The replacement still works once
        assert!(service.refresh(Some(&rotated.refresh.token), &ctx()).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_carries_device_forward() {
        let (service, _) = testing::service();
        let login_ctx = ClientContext {
            device: Some("Ward 3 tablet".to_string()),
            ..ctx()
        };
        let outcome = service.register(input("a@x.com"), &login_ctx).await.unwrap();

        let rotated = service
            .refresh(Some(&outcome.refresh.token), &ClientContext::default())
            .await
            .unwrap();
        let sessions = service.store().list_sessions(outcome.account.id).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, rotated.refresh.session_id);
        assert_eq!(sessions[0].device, "Ward 3 tablet");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refresh_single_winner() {
        let (service, _) = testing::service();
        let outcome = service.register(input("a@x.com"), &ctx()).await.unwrap();
        let service = Arc::new(service);

        let mut handles = Vec::new();
        for _ in 0..6 {
            let service = service.clone();
            let token = outcome.refresh.token.clone();
            handles.push(tokio::spawn(async move {
                service.refresh(Some(&token), &ClientContext::default()).await
            }));
        }

        let mut ok = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(e) => assert!(matches!(e, AuthError::InvalidRefreshToken)),
            }
        }
        assert_eq!(ok, 1);
    }

    #[tokio::test]
    async fn test_refresh_rejects_missing_and_garbage() {
        let (service, _) = testing::service();
        assert!(matches!(
            service.refresh(None, &ctx()).await,
            Err(AuthError::InvalidRefreshToken)
        ));
        assert!(matches!(
            service.refresh(Some("garbage"), &ctx()).await,
            Err(AuthError::InvalidRefreshToken)
        ));

        // An access token is not a refresh token
        let outcome = service.register(input("a@x.com"), &ctx()).await.unwrap();
        assert!(matches!(
            service.refresh(Some(&outcome.access_token), &ctx()).await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_logout_then_refresh_is_unauthorized() {
        let (service, _) = testing::service();
        let outcome = service.register(input("a@x.com"), &ctx()).await.unwrap();
        let other = service.login("a@x.com", "secret123", &ctx()).await.unwrap();

        service.logout(Some(&outcome.refresh.token)).await;

        assert!(matches!(
            service.refresh(Some(&outcome.refresh.token), &ctx()).await,
            Err(AuthError::InvalidRefreshToken)
        ));
        // Only the matching session was removed
        assert!(service.refresh(Some(&other.refresh.token), &ctx()).await.is_ok());
    }

    #[tokio::test]
    async fn test_logout_never_fails() {
        let (service, _) = testing::service();
        service.logout(None).await;
        service.logout(Some("")).await;
        service.logout(Some("not-a-token")).await;

        let outcome = service.register(input("a@x.com"), &ctx()).await.unwrap();
        service.logout(Some(&outcome.refresh.token)).await;
        service.logout(Some(&outcome.refresh.token)).await;
    }

    #[tokio::test]
    async fn test_soft_delete_invalidates_refresh() {
        let (service, _) = testing::service();
        let outcome = service.register(input("a@x.com"), &ctx()).await.unwrap();
        service
            .store()
            .soft_delete(outcome.account.id, outcome.account.id)
            .await
            .unwrap();

        assert!(matches!(
            service.refresh(Some(&outcome.refresh.token), &ctx()).await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_refresh_for_deactivated_account_rejected() {
        let (service, _) = testing::service();
        let outcome = service.register(input("a@x.com"), &ctx()).await.unwrap();
        service
            .store()
            .update_account(
                outcome.account.id,
                AccountPatch {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(service.refresh(Some(&outcome.refresh.token), &ctx()).await.is_err());
        assert!(service
            .store()
            .list_sessions(outcome.account.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_federated_login_creates_then_reuses() {
        let (service, events) = testing::service();
        let mut rx = events.subscribe();
        let profile = FederatedProfile {
            provider: "google".to_string(),
            subject: "g-1".to_string(),
            email: Some("Fed@X.com".to_string()),
            name: Some("Fed User".to_string()),
        };

        let first = service.federated_login(profile.clone(), &ctx()).await.unwrap();
        assert_eq!(first.account.email, "fed@x.com");
        assert_eq!(first.account.role, Role::Patient);

        let creds = service
            .store()
            .find_credentials_by_id(first.account.id)
            .await
            .unwrap()
            .unwrap();
        assert!(creds.password_hash.is_none());

        let second = service.federated_login(profile, &ctx()).await.unwrap();
        assert_eq!(second.account.id, first.account.id);

        let sessions = service.store().list_sessions(first.account.id).await.unwrap();
        assert!(sessions.iter().all(|s| s.device == "oauth:google"));

        let mut created_flags = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            if let AccountEvent::FederatedLogin { created, .. } = envelope.event {
                created_flags.push(created);
            }
        }
        assert_eq!(created_flags, vec![true, false]);
    }

    #[tokio::test]
    async fn test_federated_login_reactivates_and_keeps_password() {
        let (service, _) = testing::service();
        let outcome = service.register(input("a@x.com"), &ctx()).await.unwrap();
        service
            .store()
            .update_account(
                outcome.account.id,
                AccountPatch {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let fed = service
            .federated_login(
                FederatedProfile {
                    provider: "google".to_string(),
                    subject: "g-2".to_string(),
                    email: Some("a@x.com".to_string()),
                    name: Some("Other Name".to_string()),
                },
                &ctx(),
            )
            .await
            .unwrap();
        assert!(fed.account.is_active);
        // Existing name is never overwritten
        assert_eq!(fed.account.name, "A");
        assert!(service.login("a@x.com", "secret123", &ctx()).await.is_ok());
    }

    #[tokio::test]
    async fn test_federated_login_requires_email() {
        let (service, _) = testing::service();
        let err = service
            .federated_login(
                FederatedProfile {
                    provider: "google".to_string(),
                    subject: "g-3".to_string(),
                    email: None,
                    name: None,
                },
                &ctx(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Federation(_)));
    }

    #[tokio::test]
    async fn test_change_password_revokes_other_sessions() {
        let (service, _) = testing::service();
        let first = service.register(input("a@x.com"), &ctx()).await.unwrap();
        let second = service.login("a@x.com", "secret123", &ctx()).await.unwrap();
        let account_id = first.account.id;

        let err = service
            .change_password(account_id, Some("wrong-one"), "new-secret-1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let revoked = service
            .change_password(
                account_id,
                Some("secret123"),
                "new-secret-1",
                Some(second.refresh.session_id),
            )
            .await
            .unwrap();
        assert_eq!(revoked, 1);

        assert!(service.login("a@x.com", "secret123", &ctx()).await.is_err());
        assert!(service.login("a@x.com", "new-secret-1", &ctx()).await.is_ok());
        assert!(service.refresh(Some(&first.refresh.token), &ctx()).await.is_err());
        assert!(service.refresh(Some(&second.refresh.token), &ctx()).await.is_ok());
    }
}
