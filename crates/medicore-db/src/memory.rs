//! In-memory account store
//!
//! Used for development mode (`backend = "memory"`) and for tests. All state
//! sits behind one `RwLock`, so every mutation (including the
//! check-then-replace of a session rotation) runs as a single critical
//! section.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    normalize_email, Account, AccountCredentials, AccountFilter, AccountPatch, NewAccount,
    RefreshSession, RotateOutcome,
};
use crate::store::{AccountStore, SessionCheck};
use crate::{DbError, DbResult};

#[derive(Debug, Clone)]
struct StoredAccount {
    account: Account,
    password_hash: Option<String>,
    sessions: Vec<RefreshSession>,
}

impl StoredAccount {
    fn credentials(&self) -> AccountCredentials {
        AccountCredentials {
            account: self.account.clone(),
            password_hash: self.password_hash.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<Uuid, StoredAccount>,
    by_email: HashMap<String, Uuid>,
}

impl State {
    fn get_mut(&mut self, id: Uuid) -> DbResult<&mut StoredAccount> {
        self.accounts
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("Account {}", id)))
    }

    fn by_email(&self, email: &str) -> Option<&StoredAccount> {
        self.by_email
            .get(&normalize_email(email))
            .and_then(|id| self.accounts.get(id))
    }
}

/// Process-local [`AccountStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts, soft-deleted included
    pub async fn len(&self) -> usize {
        self.state.read().await.accounts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn matches_filter(account: &Account, filter: &AccountFilter) -> bool {
    if !filter.include_deleted && account.is_deleted() {
        return false;
    }
    if filter.role.is_some_and(|r| r != account.role) {
        return false;
    }
    if filter.department.is_some_and(|d| d != account.department) {
        return false;
    }
    if let Some(ref search) = filter.search {
        let needle = search.to_lowercase();
        if !account.name.to_lowercase().contains(&needle) && !account.email.contains(&needle) {
            return false;
        }
    }
    true
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create_account(&self, new: NewAccount) -> DbResult<Account> {
        let email = normalize_email(&new.email);
        let mut state = self.state.write().await;

        if state.by_email.contains_key(&email) {
            return Err(DbError::Duplicate(format!("Email {} already exists", email)));
        }

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            email: email.clone(),
            name: new.name,
            phone: new.phone,
            role: new.role,
            department: new.department,
            is_active: true,
            deleted_at: None,
            deleted_by: None,
            created_at: now,
            updated_at: now,
        };

        state.by_email.insert(email, account.id);
        state.accounts.insert(
            account.id,
            StoredAccount {
                account: account.clone(),
                password_hash: new.password_hash,
                sessions: Vec::new(),
            },
        );

        Ok(account)
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.get(&id).map(|s| s.account.clone()))
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<Account>> {
        let state = self.state.read().await;
        Ok(state.by_email(email).map(|s| s.account.clone()))
    }

    async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> DbResult<Option<AccountCredentials>> {
        let state = self.state.read().await;
        Ok(state.by_email(email).map(StoredAccount::credentials))
    }

    async fn find_credentials_by_id(&self, id: Uuid) -> DbResult<Option<AccountCredentials>> {
        let state = self.state.read().await;
        Ok(state.accounts.get(&id).map(StoredAccount::credentials))
    }

    async fn list_accounts(&self, filter: &AccountFilter) -> DbResult<Vec<Account>> {
        let state = self.state.read().await;
        let mut accounts: Vec<Account> = state
            .accounts
            .values()
            .map(|s| &s.account)
            .filter(|a| matches_filter(a, filter))
            .cloned()
            .collect();

        accounts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(accounts
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }

    async fn update_account(&self, id: Uuid, patch: AccountPatch) -> DbResult<Account> {
        let mut state = self.state.write().await;
        let stored = state.get_mut(id)?;
        patch.apply(&mut stored.account);
        stored.account.updated_at = Utc::now();
        Ok(stored.account.clone())
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> DbResult<()> {
        let mut state = self.state.write().await;
        let stored = state.get_mut(id)?;
        stored.password_hash = Some(password_hash.to_string());
        stored.account.updated_at = Utc::now();
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid, actor: Uuid) -> DbResult<Account> {
        let mut state = self.state.write().await;
        let stored = state.get_mut(id)?;
        let now = Utc::now();
        stored.account.deleted_at = Some(now);
        stored.account.deleted_by = Some(actor);
        stored.account.is_active = false;
        stored.account.updated_at = now;
        stored.sessions.clear();
        Ok(stored.account.clone())
    }

    async fn restore(&self, id: Uuid) -> DbResult<Account> {
        let mut state = self.state.write().await;
        let stored = state.get_mut(id)?;
        stored.account.deleted_at = None;
        stored.account.deleted_by = None;
        stored.account.is_active = true;
        stored.account.updated_at = Utc::now();
        Ok(stored.account.clone())
    }

    async fn hard_delete(&self, id: Uuid) -> DbResult<()> {
        let mut state = self.state.write().await;
        let stored = state
            .accounts
            .remove(&id)
            .ok_or_else(|| DbError::NotFound(format!("Account {}", id)))?;
        state.by_email.remove(&stored.account.email);
        Ok(())
    }

    async fn append_session(&self, account_id: Uuid, session: RefreshSession) -> DbResult<()> {
        let mut state = self.state.write().await;
        let stored = state.get_mut(account_id)?;
        let now = Utc::now();
        stored.sessions.retain(|s| !s.is_expired_at(now));
        stored.sessions.push(session);
        Ok(())
    }

    async fn rotate_session(
        &self,
        account_id: Uuid,
        session_id: Uuid,
        check: &SessionCheck,
        replacement: RefreshSession,
    ) -> DbResult<RotateOutcome> {
        let mut state = self.state.write().await;
        let Some(stored) = state.accounts.get_mut(&account_id) else {
            return Ok(RotateOutcome::Rejected);
        };

        let Some(pos) = stored.sessions.iter().position(|s| s.id == session_id) else {
            return Ok(RotateOutcome::Rejected);
        };

        if !check(&stored.sessions[pos]) {
            return Ok(RotateOutcome::Rejected);
        }

        let mut replacement = replacement;
        replacement.device = stored.sessions[pos].device.clone();
        let previous = std::mem::replace(&mut stored.sessions[pos], replacement);
        Ok(RotateOutcome::Rotated { previous })
    }

    async fn remove_session(&self, account_id: Uuid, session_id: Uuid) -> DbResult<bool> {
        let mut state = self.state.write().await;
        let Some(stored) = state.accounts.get_mut(&account_id) else {
            return Ok(false);
        };
        let before = stored.sessions.len();
        stored.sessions.retain(|s| s.id != session_id);
        Ok(stored.sessions.len() < before)
    }

    async fn remove_other_sessions(&self, account_id: Uuid, keep: Option<Uuid>) -> DbResult<u64> {
        let mut state = self.state.write().await;
        let Some(stored) = state.accounts.get_mut(&account_id) else {
            return Ok(0);
        };
        let before = stored.sessions.len();
        stored.sessions.retain(|s| Some(s.id) == keep);
        Ok((before - stored.sessions.len()) as u64)
    }

    async fn list_sessions(&self, account_id: Uuid) -> DbResult<Vec<RefreshSession>> {
        let state = self.state.read().await;
        let now = Utc::now();
        let mut sessions: Vec<RefreshSession> = state
            .accounts
            .get(&account_id)
            .map(|s| {
                s.sessions
                    .iter()
                    .filter(|s| !s.is_expired_at(now))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn ping(&self) -> DbResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use medicore_types::{Department, Role};
    use std::sync::Arc;

    fn new_account(email: &str, role: Role) -> NewAccount {
        NewAccount {
            email: email.to_string(),
            name: "Test User".to_string(),
            phone: None,
            password_hash: Some("hash".to_string()),
            role,
            department: Department::None,
        }
    }

    fn session(hash: &str, ttl: Duration) -> RefreshSession {
        let now = Utc::now();
        RefreshSession {
            id: Uuid::new_v4(),
            token_hash: hash.to_string(),
            device: "test".to_string(),
            ip_address: None,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_case_insensitive() {
        let store = MemoryStore::new();
        store
            .create_account(new_account("Alice@Example.com", Role::Patient))
            .await
            .unwrap();

        let err = store
            .create_account(new_account("alice@example.COM", Role::Doctor))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Duplicate(_)));

        let found = store.find_by_email("ALICE@example.com").await.unwrap();
        assert_eq!(found.unwrap().email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_append_prunes_expired() {
        let store = MemoryStore::new();
        let account = store
            .create_account(new_account("a@x.com", Role::Patient))
            .await
            .unwrap();

        store
            .append_session(account.id, session("old", Duration::seconds(-1)))
            .await
            .unwrap();
        store
            .append_session(account.id, session("new", Duration::days(30)))
            .await
            .unwrap();

        let sessions = store.list_sessions(account.id).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].token_hash, "new");
    }

    #[tokio::test]
    async fn test_rotate_replaces_entry() {
        let store = MemoryStore::new();
        let account = store
            .create_account(new_account("a@x.com", Role::Patient))
            .await
            .unwrap();
        let first = session("one", Duration::days(30));
        let first_id = first.id;
        store.append_session(account.id, first).await.unwrap();

        let replacement = session("two", Duration::days(30));
        let replacement_id = replacement.id;
        let outcome = store
            .rotate_session(account.id, first_id, &|s| s.token_hash == "one", replacement)
            .await
            .unwrap();
        assert!(matches!(outcome, RotateOutcome::Rotated { .. }));

        let sessions = store.list_sessions(account.id).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, replacement_id);

        // The old entry is gone, a second attempt is rejected
        let again = store
            .rotate_session(
                account.id,
                first_id,
                &|_| true,
                session("three", Duration::days(30)),
            )
            .await
            .unwrap();
        assert_eq!(again, RotateOutcome::Rejected);
    }

    #[tokio::test]
    async fn test_rotate_rejected_when_check_fails() {
        let store = MemoryStore::new();
        let account = store
            .create_account(new_account("a@x.com", Role::Patient))
            .await
            .unwrap();
        let first = session("one", Duration::days(30));
        let first_id = first.id;
        store.append_session(account.id, first).await.unwrap();

        let outcome = store
            .rotate_session(
                account.id,
                first_id,
                &|_| false,
                session("two", Duration::days(30)),
            )
            .await
            .unwrap();
        assert_eq!(outcome, RotateOutcome::Rejected);
        assert_eq!(store.list_sessions(account.id).await.unwrap()[0].id, first_id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_rotation_single_winner() {
        let store = Arc::new(MemoryStore::new());
        let account = store
            .create_account(new_account("a@x.com", Role::Patient))
            .await
            .unwrap();
        let first = session("one", Duration::days(30));
        let first_id = first.id;
        store.append_session(account.id, first).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .rotate_session(
                        account.id,
                        first_id,
                        &|_| true,
                        session(&format!("r{}", i), Duration::days(30)),
                    )
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), RotateOutcome::Rotated { .. }) {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(store.list_sessions(account.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_soft_delete_clears_sessions_and_restore() {
        let store = MemoryStore::new();
        let admin = Uuid::new_v4();
        let account = store
            .create_account(new_account("a@x.com", Role::Nurse))
            .await
            .unwrap();
        store
            .append_session(account.id, session("one", Duration::days(30)))
            .await
            .unwrap();

        let deleted = store.soft_delete(account.id, admin).await.unwrap();
        assert!(deleted.is_deleted());
        assert!(!deleted.is_active);
        assert_eq!(deleted.deleted_by, Some(admin));
        assert!(store.list_sessions(account.id).await.unwrap().is_empty());

        let listed = store.list_accounts(&AccountFilter::default()).await.unwrap();
        assert!(listed.is_empty());

        let restored = store.restore(account.id).await.unwrap();
        assert!(!restored.is_deleted());
        assert!(restored.is_active);
    }

    #[tokio::test]
    async fn test_hard_delete_frees_email() {
        let store = MemoryStore::new();
        let account = store
            .create_account(new_account("a@x.com", Role::Patient))
            .await
            .unwrap();
        store.hard_delete(account.id).await.unwrap();

        assert!(store.find_by_id(account.id).await.unwrap().is_none());
        assert!(store
            .create_account(new_account("a@x.com", Role::Patient))
            .await
            .is_ok());
        assert!(matches!(
            store.hard_delete(account.id).await,
            Err(DbError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let store = MemoryStore::new();
        store
            .create_account(new_account("doc@x.com", Role::Doctor))
            .await
            .unwrap();
        store
            .create_account(new_account("nurse@x.com", Role::Nurse))
            .await
            .unwrap();

        let doctors = store
            .list_accounts(&AccountFilter {
                role: Some(Role::Doctor),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(doctors.len(), 1);
        assert_eq!(doctors[0].email, "doc@x.com");

        let searched = store
            .list_accounts(&AccountFilter {
                search: Some("NURSE".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(searched.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_other_sessions_keeps_one() {
        let store = MemoryStore::new();
        let account = store
            .create_account(new_account("a@x.com", Role::Patient))
            .await
            .unwrap();
        let keep = session("keep", Duration::days(30));
        let keep_id = keep.id;
        store.append_session(account.id, keep).await.unwrap();
        store
            .append_session(account.id, session("b", Duration::days(30)))
            .await
            .unwrap();
        store
            .append_session(account.id, session("c", Duration::days(30)))
            .await
            .unwrap();

        let removed = store
            .remove_other_sessions(account.id, Some(keep_id))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        let left = store.list_sessions(account.id).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, keep_id);
    }
}
