//! Account store abstraction
//!
//! The store is the single source of truth for accounts and their refresh
//! sessions. Two implementations exist: [`crate::AccountRepo`] on PostgreSQL
//! and [`crate::MemoryStore`] for development mode and tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::{
    Account, AccountCredentials, AccountFilter, AccountPatch, NewAccount, RefreshSession,
    RotateOutcome,
};

/// Predicate evaluated against the stored session inside the rotation's
/// critical section
pub type SessionCheck = dyn Fn(&RefreshSession) -> bool + Send + Sync;

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account. Fails with `DbError::Duplicate` when the email
    /// (case-insensitive) is taken.
    async fn create_account(&self, new: NewAccount) -> DbResult<Account>;

    /// Lookup by id, including soft-deleted accounts
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Account>>;

    async fn find_by_email(&self, email: &str) -> DbResult<Option<Account>>;

    async fn find_credentials_by_email(&self, email: &str)
        -> DbResult<Option<AccountCredentials>>;

    async fn find_credentials_by_id(&self, id: Uuid) -> DbResult<Option<AccountCredentials>>;

    async fn list_accounts(&self, filter: &AccountFilter) -> DbResult<Vec<Account>>;

    /// Apply a partial update. `DbError::NotFound` when the id is unknown.
    async fn update_account(&self, id: Uuid, patch: AccountPatch) -> DbResult<Account>;

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> DbResult<()>;

    /// Mark deleted, deactivate and drop every session
    async fn soft_delete(&self, id: Uuid, actor: Uuid) -> DbResult<Account>;

    async fn restore(&self, id: Uuid) -> DbResult<Account>;

    /// Physically remove the account and its sessions
    async fn hard_delete(&self, id: Uuid) -> DbResult<()>;

    /// Append a session entry; expired entries of the same account are pruned
    async fn append_session(&self, account_id: Uuid, session: RefreshSession) -> DbResult<()>;

    /// Atomically replace session `session_id` with `replacement` if it exists
    /// and satisfies `check`. The replacement inherits the device label of the
    /// entry it replaces. Two concurrent calls for the same `session_id` never
    /// both observe `Rotated`.
    async fn rotate_session(
        &self,
        account_id: Uuid,
        session_id: Uuid,
        check: &SessionCheck,
        replacement: RefreshSession,
    ) -> DbResult<RotateOutcome>;

    /// Returns whether an entry was removed
    async fn remove_session(&self, account_id: Uuid, session_id: Uuid) -> DbResult<bool>;

    /// Remove every session of the account except `keep`. Returns the count.
    async fn remove_other_sessions(&self, account_id: Uuid, keep: Option<Uuid>) -> DbResult<u64>;

    async fn list_sessions(&self, account_id: Uuid) -> DbResult<Vec<RefreshSession>>;

    /// Connectivity check
    async fn ping(&self) -> DbResult<()>;
}
