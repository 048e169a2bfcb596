//! Account repository (PostgreSQL)

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::{
    normalize_email, Account, AccountCredentials, AccountFilter, AccountPatch, DbAccount,
    DbSession, NewAccount, RefreshSession, RotateOutcome,
};
use crate::store::{AccountStore, SessionCheck};
use crate::{DbError, DbResult};

const ACCOUNT_COLUMNS: &str = "id, email, name, phone, password_hash, role, department, \
     is_active, deleted_at, deleted_by, created_at, updated_at";

const SESSION_COLUMNS: &str =
    "id, account_id, token_hash, device, ip_address, created_at, expires_at";

/// Account repository backed by the `accounts` and `account_sessions` tables
#[derive(Clone)]
pub struct AccountRepo {
    pool: PgPool,
}

impl AccountRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_row_by_id(&self, id: Uuid) -> DbResult<Option<DbAccount>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let row = sqlx::query_as::<_, DbAccount>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn fetch_row_by_email(&self, email: &str) -> DbResult<Option<DbAccount>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1");
        let row = sqlx::query_as::<_, DbAccount>(&sql)
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Delete sessions past their expiry for one account
    pub async fn prune_expired_sessions(&self, account_id: Uuid) -> DbResult<u64> {
        let result = sqlx::query(
            "DELETE FROM account_sessions WHERE account_id = $1 AND expires_at <= NOW()",
        )
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete every expired session in the table
    pub async fn cleanup_expired_sessions(&self) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM account_sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn map_unique_violation(e: sqlx::Error, email: &str) -> DbError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.constraint() == Some("accounts_email_key") {
            return DbError::Duplicate(format!("Email {} already exists", email));
        }
        if db_err.code().as_deref() == Some("23514") {
            return DbError::Constraint(db_err.message().to_string());
        }
    }
    DbError::Query(e)
}

#[async_trait]
impl AccountStore for AccountRepo {
    async fn create_account(&self, new: NewAccount) -> DbResult<Account> {
        let email = normalize_email(&new.email);
        let sql = format!(
            r#"
            INSERT INTO accounts (id, email, name, phone, password_hash, role, department)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, DbAccount>(&sql)
            .bind(Uuid::new_v4())
            .bind(&email)
            .bind(&new.name)
            .bind(&new.phone)
            .bind(&new.password_hash)
            .bind(new.role.as_str())
            .bind(new.department.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, &email))?;

        Account::try_from(row)
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Account>> {
        self.fetch_row_by_id(id)
            .await?
            .map(Account::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<Account>> {
        self.fetch_row_by_email(email)
            .await?
            .map(Account::try_from)
            .transpose()
    }

    async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> DbResult<Option<AccountCredentials>> {
        self.fetch_row_by_email(email)
            .await?
            .map(DbAccount::into_credentials)
            .transpose()
    }

    async fn find_credentials_by_id(&self, id: Uuid) -> DbResult<Option<AccountCredentials>> {
        self.fetch_row_by_id(id)
            .await?
            .map(DbAccount::into_credentials)
            .transpose()
    }

    async fn list_accounts(&self, filter: &AccountFilter) -> DbResult<Vec<Account>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE TRUE"));

        if !filter.include_deleted {
            qb.push(" AND deleted_at IS NULL");
        }
        if let Some(role) = filter.role {
            qb.push(" AND role = ").push_bind(role.as_str());
        }
        if let Some(department) = filter.department {
            qb.push(" AND department = ").push_bind(department.as_str());
        }
        if let Some(ref search) = filter.search {
            let pattern = format!("%{}%", search.to_lowercase());
            qb.push(" AND (LOWER(name) LIKE ")
                .push_bind(pattern.clone())
                .push(" OR email LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let rows = qb
            .build_query_as::<DbAccount>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Account::try_from).collect()
    }

    async fn update_account(&self, id: Uuid, patch: AccountPatch) -> DbResult<Account> {
        let (set_phone, phone) = match patch.phone {
            Some(phone) => (true, phone),
            None => (false, None),
        };

        let sql = format!(
            r#"
            UPDATE accounts SET
                name = COALESCE($2, name),
                phone = CASE WHEN $3 THEN $4 ELSE phone END,
                role = COALESCE($5, role),
                department = COALESCE($6, department),
                is_active = COALESCE($7, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, DbAccount>(&sql)
            .bind(id)
            .bind(patch.name)
            .bind(set_phone)
            .bind(phone)
            .bind(patch.role.map(|r| r.as_str()))
            .bind(patch.department.map(|d| d.as_str()))
            .bind(patch.is_active)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("Account {}", id)))?;

        Account::try_from(row)
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE accounts SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Account {}", id)));
        }
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid, actor: Uuid) -> DbResult<Account> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE accounts SET
                deleted_at = NOW(),
                deleted_by = $2,
                is_active = FALSE,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, DbAccount>(&sql)
            .bind(id)
            .bind(actor)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("Account {}", id)))?;

        sqlx::query("DELETE FROM account_sessions WHERE account_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::Transaction(e.to_string()))?;

        Account::try_from(row)
    }

    async fn restore(&self, id: Uuid) -> DbResult<Account> {
        let sql = format!(
            r#"
            UPDATE accounts SET
                deleted_at = NULL,
                deleted_by = NULL,
                is_active = TRUE,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, DbAccount>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("Account {}", id)))?;

        Account::try_from(row)
    }

    async fn hard_delete(&self, id: Uuid) -> DbResult<()> {
        // account_sessions rows go with the account (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Account {}", id)));
        }
        Ok(())
    }

    async fn append_session(&self, account_id: Uuid, session: RefreshSession) -> DbResult<()> {
        self.prune_expired_sessions(account_id).await?;

        sqlx::query(
            r#"
            INSERT INTO account_sessions (id, account_id, token_hash, device, ip_address, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(session.id)
        .bind(account_id)
        .bind(&session.token_hash)
        .bind(&session.device)
        .bind(&session.ip_address)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn rotate_session(
        &self,
        account_id: Uuid,
        session_id: Uuid,
        check: &SessionCheck,
        replacement: RefreshSession,
    ) -> DbResult<RotateOutcome> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent rotations of the same session
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM account_sessions \
             WHERE id = $1 AND account_id = $2 FOR UPDATE"
        );
        let current = sqlx::query_as::<_, DbSession>(&sql)
            .bind(session_id)
            .bind(account_id)
            .fetch_optional(&mut *tx)
            .await?
            .map(RefreshSession::from);

        let previous = match current {
            Some(session) if check(&session) => session,
            _ => {
                tx.rollback().await?;
                return Ok(RotateOutcome::Rejected);
            }
        };

        sqlx::query("DELETE FROM account_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO account_sessions (id, account_id, token_hash, device, ip_address, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(replacement.id)
        .bind(account_id)
        .bind(&replacement.token_hash)
        .bind(&previous.device)
        .bind(&replacement.ip_address)
        .bind(replacement.created_at)
        .bind(replacement.expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::Transaction(e.to_string()))?;

        Ok(RotateOutcome::Rotated { previous })
    }

    async fn remove_session(&self, account_id: Uuid, session_id: Uuid) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM account_sessions WHERE id = $1 AND account_id = $2")
            .bind(session_id)
            .bind(account_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_other_sessions(&self, account_id: Uuid, keep: Option<Uuid>) -> DbResult<u64> {
        let result = sqlx::query(
            "DELETE FROM account_sessions WHERE account_id = $1 AND ($2::uuid IS NULL OR id <> $2)",
        )
        .bind(account_id)
        .bind(keep)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_sessions(&self, account_id: Uuid) -> DbResult<Vec<RefreshSession>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM account_sessions \
             WHERE account_id = $1 AND expires_at > $2 ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, DbSession>(&sql)
            .bind(account_id)
            .bind(Utc::now())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(RefreshSession::from).collect())
    }

    async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
