// [libs/infra/db/src/repositories/enrollment_token.rs]
/*!
 * Enrollment token repository (C10). The KV store handles the hot
 * validate path; this repository is the administrator-facing record
 * of issued tokens and their usage history.
 */

use libsql::{params, Row};
use rmm_domain_models::EnrollmentToken;
use tracing::instrument;

use crate::client::Store;
use crate::errors::DbError;

pub struct EnrollmentTokenRepository {
    store: Store,
}

impl EnrollmentTokenRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn create(
        &self,
        token: &str,
        description: Option<&str>,
        created_by: Option<&str>,
        expires_at: Option<i64>,
        max_usage: i64,
        now_ms: i64,
    ) -> Result<EnrollmentToken, DbError> {
        let conn = self.store.get_connection()?;
        conn.execute(
            "INSERT INTO enrollment_tokens (token, description, created_by, created_at, expires_at, used, is_active, usage_count, max_usage)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, 1, 0, ?6)",
            params![token, description, created_by, now_ms, expires_at, max_usage],
        )
        .await?;

        self.get(token).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, token: &str) -> Result<EnrollmentToken, DbError> {
        self.find(token).await?.ok_or(DbError::TokenNotFound)
    }

    #[instrument(skip(self))]
    pub async fn find(&self, token: &str) -> Result<Option<EnrollmentToken>, DbError> {
        let conn = self.store.get_connection()?;
        let mut rows = conn
            .query(
                "SELECT token, description, created_by, created_at, expires_at, used, used_at, used_by_device, is_active, usage_count, max_usage
                 FROM enrollment_tokens WHERE token = ?1",
                params![token],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_token(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<EnrollmentToken>, DbError> {
        let conn = self.store.get_connection()?;
        let mut rows = conn
            .query(
                "SELECT token, description, created_by, created_at, expires_at, used, used_at, used_by_device, is_active, usage_count, max_usage
                 FROM enrollment_tokens ORDER BY created_at DESC",
                (),
            )
            .await?;

        let mut tokens = Vec::new();
        while let Some(row) = rows.next().await? {
            tokens.push(map_token(&row)?);
        }
        Ok(tokens)
    }

    /// Records one successful use against a single-use-tracked token.
    #[instrument(skip(self))]
    pub async fn record_usage(&self, token: &str, device_id: &str, now_ms: i64) -> Result<(), DbError> {
        let conn = self.store.get_connection()?;
        let affected = conn
            .execute(
                "UPDATE enrollment_tokens SET
                    used = 1,
                    used_at = ?2,
                    used_by_device = ?3,
                    usage_count = usage_count + 1
                 WHERE token = ?1",
                params![token, now_ms, device_id],
            )
            .await?;

        if affected == 0 {
            return Err(DbError::TokenNotFound);
        }
        Ok(())
    }

    /// Administrator update of the mutable fields on a token's
    /// relational row. Unset fields are left untouched.
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        token: &str,
        description: Option<&str>,
        expires_at: Option<i64>,
        max_usage: Option<i64>,
        is_active: Option<bool>,
    ) -> Result<EnrollmentToken, DbError> {
        let conn = self.store.get_connection()?;
        let affected = conn
            .execute(
                "UPDATE enrollment_tokens SET
                    description = COALESCE(?2, description),
                    expires_at = COALESCE(?3, expires_at),
                    max_usage = COALESCE(?4, max_usage),
                    is_active = COALESCE(?5, is_active)
                 WHERE token = ?1",
                params![token, description, expires_at, max_usage, is_active.map(|b| b as i64)],
            )
            .await?;

        if affected == 0 {
            return Err(DbError::TokenNotFound);
        }
        self.get(token).await
    }

    #[instrument(skip(self))]
    pub async fn deactivate(&self, token: &str) -> Result<(), DbError> {
        let conn = self.store.get_connection()?;
        let affected = conn
            .execute("UPDATE enrollment_tokens SET is_active = 0 WHERE token = ?1", params![token])
            .await?;

        if affected == 0 {
            return Err(DbError::TokenNotFound);
        }
        Ok(())
    }
}

fn map_token(row: &Row) -> Result<EnrollmentToken, DbError> {
    Ok(EnrollmentToken {
        token: row.get(0)?,
        description: row.get(1)?,
        created_by: row.get(2)?,
        created_at: row.get(3)?,
        expires_at: row.get(4)?,
        used: row.get::<i64>(5)? != 0,
        used_at: row.get(6)?,
        used_by_device: row.get(7)?,
        is_active: row.get::<i64>(8)? != 0,
        usage_count: row.get(9)?,
        max_usage: row.get(10)?,
    })
}
