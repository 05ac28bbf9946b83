// [libs/infra/db/src/repositories/config.rs]
/*!
 * Layered configuration repository (C9). Rows are keyed by
 * `(scope, target_id)`; `global` has no target, `token` is keyed by
 * enrollment token, `device` by device id.
 */

use libsql::{params, Row};
use rmm_domain_models::{ConfigScope, ConfigurationRow};
use serde_json::Value;
use tracing::instrument;

use crate::client::Store;
use crate::errors::DbError;

pub struct ConfigurationRepository {
    store: Store,
}

impl ConfigurationRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn find(&self, scope: ConfigScope, target_id: Option<&str>) -> Result<Option<ConfigurationRow>, DbError> {
        let conn = self.store.get_connection()?;
        let mut rows = conn
            .query(
                "SELECT id, scope, target_id, content, created_at, updated_at, updated_by
                 FROM configurations WHERE scope = ?1 AND target_id IS ?2",
                params![scope.as_str(), target_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_config(&row)?)),
            None => Ok(None),
        }
    }

    /// Upserts the layer identified by `(scope, target_id)`.
    #[instrument(skip(self, content))]
    pub async fn upsert(
        &self,
        scope: ConfigScope,
        target_id: Option<&str>,
        content: &Value,
        updated_by: Option<&str>,
        now_ms: i64,
    ) -> Result<ConfigurationRow, DbError> {
        let conn = self.store.get_connection()?;
        conn.execute(
            "INSERT INTO configurations (scope, target_id, content, created_at, updated_at, updated_by)
             VALUES (?1, ?2, ?3, ?4, ?4, ?5)
             ON CONFLICT(scope, target_id) DO UPDATE SET
                content = excluded.content,
                updated_at = excluded.updated_at,
                updated_by = excluded.updated_by",
            params![scope.as_str(), target_id, content.to_string(), now_ms, updated_by],
        )
        .await?;

        self.find(scope, target_id)
            .await?
            .ok_or_else(|| DbError::MappingError("configuration row vanished after upsert".into()))
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, scope: ConfigScope, target_id: Option<&str>) -> Result<(), DbError> {
        let conn = self.store.get_connection()?;
        let affected = conn
            .execute("DELETE FROM configurations WHERE scope = ?1 AND target_id IS ?2", params![scope.as_str(), target_id])
            .await?;

        if affected == 0 {
            return Err(DbError::ConfigNotFound);
        }
        Ok(())
    }

    /// Returns the layers applicable to a device, in
    /// global -> token -> device precedence order, skipping any layer
    /// that has never been set.
    #[instrument(skip(self))]
    pub async fn resolve_layers(&self, enrollment_token: Option<&str>, device_id: &str) -> Result<Vec<Value>, DbError> {
        let mut layers = Vec::new();

        if let Some(global) = self.find(ConfigScope::Global, None).await? {
            layers.push(global.content);
        }
        if let Some(token) = enrollment_token {
            if let Some(token_layer) = self.find(ConfigScope::Token, Some(token)).await? {
                layers.push(token_layer.content);
            }
        }
        if let Some(device_layer) = self.find(ConfigScope::Device, Some(device_id)).await? {
            layers.push(device_layer.content);
        }

        Ok(layers)
    }
}

fn map_config(row: &Row) -> Result<ConfigurationRow, DbError> {
    let scope_raw: String = row.get(1)?;
    let content_raw: String = row.get(3)?;

    Ok(ConfigurationRow {
        id: row.get(0)?,
        scope: ConfigScope::parse(&scope_raw)
            .ok_or_else(|| DbError::MappingError(format!("unknown config scope in storage: {scope_raw}")))?,
        target_id: row.get(2)?,
        content: serde_json::from_str(&content_raw)
            .map_err(|e| DbError::MappingError(format!("configuration content is not valid JSON: {e}")))?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        updated_by: row.get(6)?,
    })
}
