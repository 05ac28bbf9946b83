// [libs/infra/db/src/repositories/command.rs]
/*!
 * Command audit repository (C8). The command queue's live path runs
 * entirely through the KV store; this repository keeps a relational
 * shadow row so a completed or expired command is still visible to
 * `GET /commands/:id` after it leaves the KV index's TTL window.
 */

use libsql::{params, Row};
use rmm_domain_models::{Command, CommandPriority, CommandStatus, CommandType};
use serde_json::Value;
use tracing::instrument;

use crate::client::Store;
use crate::errors::DbError;

pub struct CommandRepository {
    store: Store,
}

impl CommandRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Writes or refreshes the shadow row. Called whenever the KV-backed
    /// command record changes status, so the relational copy never
    /// drifts far behind the authoritative KV state.
    #[instrument(skip(self, command))]
    pub async fn upsert(&self, command: &Command) -> Result<(), DbError> {
        let conn = self.store.get_connection()?;
        conn.execute(
            "INSERT INTO commands (id, device_id, type, priority, payload, status, created_at, expires_at, delivered_at, completed_at, result, error, retry_count, max_retries)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                delivered_at = excluded.delivered_at,
                completed_at = excluded.completed_at,
                result = excluded.result,
                error = excluded.error,
                retry_count = excluded.retry_count",
            params![
                command.id.clone(),
                command.device_id.clone(),
                command.command_type.as_str(),
                command.priority.as_str(),
                command.payload.to_string(),
                command.status.as_str(),
                command.created_at,
                command.expires_at,
                command.delivered_at,
                command.completed_at,
                command.result.as_ref().map(|v| v.to_string()),
                command.error.clone(),
                command.retry_count,
                command.max_retries,
            ],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, command_id: &str) -> Result<Command, DbError> {
        let conn = self.store.get_connection()?;
        let mut rows = conn
            .query(
                "SELECT id, device_id, type, priority, payload, status, created_at, expires_at, delivered_at, completed_at, result, error, retry_count, max_retries
                 FROM commands WHERE id = ?1",
                params![command_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => map_command(&row),
            None => Err(DbError::CommandNotFound),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_for_device(&self, device_id: &str, limit: i64) -> Result<Vec<Command>, DbError> {
        let conn = self.store.get_connection()?;
        let mut rows = conn
            .query(
                "SELECT id, device_id, type, priority, payload, status, created_at, expires_at, delivered_at, completed_at, result, error, retry_count, max_retries
                 FROM commands WHERE device_id = ?1 ORDER BY created_at DESC LIMIT ?2",
                params![device_id, limit],
            )
            .await?;

        let mut commands = Vec::new();
        while let Some(row) = rows.next().await? {
            commands.push(map_command(&row)?);
        }
        Ok(commands)
    }
}

fn map_command(row: &Row) -> Result<Command, DbError> {
    let type_raw: String = row.get(2)?;
    let priority_raw: String = row.get(3)?;
    let payload_raw: String = row.get(4)?;
    let status_raw: String = row.get(5)?;
    let result_raw: Option<String> = row.get(10)?;

    Ok(Command {
        id: row.get(0)?,
        device_id: row.get(1)?,
        command_type: CommandType::parse(&type_raw)
            .ok_or_else(|| DbError::MappingError(format!("unknown command type in storage: {type_raw}")))?,
        priority: CommandPriority::parse(&priority_raw)
            .ok_or_else(|| DbError::MappingError(format!("unknown command priority in storage: {priority_raw}")))?,
        payload: serde_json::from_str(&payload_raw)
            .map_err(|e| DbError::MappingError(format!("command payload is not valid JSON: {e}")))?,
        status: CommandStatus::parse(&status_raw)
            .ok_or_else(|| DbError::MappingError(format!("unknown command status in storage: {status_raw}")))?,
        created_at: row.get(6)?,
        expires_at: row.get(7)?,
        delivered_at: row.get(8)?,
        completed_at: row.get(9)?,
        result: result_raw
            .map(|raw| serde_json::from_str::<Value>(&raw))
            .transpose()
            .map_err(|e| DbError::MappingError(format!("command result is not valid JSON: {e}")))?,
        error: row.get(11)?,
        retry_count: row.get(12)?,
        max_retries: row.get(13)?,
    })
}
