// [apps/server/src/services/command_queue.rs]
/*!
 * Priority-ordered command queue (C8). The KV store holds the live
 * record and a per-device index; `CommandRepository` receives an
 * upsert on every status transition so the audit trail survives past
 * the KV entry's TTL.
 */

use rmm_domain_models::{Command, CommandPriority, CommandStatus, CommandType};
use rmm_infra_db::{CommandRepository, DbError};
use rmm_infra_kv::KvStore;
use std::sync::Arc;
use uuid::Uuid;

const COMMAND_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

#[derive(Debug, thiserror::Error)]
pub enum CommandQueueError {
    #[error("unsupported command type")]
    InvalidType,
    #[error("command not found")]
    NotFound,
    #[error("command belongs to a different device")]
    WrongDevice,
    #[error("command has expired")]
    Expired,
    #[error(transparent)]
    Db(#[from] DbError),
}

pub struct CommandQueue {
    cache: Arc<KvStore>,
    repository: Arc<CommandRepository>,
}

impl CommandQueue {
    pub fn new(cache: Arc<KvStore>, repository: Arc<CommandRepository>) -> Self {
        Self { cache, repository }
    }

    pub async fn enqueue(
        &self,
        device_id: &str,
        command_type_raw: &str,
        priority: CommandPriority,
        payload: serde_json::Value,
        ttl_s: i64,
        max_retries: i64,
        now_ms: i64,
    ) -> Result<Command, CommandQueueError> {
        let command_type = CommandType::parse(command_type_raw).ok_or(CommandQueueError::InvalidType)?;

        let command = Command {
            id: Uuid::new_v4().to_string(),
            device_id: device_id.to_string(),
            command_type,
            priority,
            payload,
            status: CommandStatus::Pending,
            created_at: now_ms,
            expires_at: now_ms + ttl_s * 1000,
            delivered_at: None,
            completed_at: None,
            result: None,
            error: None,
            retry_count: 0,
            max_retries,
        };

        self.persist(&command, now_ms).await?;
        Ok(command)
    }

    /// Returns the device's pending commands ordered urgent-first,
    /// then by age, marking each as delivered. Expired commands are
    /// dropped from the index and reported neither here nor again.
    pub async fn poll(&self, device_id: &str, limit: usize, now_ms: i64) -> Result<Vec<Command>, CommandQueueError> {
        let index_key = index_key(device_id);
        let mut ids: Vec<String> = self
            .cache
            .get(&index_key, now_ms)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        let mut pending = Vec::new();
        let mut still_indexed = Vec::new();

        for id in &ids {
            match self.cache.get(&command_key(id), now_ms).and_then(|v| serde_json::from_value::<Command>(v).ok()) {
                Some(mut command) if command.expires_at > now_ms && matches!(command.status, CommandStatus::Pending) => {
                    still_indexed.push(id.clone());
                    command.status = CommandStatus::Delivered;
                    pending.push(command);
                }
                Some(command) if matches!(command.status, CommandStatus::Delivered | CommandStatus::Executing) => {
                    still_indexed.push(id.clone());
                }
                Some(mut command) if matches!(command.status, CommandStatus::Pending) => {
                    command.status = CommandStatus::Expired;
                    command.completed_at = Some(now_ms);
                    self.persist(&command, now_ms).await?;
                }
                _ => {}
            }
        }

        pending.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.created_at.cmp(&b.created_at)));
        pending.truncate(limit);

        for command in &pending {
            self.persist(command, now_ms).await?;
        }

        ids = still_indexed;
        self.cache.set(&index_key, serde_json::to_value(&ids).expect("Vec<String> always serializes"), COMMAND_TTL_MS, now_ms);

        Ok(pending)
    }

    /// Applies a device's acknowledgement. Returns `WrongDevice` if
    /// the caller does not own the command, matching the forbidden
    /// response for a cross-device ack attempt.
    pub async fn ack(
        &self,
        command_id: &str,
        device_id: &str,
        status: CommandStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
        now_ms: i64,
    ) -> Result<Command, CommandQueueError> {
        let mut command = self
            .cache
            .get(&command_key(command_id), now_ms)
            .and_then(|v| serde_json::from_value::<Command>(v).ok())
            .ok_or(CommandQueueError::NotFound)?;

        if command.device_id != device_id {
            return Err(CommandQueueError::WrongDevice);
        }
        if command.expires_at <= now_ms {
            return Err(CommandQueueError::Expired);
        }

        command.status = status;
        command.result = result;
        command.error = error;
        if matches!(status, CommandStatus::Completed | CommandStatus::Failed | CommandStatus::Expired) {
            command.completed_at = Some(now_ms);
            self.remove_from_index(device_id, command_id, now_ms).await;
        }

        self.persist(&command, now_ms).await?;
        Ok(command)
    }

    pub async fn get(&self, command_id: &str, now_ms: i64) -> Result<Command, CommandQueueError> {
        if let Some(command) = self.cache.get(&command_key(command_id), now_ms).and_then(|v| serde_json::from_value(v).ok()) {
            return Ok(command);
        }
        self.repository.get(command_id).await.map_err(|_| CommandQueueError::NotFound)
    }

    pub async fn list_for_device(&self, device_id: &str, limit: i64) -> Result<Vec<Command>, CommandQueueError> {
        Ok(self.repository.list_for_device(device_id, limit).await?)
    }

    async fn persist(&self, command: &Command, now_ms: i64) -> Result<(), DbError> {
        let ttl_ms = (command.expires_at - now_ms).max(0) + COMMAND_TTL_MS;
        self.cache.set(&command_key(&command.id), serde_json::to_value(command).expect("Command always serializes"), ttl_ms, now_ms);

        if matches!(command.status, CommandStatus::Pending) {
            let index_key = index_key(&command.device_id);
            let mut ids: Vec<String> =
                self.cache.get(&index_key, now_ms).and_then(|v| serde_json::from_value(v).ok()).unwrap_or_default();
            if !ids.contains(&command.id) {
                ids.push(command.id.clone());
            }
            self.cache.set(&index_key, serde_json::to_value(&ids).expect("Vec<String> always serializes"), COMMAND_TTL_MS, now_ms);
        }

        self.repository.upsert(command).await
    }

    async fn remove_from_index(&self, device_id: &str, command_id: &str, now_ms: i64) {
        let index_key = index_key(device_id);
        if let Some(mut ids) = self.cache.get(&index_key, now_ms).and_then(|v| serde_json::from_value::<Vec<String>>(v).ok()) {
            ids.retain(|id| id != command_id);
            self.cache.set(&index_key, serde_json::to_value(&ids).expect("Vec<String> always serializes"), COMMAND_TTL_MS, now_ms);
        }
    }
}

fn command_key(command_id: &str) -> String {
    format!("cmd:{command_id}")
}

fn index_key(device_id: &str) -> String {
    format!("cmd:index:{device_id}")
}
