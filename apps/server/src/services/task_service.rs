// [apps/server/src/services/task_service.rs]
/*!
 * Declarative task queue orchestration (C7). Thin over
 * `TaskRepository` — this layer owns task-id generation and the
 * translation from stored `Task`/`TaskState` pairs into the delivery
 * shapes a heartbeat response sends an agent.
 */

use rmm_domain_models::{CancelDelivery, DesiredState, Task, TaskDelivery, TaskReport, TaskState, TaskStateValue, TaskType};
use rmm_infra_db::{DbError, NewTask, TaskRepository};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

pub struct TaskService {
    repository: Arc<TaskRepository>,
}

impl TaskService {
    pub fn new(repository: Arc<TaskRepository>) -> Self {
        Self { repository }
    }

    pub async fn create(
        &self,
        device_id: &str,
        task_type: TaskType,
        payload: Value,
        timeout_s: Option<i64>,
        now_ms: i64,
    ) -> Result<Task, DbError> {
        let new_task = NewTask { task_id: Uuid::new_v4().to_string(), device_id: device_id.to_string(), task_type, payload, timeout_s };
        self.repository.create(new_task, now_ms).await
    }

    pub async fn get(&self, task_id: &str) -> Result<Task, DbError> {
        self.repository.get(task_id).await
    }

    pub async fn get_state(&self, task_id: &str) -> Result<TaskState, DbError> {
        self.repository.get_state(task_id).await
    }

    pub async fn list_for_device(&self, device_id: &str) -> Result<Vec<Task>, DbError> {
        self.repository.list_for_device(device_id).await
    }

    pub async fn cancel(&self, task_id: &str, now_ms: i64) -> Result<(), DbError> {
        self.repository.cancel(task_id, now_ms).await
    }

    /// The `tasks`/`cancellations` payload for one heartbeat response:
    /// every deliverable task plus any cancellation an agent hasn't
    /// yet acknowledged by reaching a terminal state.
    pub async fn deliveries_for_heartbeat(&self, device_id: &str) -> Result<(Vec<TaskDelivery>, Vec<CancelDelivery>), DbError> {
        let deliverable = self.repository.select_deliverable(device_id).await?;
        let pending_cancels = self.repository.select_pending_cancels(device_id).await?;

        let tasks = deliverable
            .into_iter()
            .filter(|t| !matches!(t.desired_state, DesiredState::Canceled))
            .map(|t| TaskDelivery { task_id: t.task_id, revision: t.revision, task_type: t.task_type, desired_state: t.desired_state, payload: t.payload })
            .collect();

        let cancellations = pending_cancels
            .into_iter()
            .map(|t| CancelDelivery { task_id: t.task_id, revision: t.revision, desired_state: t.desired_state })
            .collect();

        Ok((tasks, cancellations))
    }

    /// A batch may carry several reports for the same task; apply them
    /// in received/running/terminal order per task so a late-arriving
    /// but lower-priority report never regresses one already applied
    /// from the same batch.
    pub async fn apply_reports(&self, device_id: &str, reports: &[TaskReport], now_ms: i64) -> Result<(), DbError> {
        let mut ordered: Vec<&TaskReport> = reports.iter().collect();
        ordered.sort_by_key(|r| TaskStateValue::parse(&r.state).map(|s| s.batch_priority()).unwrap_or(u8::MAX));

        for report in ordered {
            self.repository.apply_report(device_id, report, now_ms).await?;
        }
        Ok(())
    }
}
