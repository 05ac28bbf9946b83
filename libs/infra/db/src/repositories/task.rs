// [libs/infra/db/src/repositories/task.rs]
/*!
 * Declarative task queue repository (C7): task definitions, their
 * agent-reported state, and the delivery-selection queries a
 * heartbeat uses to decide what an agent should receive next.
 */

use libsql::{params, Row};
use rmm_domain_models::{DesiredState, Task, TaskReport, TaskState, TaskStateValue, TaskType};
use serde_json::Value;
use tracing::instrument;

use crate::client::Store;
use crate::errors::DbError;

pub struct NewTask {
    pub task_id: String,
    pub device_id: String,
    pub task_type: TaskType,
    pub payload: Value,
    pub timeout_s: Option<i64>,
}

pub struct TaskRepository {
    store: Store,
}

impl TaskRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    #[instrument(skip(self, new_task))]
    pub async fn create(&self, new_task: NewTask, now_ms: i64) -> Result<Task, DbError> {
        let conn = self.store.get_connection()?;
        conn.execute(
            "INSERT INTO tasks (task_id, device_id, type, payload, revision, desired_state, timeout_s, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 1, 'pending', ?5, ?6, ?6)",
            params![
                new_task.task_id.clone(),
                new_task.device_id.clone(),
                new_task.task_type.as_str(),
                new_task.payload.to_string(),
                new_task.timeout_s,
                now_ms,
            ],
        )
        .await?;

        conn.execute(
            "INSERT INTO task_states (task_id, device_id, state, progress, output_cursor, updated_at)
             VALUES (?1, ?2, 'received', 0, 0, ?3)",
            params![new_task.task_id.clone(), new_task.device_id, now_ms],
        )
        .await?;

        self.get(&new_task.task_id).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, task_id: &str) -> Result<Task, DbError> {
        let conn = self.store.get_connection()?;
        let mut rows = conn
            .query(
                "SELECT task_id, device_id, type, payload, revision, desired_state, timeout_s, created_at, updated_at
                 FROM tasks WHERE task_id = ?1",
                params![task_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => map_task(&row),
            None => Err(DbError::TaskNotFound),
        }
    }

    #[instrument(skip(self))]
    pub async fn get_state(&self, task_id: &str) -> Result<TaskState, DbError> {
        let conn = self.store.get_connection()?;
        let mut rows = conn
            .query(
                "SELECT task_id, device_id, state, progress, output_cursor, error, updated_at
                 FROM task_states WHERE task_id = ?1",
                params![task_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => map_task_state(&row),
            None => Err(DbError::TaskNotFound),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_for_device(&self, device_id: &str) -> Result<Vec<Task>, DbError> {
        let conn = self.store.get_connection()?;
        let mut rows = conn
            .query(
                "SELECT task_id, device_id, type, payload, revision, desired_state, timeout_s, created_at, updated_at
                 FROM tasks WHERE device_id = ?1 ORDER BY created_at DESC",
                params![device_id],
            )
            .await?;

        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await? {
            tasks.push(map_task(&row)?);
        }
        Ok(tasks)
    }

    /// Tasks an agent should be delivered this heartbeat: desired state
    /// is `pending` (not yet delivered) or `running` with no terminal
    /// report recorded yet, and the task has not already reached a
    /// terminal state on the agent's side.
    #[instrument(skip(self))]
    pub async fn select_deliverable(&self, device_id: &str) -> Result<Vec<Task>, DbError> {
        let conn = self.store.get_connection()?;
        let mut rows = conn
            .query(
                "SELECT t.task_id, t.device_id, t.type, t.payload, t.revision, t.desired_state, t.timeout_s, t.created_at, t.updated_at
                 FROM tasks t
                 JOIN task_states s ON s.task_id = t.task_id
                 WHERE t.device_id = ?1
                   AND t.desired_state IN ('pending', 'running')
                   AND s.state NOT IN ('succeeded', 'failed', 'canceled')",
                params![device_id],
            )
            .await?;

        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await? {
            tasks.push(map_task(&row)?);
        }
        Ok(tasks)
    }

    /// Tasks whose administrator-desired state is `canceled` but whose
    /// agent-reported state is not yet terminal — these still need a
    /// cancel delivery.
    #[instrument(skip(self))]
    pub async fn select_pending_cancels(&self, device_id: &str) -> Result<Vec<Task>, DbError> {
        let conn = self.store.get_connection()?;
        let mut rows = conn
            .query(
                "SELECT t.task_id, t.device_id, t.type, t.payload, t.revision, t.desired_state, t.timeout_s, t.created_at, t.updated_at
                 FROM tasks t
                 JOIN task_states s ON s.task_id = t.task_id
                 WHERE t.device_id = ?1
                   AND t.desired_state = 'canceled'
                   AND s.state NOT IN ('succeeded', 'failed', 'canceled')",
                params![device_id],
            )
            .await?;

        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await? {
            tasks.push(map_task(&row)?);
        }
        Ok(tasks)
    }

    /// Marks a task canceled and bumps its revision so a stale
    /// in-flight delivery on the agent is superseded. Administrator
    /// mutation is the only path that bumps `revision`.
    #[instrument(skip(self))]
    pub async fn cancel(&self, task_id: &str, now_ms: i64) -> Result<(), DbError> {
        let conn = self.store.get_connection()?;
        let affected = conn
            .execute(
                "UPDATE tasks SET desired_state = 'canceled', revision = revision + 1, updated_at = ?2
                 WHERE task_id = ?1",
                params![task_id, now_ms],
            )
            .await?;

        if affected == 0 {
            return Err(DbError::TaskNotFound);
        }
        Ok(())
    }

    /// Applies a single agent report, enforcing terminal-state
    /// monotonicity under a transaction: re-reads the current state
    /// before writing so a concurrent terminal report can never be
    /// regressed by a late non-terminal one.
    #[instrument(skip(self, report))]
    pub async fn apply_report(&self, device_id: &str, report: &TaskReport, now_ms: i64) -> Result<(), DbError> {
        let new_state = TaskStateValue::parse(&report.state)
            .ok_or_else(|| DbError::MappingError(format!("unknown task report state: {}", report.state)))?;

        let conn = self.store.get_connection()?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))?;

        let mut rows = tx
            .query(
                "SELECT state, progress, output_cursor FROM task_states WHERE task_id = ?1 AND device_id = ?2",
                params![report.task_id.clone(), device_id],
            )
            .await?;

        let (current, stored_cursor) = match rows.next().await? {
            Some(row) => {
                let state_raw: String = row.get(0)?;
                let state = TaskStateValue::parse(&state_raw)
                    .ok_or_else(|| DbError::MappingError(format!("unknown stored task state: {state_raw}")))?;
                let cursor: i64 = row.get(2)?;
                (state, cursor)
            }
            None => return Err(DbError::TaskNotFound),
        };
        drop(rows);

        if current.is_terminal() && new_state.batch_priority() < current.batch_priority() {
            // A terminal state never regresses; silently keep it.
            tx.commit().await.map_err(|e| DbError::TransactionError(e.to_string()))?;
            return Ok(());
        }

        // Dedup: only a cursor at or past the last seen position advances
        // the stored cursor or appends a log chunk. A lower cursor is a
        // replayed or out-of-order report and is dropped.
        let cursor_accepted = report.output_cursor.map_or(true, |c| c >= stored_cursor);
        let next_cursor = if cursor_accepted { report.output_cursor } else { None };

        tx.execute(
            "UPDATE task_states SET state = ?3, progress = COALESCE(?4, progress),
                output_cursor = COALESCE(?5, output_cursor), error = ?6, updated_at = ?7
             WHERE task_id = ?1 AND device_id = ?2",
            params![
                report.task_id.clone(),
                device_id,
                new_state.as_str(),
                report.progress,
                next_cursor,
                report.error.clone(),
                now_ms,
            ],
        )
        .await?;

        if cursor_accepted {
            if let Some(chunk) = &report.output_chunk {
                tx.execute(
                    "INSERT INTO task_logs (task_id, device_id, output_chunk, recorded_at) VALUES (?1, ?2, ?3, ?4)",
                    params![report.task_id.clone(), device_id, chunk.clone(), now_ms],
                )
                .await?;
            }
        }

        tx.commit().await.map_err(|e| DbError::TransactionError(e.to_string()))?;
        Ok(())
    }
}

fn map_task(row: &Row) -> Result<Task, DbError> {
    let type_raw: String = row.get(2)?;
    let desired_raw: String = row.get(5)?;
    let payload_raw: String = row.get(3)?;

    Ok(Task {
        task_id: row.get(0)?,
        device_id: row.get(1)?,
        task_type: TaskType::parse(&type_raw)
            .ok_or_else(|| DbError::MappingError(format!("unknown task type in storage: {type_raw}")))?,
        payload: serde_json::from_str(&payload_raw)
            .map_err(|e| DbError::MappingError(format!("task payload is not valid JSON: {e}")))?,
        revision: row.get(4)?,
        desired_state: DesiredState::parse(&desired_raw)
            .ok_or_else(|| DbError::MappingError(format!("unknown desired state in storage: {desired_raw}")))?,
        timeout_s: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn map_task_state(row: &Row) -> Result<TaskState, DbError> {
    let state_raw: String = row.get(2)?;

    Ok(TaskState {
        task_id: row.get(0)?,
        device_id: row.get(1)?,
        state: TaskStateValue::parse(&state_raw)
            .ok_or_else(|| DbError::MappingError(format!("unknown task state in storage: {state_raw}")))?,
        progress: row.get(3)?,
        output_cursor: row.get(4)?,
        error: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
