// [libs/domain/models/src/task.rs]
/*!
 * Declarative task lifecycle entities (C7). A `Task` carries
 * administrator-desired state and a monotonic `revision`; a paired
 * `TaskState` row carries agent-reported progress.
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    ConfigUpdate,
    CmdExec,
}

impl TaskType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "config_update" => Some(Self::ConfigUpdate),
            "cmd_exec" => Some(Self::CmdExec),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigUpdate => "config_update",
            Self::CmdExec => "cmd_exec",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DesiredState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl DesiredState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub device_id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub payload: Value,
    pub revision: i64,
    pub desired_state: DesiredState,
    pub timeout_s: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// The state values a `TaskState` row may hold. `Received` and
/// `Running` are non-terminal; the other three are terminal and never
/// regress once reached.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStateValue {
    Received,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl TaskStateValue {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    /// Fixed priority used to order multiple reports for the same
    /// task within one heartbeat batch: terminal states always win,
    /// regardless of arrival order within the batch.
    pub fn batch_priority(&self) -> u8 {
        match self {
            Self::Received => 0,
            Self::Running => 1,
            Self::Succeeded | Self::Failed | Self::Canceled => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "received" => Some(Self::Received),
            "running" => Some(Self::Running),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskState {
    pub task_id: String,
    pub device_id: String,
    pub state: TaskStateValue,
    pub progress: i64,
    pub output_cursor: i64,
    pub error: Option<String>,
    pub updated_at: i64,
}

/// One entry of an agent's `reports` batch in a heartbeat request.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskReport {
    pub task_id: String,
    pub state: String,
    pub progress: Option<i64>,
    pub output_chunk: Option<String>,
    pub output_cursor: Option<i64>,
    pub error: Option<String>,
}

/// Outgoing task delivered to an agent during heartbeat.
#[derive(Debug, Clone, Serialize)]
pub struct TaskDelivery {
    pub task_id: String,
    pub revision: i64,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub desired_state: DesiredState,
    pub payload: Value,
}

/// Outgoing cancellation delivered to an agent during heartbeat.
#[derive(Debug, Clone, Serialize)]
pub struct CancelDelivery {
    pub task_id: String,
    pub revision: i64,
    pub desired_state: DesiredState,
}
