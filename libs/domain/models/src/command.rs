// [libs/domain/models/src/command.rs]
/*!
 * The one-shot command queue (C8): priority-ordered, at-least-once
 * delivery, ack protocol.
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    Execute,
    FileOp,
    ConfigUpdate,
    Upgrade,
    Script,
}

impl CommandType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "execute" => Some(Self::Execute),
            "file_op" => Some(Self::FileOp),
            "config_update" => Some(Self::ConfigUpdate),
            "upgrade" => Some(Self::Upgrade),
            "script" => Some(Self::Script),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Execute => "execute",
            Self::FileOp => "file_op",
            Self::ConfigUpdate => "config_update",
            Self::Upgrade => "upgrade",
            Self::Script => "script",
        }
    }
}

/// Ascending rank: lower sorts first. `urgent < high < normal < low`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CommandPriority {
    Urgent,
    High,
    Normal,
    Low,
}

impl CommandPriority {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "urgent" => Some(Self::Urgent),
            "high" => Some(Self::High),
            "normal" => Some(Self::Normal),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Pending,
    Delivered,
    Executing,
    Completed,
    Failed,
    Expired,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "delivered" => Some(Self::Delivered),
            "executing" => Some(Self::Executing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    pub device_id: String,
    #[serde(rename = "type")]
    pub command_type: CommandType,
    pub priority: CommandPriority,
    pub payload: Value,
    pub status: CommandStatus,
    pub created_at: i64,
    pub expires_at: i64,
    pub delivered_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub retry_count: i64,
    pub max_retries: i64,
}
