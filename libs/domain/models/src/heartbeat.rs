// [libs/domain/models/src/heartbeat.rs]
/*!
 * `/agent/heartbeat` request/response envelopes (C6).
 */

use serde::{Deserialize, Serialize};

use crate::task::{CancelDelivery, TaskDelivery, TaskReport};

#[derive(Debug, Clone, Deserialize)]
pub struct SystemInfo {
    pub platform: String,
    pub version: String,
    pub uptime: i64,
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub disk_usage: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatRequest {
    pub device_id: String,
    pub timestamp: i64,
    pub nonce: String,
    pub signature: String,
    pub protocol_version: String,
    pub system_info: SystemInfo,
    #[serde(default)]
    pub reports: Vec<TaskReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatResponse {
    pub status: &'static str,
    pub server_time: i64,
    pub next_heartbeat: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<TaskDelivery>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cancels: Vec<CancelDelivery>,
}
