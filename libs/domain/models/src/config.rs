// [libs/domain/models/src/config.rs]
/*!
 * Layered configuration rows resolved global -> token -> device (C9).
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigScope {
    Global,
    Token,
    Device,
}

impl ConfigScope {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "global" => Some(Self::Global),
            "token" => Some(Self::Token),
            "device" => Some(Self::Device),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Token => "token",
            Self::Device => "device",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationRow {
    pub id: i64,
    pub scope: ConfigScope,
    pub target_id: Option<String>,
    pub content: Value,
    pub created_at: i64,
    pub updated_at: i64,
    pub updated_by: Option<String>,
}
