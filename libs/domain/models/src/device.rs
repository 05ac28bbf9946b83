// [libs/domain/models/src/device.rs]
/*!
 * Device registry entities (C4). A `Device` is created on first
 * successful enrollment and mutated by the heartbeat engine and the
 * administrator API; the core never deletes one.
 */

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Linux,
    Macos,
}

impl Platform {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "windows" => Some(Self::Windows),
            "linux" => Some(Self::Linux),
            "macos" => Some(Self::Macos),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::Macos => "macos",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
    Error,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Error => "error",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "online" => Some(Self::Online),
            "offline" => Some(Self::Offline),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub public_key: String,
    pub platform: Platform,
    pub version: String,
    pub enrollment_token: Option<String>,
    pub mac_address: Option<String>,
    pub status: DeviceStatus,
    pub last_seen: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Partial update applied by the device registry. `None` fields are
/// left untouched; this is never used to clear a field back to null.
#[derive(Debug, Clone, Default)]
pub struct DeviceUpdate {
    pub last_seen: Option<i64>,
    pub status: Option<DeviceStatus>,
    pub version: Option<String>,
    pub public_key: Option<String>,
    pub enrollment_token: Option<String>,
    pub platform: Option<Platform>,
}

/// Fields accepted when creating a device record.
#[derive(Debug, Clone)]
pub struct NewDevice {
    pub id: String,
    pub public_key: String,
    pub platform: Platform,
    pub version: String,
    pub enrollment_token: Option<String>,
    pub mac_address: Option<String>,
}
