// [libs/infra/db/src/repositories/device.rs]
/*!
 * Device registry repository (C4).
 */

use libsql::{params, Row};
use rmm_domain_models::{Device, DeviceStatus, DeviceUpdate, NewDevice, Platform};
use tracing::instrument;

use crate::client::Store;
use crate::errors::DbError;

pub struct DeviceRepository {
    store: Store,
}

impl DeviceRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    #[instrument(skip(self, new_device))]
    pub async fn create(&self, new_device: NewDevice, now_ms: i64) -> Result<Device, DbError> {
        let conn = self.store.get_connection()?;
        conn.execute(
            "INSERT INTO devices (id, public_key, platform, version, enrollment_token, mac_address, status, last_seen, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'offline', ?7, ?7, ?7)",
            params![
                new_device.id.clone(),
                new_device.public_key,
                new_device.platform.as_str(),
                new_device.version,
                new_device.enrollment_token,
                new_device.mac_address,
                now_ms,
            ],
        )
        .await?;

        self.get(&new_device.id).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, device_id: &str) -> Result<Device, DbError> {
        self.find(device_id).await?.ok_or(DbError::DeviceNotFound)
    }

    #[instrument(skip(self))]
    pub async fn find(&self, device_id: &str) -> Result<Option<Device>, DbError> {
        let conn = self.store.get_connection()?;
        let mut rows = conn
            .query(
                "SELECT id, public_key, platform, version, enrollment_token, mac_address, status, last_seen, created_at, updated_at
                 FROM devices WHERE id = ?1",
                params![device_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_device(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn find_by_mac(&self, mac_address: &str) -> Result<Option<Device>, DbError> {
        let conn = self.store.get_connection()?;
        let mut rows = conn
            .query(
                "SELECT id, public_key, platform, version, enrollment_token, mac_address, status, last_seen, created_at, updated_at
                 FROM devices WHERE mac_address = ?1",
                params![mac_address],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_device(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, update))]
    pub async fn update(&self, device_id: &str, update: DeviceUpdate, now_ms: i64) -> Result<(), DbError> {
        let conn = self.store.get_connection()?;

        let affected = conn
            .execute(
                "UPDATE devices SET
                    last_seen = COALESCE(?2, last_seen),
                    status = COALESCE(?3, status),
                    version = COALESCE(?4, version),
                    public_key = COALESCE(?5, public_key),
                    enrollment_token = COALESCE(?6, enrollment_token),
                    platform = COALESCE(?7, platform),
                    updated_at = ?8
                 WHERE id = ?1",
                params![
                    device_id,
                    update.last_seen,
                    update.status.map(|s| s.as_str().to_string()),
                    update.version,
                    update.public_key,
                    update.enrollment_token,
                    update.platform.map(|p| p.as_str().to_string()),
                    now_ms,
                ],
            )
            .await?;

        if affected == 0 {
            return Err(DbError::DeviceNotFound);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Device>, DbError> {
        let conn = self.store.get_connection()?;
        let mut rows = conn
            .query(
                "SELECT id, public_key, platform, version, enrollment_token, mac_address, status, last_seen, created_at, updated_at
                 FROM devices ORDER BY last_seen DESC LIMIT ?1 OFFSET ?2",
                params![limit, offset],
            )
            .await?;

        let mut devices = Vec::new();
        while let Some(row) = rows.next().await? {
            devices.push(map_device(&row)?);
        }
        Ok(devices)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, device_id: &str) -> Result<(), DbError> {
        let conn = self.store.get_connection()?;
        let affected = conn.execute("DELETE FROM devices WHERE id = ?1", params![device_id]).await?;

        if affected == 0 {
            return Err(DbError::DeviceNotFound);
        }
        Ok(())
    }
}

fn map_device(row: &Row) -> Result<Device, DbError> {
    let platform_raw: String = row.get(2)?;
    let status_raw: String = row.get(6)?;

    Ok(Device {
        id: row.get(0)?,
        public_key: row.get(1)?,
        platform: Platform::parse(&platform_raw)
            .ok_or_else(|| DbError::MappingError(format!("unknown platform in storage: {platform_raw}")))?,
        version: row.get(3)?,
        enrollment_token: row.get(4)?,
        mac_address: row.get(5)?,
        status: DeviceStatus::parse(&status_raw)
            .ok_or_else(|| DbError::MappingError(format!("unknown device status in storage: {status_raw}")))?,
        last_seen: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}
