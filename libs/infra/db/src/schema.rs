// [libs/infra/db/src/schema.rs]
/*!
 * Idempotent schema migration. Every statement is `CREATE TABLE IF NOT
 * EXISTS`/`CREATE INDEX IF NOT EXISTS` so startup can run it against an
 * already-provisioned database without side effects.
 */

use libsql::Connection;
use tracing::{debug, info, instrument};

use crate::errors::DbError;

const TABLES: &[(&str, &str)] = &[
    ("devices", r#"
        CREATE TABLE IF NOT EXISTS devices (
            id TEXT PRIMARY KEY,
            public_key TEXT NOT NULL,
            platform TEXT NOT NULL,
            version TEXT NOT NULL,
            enrollment_token TEXT,
            mac_address TEXT UNIQUE,
            status TEXT NOT NULL DEFAULT 'offline',
            last_seen INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
    "#),
    ("tasks", r#"
        CREATE TABLE IF NOT EXISTS tasks (
            task_id TEXT PRIMARY KEY,
            device_id TEXT NOT NULL,
            type TEXT NOT NULL,
            payload TEXT NOT NULL,
            revision INTEGER NOT NULL DEFAULT 1,
            desired_state TEXT NOT NULL DEFAULT 'pending',
            timeout_s INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
    "#),
    ("task_states", r#"
        CREATE TABLE IF NOT EXISTS task_states (
            task_id TEXT PRIMARY KEY,
            device_id TEXT NOT NULL,
            state TEXT NOT NULL DEFAULT 'received',
            progress INTEGER NOT NULL DEFAULT 0,
            output_cursor INTEGER NOT NULL DEFAULT 0,
            error TEXT,
            updated_at INTEGER NOT NULL
        );
    "#),
    ("task_logs", r#"
        CREATE TABLE IF NOT EXISTS task_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id TEXT NOT NULL,
            device_id TEXT NOT NULL,
            output_chunk TEXT NOT NULL,
            recorded_at INTEGER NOT NULL
        );
    "#),
    ("configurations", r#"
        CREATE TABLE IF NOT EXISTS configurations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            scope TEXT NOT NULL,
            target_id TEXT,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            updated_by TEXT,
            UNIQUE(scope, target_id)
        );
    "#),
    ("enrollment_tokens", r#"
        CREATE TABLE IF NOT EXISTS enrollment_tokens (
            token TEXT PRIMARY KEY,
            description TEXT,
            created_by TEXT,
            created_at INTEGER NOT NULL,
            expires_at INTEGER,
            used INTEGER NOT NULL DEFAULT 0,
            used_at INTEGER,
            used_by_device TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            usage_count INTEGER NOT NULL DEFAULT 0,
            max_usage INTEGER NOT NULL DEFAULT 1
        );
    "#),
    ("commands", r#"
        CREATE TABLE IF NOT EXISTS commands (
            id TEXT PRIMARY KEY,
            device_id TEXT NOT NULL,
            type TEXT NOT NULL,
            priority TEXT NOT NULL DEFAULT 'normal',
            payload TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            delivered_at INTEGER,
            completed_at INTEGER,
            result TEXT,
            error TEXT,
            retry_count INTEGER NOT NULL DEFAULT 0,
            max_retries INTEGER NOT NULL DEFAULT 0
        );
    "#),
    // Collaborator schema for the out-of-scope terminal relay. No code path in this
    // crate reads or writes this table; carried so the persisted schema stays complete.
    ("sessions", r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            device_id TEXT NOT NULL,
            durable_object_id TEXT,
            status TEXT NOT NULL DEFAULT 'open',
            created_at INTEGER NOT NULL,
            expires_at INTEGER,
            last_activity INTEGER
        );
    "#),
];

const INDEXES: &[(&str, &str)] = &[
    ("idx_tasks_device", "CREATE INDEX IF NOT EXISTS idx_tasks_device ON tasks(device_id, desired_state);"),
    ("idx_task_logs_task", "CREATE INDEX IF NOT EXISTS idx_task_logs_task ON task_logs(task_id, recorded_at);"),
    ("idx_commands_device", "CREATE INDEX IF NOT EXISTS idx_commands_device ON commands(device_id, status, priority);"),
    ("idx_configurations_scope", "CREATE INDEX IF NOT EXISTS idx_configurations_scope ON configurations(scope, target_id);"),
];

#[instrument(skip(conn))]
pub async fn apply_schema(conn: &Connection) -> Result<(), DbError> {
    for (name, sql) in TABLES {
        debug!("applying table migration: {}", name);
        conn.execute(sql, ())
            .await
            .map_err(|e| DbError::ConnectionError(format!("migration {name} failed: {e}")))?;
    }
    for (name, sql) in INDEXES {
        debug!("applying index migration: {}", name);
        conn.execute(sql, ())
            .await
            .map_err(|e| DbError::ConnectionError(format!("migration {name} failed: {e}")))?;
    }
    info!("schema migration complete");
    Ok(())
}
