// [libs/infra/db/src/client.rs]
/*!
 * Connection client for the relational store. Detects a local file, a
 * remote libSQL/Turso URL, or an in-memory URL and applies the schema
 * migration before handing back a connectable handle.
 *
 * In-memory databases need a persistence anchor: libSQL drops an
 * in-memory database the instant its last connection closes, so a
 * bare `connect()` per request would wipe the schema between calls.
 * Opening one connection up front and holding it for the client's
 * lifetime keeps the schema alive for every later `get_connection`.
 */

use std::sync::Arc;

use libsql::{Builder, Connection, Database};
use tracing::{error, info, instrument};

use crate::errors::DbError;
use crate::schema::apply_schema;

#[derive(Clone)]
pub struct Store {
    driver: Arc<Database>,
    _memory_anchor: Option<Arc<Connection>>,
}

impl Store {
    #[instrument(skip(auth_token))]
    pub async fn connect(url: &str, auth_token: Option<String>) -> Result<Self, DbError> {
        if url.is_empty() {
            return Err(DbError::ConfigurationError("DATABASE_URL is empty".into()));
        }

        info!("connecting to relational store at {}", url);

        let is_remote = url.starts_with("libsql://") || url.starts_with("https://");
        let is_memory = url.contains(":memory:") || url.contains("mode=memory");

        let database = if is_remote {
            let token = auth_token
                .ok_or_else(|| DbError::ConfigurationError("remote store requires an auth token".into()))?;
            Builder::new_remote(url.to_string(), token).build().await
        } else {
            Builder::new_local(url).build().await
        }
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;

        let driver = Arc::new(database);

        let memory_anchor = if is_memory {
            let anchor = driver
                .connect()
                .map_err(|e| DbError::ConnectionError(format!("anchor connection failed: {e}")))?;
            apply_schema(&anchor).await?;
            info!("in-memory store anchored and schema applied");
            Some(Arc::new(anchor))
        } else {
            let bootstrap = driver
                .connect()
                .map_err(|e| DbError::ConnectionError(format!("bootstrap connection failed: {e}")))?;
            apply_schema(&bootstrap).await?;
            None
        };

        Ok(Self { driver, _memory_anchor: memory_anchor })
    }

    pub fn get_connection(&self) -> Result<Connection, DbError> {
        self.driver.connect().map_err(|e| {
            error!("failed to allocate a connection: {}", e);
            DbError::ConnectionError(e.to_string())
        })
    }
}
