// [libs/infra/db/src/errors.rs]
/*!
 * Error catalog for the relational persistence layer.
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("database connection failed: {0}")]
    ConnectionError(String),

    #[error("database configuration invalid: {0}")]
    ConfigurationError(String),

    #[error("query rejected: {0}")]
    QueryError(#[from] libsql::Error),

    #[error("row mapping failed: {0}")]
    MappingError(String),

    #[error("device not found")]
    DeviceNotFound,

    #[error("task not found")]
    TaskNotFound,

    #[error("enrollment token not found")]
    TokenNotFound,

    #[error("command not found")]
    CommandNotFound,

    #[error("configuration not found")]
    ConfigNotFound,

    #[error("transaction failed: {0}")]
    TransactionError(String),
}
