// [libs/infra/db/src/lib.rs]
/*!
 * Relational persistence adapter for the control plane: connection
 * management, schema migration, and one repository per aggregate.
 */

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::Store;
pub use errors::DbError;
pub use repositories::{
    CommandRepository, ConfigurationRepository, DeviceRepository, EnrollmentTokenRepository, NewTask, TaskRepository,
};
