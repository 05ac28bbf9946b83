// [libs/domain/models/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS DE DATOS DEL CONTROL PLANE
 * =================================================================
 */

pub mod command;
pub mod config;
pub mod device;
pub mod enrollment;
pub mod envelope;
pub mod error_code;
pub mod heartbeat;
pub mod task;

pub use command::{Command, CommandPriority, CommandStatus, CommandType};
pub use config::{ConfigScope, ConfigurationRow};
pub use device::{Device, DeviceStatus, Platform};
pub use enrollment::{EnrollRequest, EnrollResponse, EnrollmentToken};
pub use envelope::{ErrorResponse, OkResponse};
pub use error_code::ErrorCode;
pub use heartbeat::{HeartbeatRequest, HeartbeatResponse, SystemInfo};
pub use task::{
    CancelDelivery, DesiredState, Task, TaskDelivery, TaskReport, TaskState, TaskStateValue, TaskType,
};
