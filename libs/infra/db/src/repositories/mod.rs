// [libs/infra/db/src/repositories/mod.rs]
pub mod command;
pub mod config;
pub mod device;
pub mod enrollment_token;
pub mod task;

pub use command::CommandRepository;
pub use config::ConfigurationRepository;
pub use device::DeviceRepository;
pub use enrollment_token::EnrollmentTokenRepository;
pub use task::{NewTask, TaskRepository};
