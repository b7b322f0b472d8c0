pub mod schema;

pub use schema::{
    ApprovalConfig, Config, LoggingConfig, SECRET_ENV_PREFIX, SandboxSection, SchedulerSection,
};
