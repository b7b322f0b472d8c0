#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod sandbox;
pub mod scheduler;
pub mod scripts;
pub mod security;

pub use config::Config;
pub use error::{Error, Result};
pub use sandbox::{ExecutionResult, Sandbox, SandboxConfig, Value};
pub use scheduler::{Schedule, Scheduler};
pub use scripts::{Script, ScriptLoader, ScriptRunner};
pub use security::SecretProvider;
