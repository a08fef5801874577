pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::{DockerCli, SystemHost};
pub use crate::config::{defaults_file::DefaultsFile, CliConfig};
pub use crate::core::run::RunEngine;
pub use crate::domain::model::{DockerInvocation, RunOutcome};
pub use crate::utils::error::{DockerwError, Result};
