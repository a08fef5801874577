pub mod expand;
pub mod flags;
pub mod image;
pub mod parser;
pub mod run;
pub mod venv;
pub mod volumes;

pub use crate::domain::model::{ParsedArgs, RunOutcome};
pub use crate::domain::ports::{DockerEngine, HostEnvironment};
pub use crate::utils::error::Result;
