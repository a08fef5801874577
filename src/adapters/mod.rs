// Adapters layer: concrete implementations for external systems (docker CLI, host OS).

pub mod docker;
pub mod host;

pub use docker::{exec_docker, passthrough, DockerCli};
pub use host::SystemHost;
