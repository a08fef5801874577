use crate::domain::model::UserIdentity;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// Queries against the docker CLI.
#[async_trait]
pub trait DockerEngine: Send + Sync {
    /// Raw output of `docker run --help`.
    async fn run_help(&self) -> Result<String>;
    /// Output of `docker --version`, trailing newline trimmed.
    async fn version(&self) -> Result<String>;
    /// Program name to exec.
    fn program(&self) -> &str;
}

/// Facts about the host the container is started from.
#[async_trait]
pub trait HostEnvironment: Send + Sync {
    fn identity(&self) -> &UserIdentity;
    fn is_root(&self) -> bool;
    fn hostname(&self) -> String;
    /// e.g. `Intel® Core™ i7 (8 vCPU)`.
    fn cpu_summary(&self) -> String;
    /// Authority file reported by `xauth info`, if X11 auth is available.
    async fn xauthority_file(&self) -> Option<PathBuf>;
    fn x11_socket_exists(&self) -> bool;
    /// Group owning `/var/run/docker.sock`.
    fn docker_socket_gid(&self) -> Option<u32>;
}
