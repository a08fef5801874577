use crate::domain::model::DockerInvocation;
use crate::domain::ports::DockerEngine;
use crate::utils::error::{DockerwError, Result};
use async_trait::async_trait;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use tokio::process::Command;

/// The `docker` executable found on `PATH`.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl DockerCli {
    pub fn new() -> Self {
        Self::with_program("docker")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn output(&self, args: &[&str]) -> Result<String> {
        tracing::debug!("Running {} {}", self.program, args.join(" "));
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| DockerwError::DockerUnavailable {
                message: format!("failed to run {}: {}", self.program, e),
            })?;

        if !output.status.success() {
            return Err(DockerwError::DockerUnavailable {
                message: format!(
                    "'{} {}' exited with {}: {}",
                    self.program,
                    args.join(" "),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DockerEngine for DockerCli {
    async fn run_help(&self) -> Result<String> {
        self.output(&["run", "--help"]).await
    }

    async fn version(&self) -> Result<String> {
        Ok(self.output(&["--version"]).await?.trim_end().to_string())
    }

    fn program(&self) -> &str {
        &self.program
    }
}

/// Invocation forwarding `args` to docker untouched.
pub fn passthrough(docker: &dyn DockerEngine, args: Vec<String>, working_dir: PathBuf) -> DockerInvocation {
    DockerInvocation {
        program: docker.program().to_string(),
        args,
        working_dir,
    }
}

/// Replaces the current process with docker. Only returns on failure.
pub fn exec_docker(invocation: &DockerInvocation) -> DockerwError {
    tracing::debug!(
        "exec {} in {}",
        invocation.command_line(),
        invocation.working_dir.display()
    );
    let err = std::process::Command::new(&invocation.program)
        .args(&invocation.args)
        .current_dir(&invocation.working_dir)
        .exec();
    DockerwError::DockerUnavailable {
        message: format!("failed to exec {}: {}", invocation.program, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let docker = DockerCli::with_program("dockerw-test-no-such-binary");
        let err = docker.run_help().await.unwrap_err();
        assert!(matches!(err, DockerwError::DockerUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_failing_program_reports_status() {
        // `false` exits non-zero even for --version
        let docker = DockerCli::with_program("false");
        assert!(docker.version().await.is_err());
    }

    #[test]
    fn test_passthrough_keeps_arguments() {
        let docker = DockerCli::new();
        let invocation = passthrough(
            &docker,
            vec!["ps".to_string(), "-a".to_string()],
            PathBuf::from("/"),
        );
        assert_eq!(invocation.command_line(), "docker ps -a");
    }
}
