use crate::domain::model::UserIdentity;
use crate::domain::ports::HostEnvironment;
use crate::utils::error::{DockerwError, Result};
use async_trait::async_trait;
use std::ffi::CStr;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use sysinfo::{CpuRefreshKind, RefreshKind, System};
use tokio::process::Command;

pub const X11_SOCKET_DIR: &str = "/tmp/.X11-unix";
pub const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// The machine dockerw runs on. Under sudo the invoking user is used.
#[derive(Debug, Clone)]
pub struct SystemHost {
    identity: UserIdentity,
    euid: u32,
}

impl SystemHost {
    pub fn detect() -> Result<Self> {
        let uid = id_from_env("SUDO_UID").unwrap_or_else(|| unsafe { libc::getuid() });
        let gid = id_from_env("SUDO_GID").unwrap_or_else(|| unsafe { libc::getgid() });
        let (name, home) = passwd_entry(uid).ok_or(DockerwError::UserLookup { uid })?;
        let euid = unsafe { libc::geteuid() };

        tracing::debug!("Host user {} ({}:{}), euid {}", name, uid, gid, euid);
        Ok(Self {
            identity: UserIdentity {
                uid,
                gid,
                name,
                home,
            },
            euid,
        })
    }
}

fn id_from_env(var: &str) -> Option<u32> {
    std::env::var(var).ok()?.trim().parse().ok()
}

fn passwd_entry(uid: u32) -> Option<(String, PathBuf)> {
    let mut buf = vec![0 as libc::c_char; 16 * 1024];
    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut result: *mut libc::passwd = std::ptr::null_mut();

    let rc = unsafe { libc::getpwuid_r(uid, &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result) };
    if rc != 0 || result.is_null() {
        return None;
    }

    // pw_name and pw_dir point into `buf`, which outlives these reads
    let name = unsafe { CStr::from_ptr(pwd.pw_name) }
        .to_string_lossy()
        .into_owned();
    let home = unsafe { CStr::from_ptr(pwd.pw_dir) }
        .to_string_lossy()
        .into_owned();
    Some((name, PathBuf::from(home)))
}

/// Authority file from `xauth info` output.
pub fn parse_xauth_info(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .find(|line| line.contains("Authority file"))
        .and_then(|line| line.split_whitespace().nth(2))
        .map(PathBuf::from)
}

/// `Intel(R) Core(TM)` style names use the real symbols.
pub fn format_cpu_summary(brand: &str, count: usize) -> String {
    let brand = brand.trim().replace("(R)", "®").replace("(TM)", "™");
    format!("{} ({} vCPU)", brand, count)
}

#[async_trait]
impl HostEnvironment for SystemHost {
    fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    fn is_root(&self) -> bool {
        self.euid == 0
    }

    fn hostname(&self) -> String {
        System::host_name().unwrap_or_else(|| "localhost".to_string())
    }

    fn cpu_summary(&self) -> String {
        let system = System::new_with_specifics(
            RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing()),
        );
        let cpus = system.cpus();
        let brand = cpus.first().map(|cpu| cpu.brand()).unwrap_or_default();
        format_cpu_summary(brand, cpus.len())
    }

    async fn xauthority_file(&self) -> Option<PathBuf> {
        // as root, ask on behalf of the user the container is made for
        let output = if self.is_root() {
            Command::new("su")
                .args([self.identity.name.as_str(), "-c", "xauth info"])
                .output()
                .await
        } else {
            Command::new("xauth").arg("info").output().await
        };

        match output {
            Ok(output) if output.status.success() => {
                parse_xauth_info(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                tracing::debug!("xauth info exited with {}", output.status);
                None
            }
            Err(e) => {
                tracing::debug!("xauth unavailable: {}", e);
                None
            }
        }
    }

    fn x11_socket_exists(&self) -> bool {
        Path::new(X11_SOCKET_DIR).exists()
    }

    fn docker_socket_gid(&self) -> Option<u32> {
        match std::fs::metadata(DOCKER_SOCKET) {
            Ok(metadata) => Some(metadata.gid()),
            Err(e) => {
                tracing::warn!("Cannot stat {}: {}", DOCKER_SOCKET, e);
                None
            }
        }
    }
}
