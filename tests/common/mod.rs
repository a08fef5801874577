#![allow(dead_code)]

use async_trait::async_trait;
use dockerw::domain::model::UserIdentity;
use dockerw::domain::ports::{DockerEngine, HostEnvironment};
use dockerw::Result;
use std::path::{Path, PathBuf};

pub const DOCKER_VERSION: &str = "Docker version 27.0.3, build 7d4bcd8";

pub const RUN_HELP: &str = "
Usage:  docker run [OPTIONS] IMAGE [COMMAND] [ARG...]

Create and run a new container from an image

Aliases:
  docker container run, docker run

Options:
      --add-host list                    Add a custom host-to-IP mapping (host:ip)
  -d, --detach                           Run container in background and print container ID
      --detach-keys string               Override the key sequence for detaching a container
      --disable-content-trust            Skip image verification (default true)
      --entrypoint string                Overwrite the default ENTRYPOINT of the image
  -e, --env list                         Set environment variables
  -h, --hostname string                  Container host name
      --init                             Run an init inside the container that forwards signals and reaps processes
  -i, --interactive                      Keep STDIN open even if not attached
      --name string                      Assign a name to the container
      --network network                  Connect a container to a network
      --privileged                       Give extended privileges to this container
      --rm                               Automatically remove the container when it exits
      --security-opt list                Security Options
      --sig-proxy                        Proxy received signals to the process (default true)
  -t, --tty                              Allocate a pseudo-TTY
  -u, --user string                      Username or UID (format: <name|uid>[:<group|gid>])
  -v, --volume list                      Bind mount a volume
  -w, --workdir string                   Working directory inside the container
";

/// Docker CLI answering from canned output.
pub struct FakeDocker;

#[async_trait]
impl DockerEngine for FakeDocker {
    async fn run_help(&self) -> Result<String> {
        Ok(RUN_HELP.to_string())
    }

    async fn version(&self) -> Result<String> {
        Ok(DOCKER_VERSION.to_string())
    }

    fn program(&self) -> &str {
        "docker"
    }
}

pub struct FakeHost {
    pub identity: UserIdentity,
    pub xauthority: Option<PathBuf>,
    pub x11_socket: bool,
    pub socket_gid: Option<u32>,
}

impl FakeHost {
    /// User `tester` (1000:1000) living in `home`, without X11.
    pub fn new(home: &Path) -> Self {
        Self {
            identity: UserIdentity {
                uid: 1000,
                gid: 1000,
                name: "tester".to_string(),
                home: home.to_path_buf(),
            },
            xauthority: None,
            x11_socket: false,
            socket_gid: Some(999),
        }
    }
}

#[async_trait]
impl HostEnvironment for FakeHost {
    fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    fn is_root(&self) -> bool {
        false
    }

    fn hostname(&self) -> String {
        "devbox".to_string()
    }

    fn cpu_summary(&self) -> String {
        "Test CPU (4 vCPU)".to_string()
    }

    async fn xauthority_file(&self) -> Option<PathBuf> {
        self.xauthority.clone()
    }

    fn x11_socket_exists(&self) -> bool {
        self.x11_socket
    }

    fn docker_socket_gid(&self) -> Option<u32> {
        self.socket_gid
    }
}

pub fn args(words: &[&str]) -> Vec<String> {
    words.iter().map(|word| word.to_string()).collect()
}

/// Writes `.dockerw/defaults.toml` under `project`.
pub fn write_defaults(project: &Path, content: &str) {
    let dir = project.join(".dockerw");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("defaults.toml"), content).unwrap();
}
