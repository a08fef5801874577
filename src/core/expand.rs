use crate::config::defaults_file::DefaultsFile;
use crate::core::flags::FlagTable;
use crate::core::parser::quote_word;
use crate::core::volumes::{expand_tilde, resolve_path, rewrite, volume_arg};
use crate::core::venv::VENV_RC_PATH;
use crate::domain::model::{DockerwFlag, ParsedArgs, PostOptions};
use crate::domain::ports::{DockerEngine, HostEnvironment};
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use std::path::Path;

/// Mounted into the container user's home by `--defaults` when present.
const DEFAULT_VOLUMES: [&str; 5] = [
    "~/.bash_history",
    "~/.vscode",
    "~/.emacs",
    "~/.emacs.d",
    "~/.vimrc",
];
/// Copied into the container user's home by `--defaults` when present.
const DEFAULT_COPIES: [&str; 2] = ["~/.gitconfig", "~/.ssh"];

const X11_SOCKET_VOLUME: &str = "/tmp/.X11-unix:/tmp/.X11-unix:ro";
const DOCKER_SOCKET_VOLUME: &str = "/var/run/docker.sock:/var/run/docker.sock";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    /// Argument strings to parse and merge; each may hold several words.
    Args(Vec<String>),
    /// Stop and print this text.
    Terminal(String),
}

/// Expands dockerw flags into docker arguments.
pub struct Expander<'a> {
    pub docker: &'a dyn DockerEngine,
    pub host: &'a dyn HostEnvironment,
    pub table: &'a FlagTable,
    /// Raw `docker run --help` output.
    pub docker_help: &'a str,
    /// Directory dockerw was started from; relative `--load` paths resolve here.
    pub launch_dir: &'a Path,
    /// Directory docker will run in.
    pub cwd: &'a Path,
}

impl Expander<'_> {
    pub async fn expand(
        &self,
        flag: DockerwFlag,
        parsed: &mut ParsedArgs,
        post: &mut PostOptions,
    ) -> Result<Expansion> {
        let id = self.table.id_of(flag);
        let args = match flag {
            DockerwFlag::Help => return Ok(Expansion::Terminal(self.help_text())),
            DockerwFlag::Version => return Ok(Expansion::Terminal(self.version_text().await)),
            DockerwFlag::Load => {
                let value = parsed.value(id).unwrap_or_default();
                self.load_args(value)?
            }
            DockerwFlag::ImageDefault => {
                let needs_image = parsed
                    .image_cmd
                    .first()
                    .map_or(true, |first| first == "--");
                if needs_image {
                    if let Some(image) = parsed.value(id).map(str::to_string) {
                        tracing::debug!("No image given, using default {}", image);
                        parsed.image_cmd.insert(0, image);
                    }
                }
                Vec::new()
            }
            DockerwFlag::Defaults => self.defaults_args(parsed),
            DockerwFlag::X11 => self.x11_args().await,
            DockerwFlag::Venv => {
                if self.docker_flag_given(parsed, "user") {
                    tracing::warn!("--user is set, not enabling venv");
                    Vec::new()
                } else {
                    vec![
                        "--user=root".to_string(),
                        "--entrypoint=sh".to_string(),
                        "-e=DOCKERW_VENV=1".to_string(),
                        format!("-e=ENV={}", VENV_RC_PATH),
                    ]
                }
            }
            DockerwFlag::LoginShell => {
                post.login_shell = true;
                Vec::new()
            }
            DockerwFlag::Dood => {
                post.dood = true;
                vec![format!("-v={}", DOCKER_SOCKET_VOLUME)]
            }
            DockerwFlag::Print => {
                post.print = true;
                Vec::new()
            }
            DockerwFlag::PrintDefaults => {
                post.print_defaults = Some(self.defaults_args(parsed));
                Vec::new()
            }
            DockerwFlag::Copy => parsed
                .list(id)
                .iter()
                .map(|spec| {
                    let staged = rewrite(spec, self.host.identity(), self.cwd, true);
                    format!("-v {}", quote_word(&staged))
                })
                .collect(),
            DockerwFlag::PromptBanner => {
                post.prompt_banner = parsed.value(id).map(str::to_string);
                Vec::new()
            }
        };
        Ok(Expansion::Args(args))
    }

    fn docker_flag_given(&self, parsed: &ParsedArgs, long: &str) -> bool {
        self.table
            .lookup_long(long)
            .is_some_and(|id| parsed.contains(id))
    }

    fn help_text(&self) -> String {
        format!(
            "{}\nDockerw Options:\n{}",
            self.docker_help.replace("docker run", "dockerw"),
            self.table.dockerw_help()
        )
    }

    async fn version_text(&self) -> String {
        let mut text = format!("Dockerw version {}", env!("CARGO_PKG_VERSION"));
        match self.docker.version().await {
            Ok(version) => {
                text.push('\n');
                text.push_str(&version);
            }
            Err(e) => tracing::warn!("Could not query docker version: {}", e),
        }
        text
    }

    fn load_args(&self, project: &str) -> Result<Vec<String>> {
        let project_dir = resolve_path(
            &expand_tilde(project, &self.host.identity().home),
            self.launch_dir,
        );
        let Some(defaults) = DefaultsFile::load_from_project(&project_dir)? else {
            tracing::debug!("No defaults file in {}", project_dir.display());
            return Ok(Vec::new());
        };
        defaults.validate()?;
        tracing::info!(
            "Loaded {} defaults from {}",
            defaults.dockerw_defaults.len() + defaults.volumes.len(),
            project_dir.display()
        );
        Ok(defaults.args(self.host.identity(), self.cwd))
    }

    /// The arguments `--defaults` stands for.
    pub fn defaults_args(&self, parsed: &ParsedArgs) -> Vec<String> {
        let identity = self.host.identity();
        let mut defaults = vec![
            "-it --venv --x11 --rm --init --privileged --network host --security-opt seccomp=unconfined"
                .to_string(),
            format!(
                "--dood --detach-keys=ctrl-q,ctrl-q --hostname {} -e TERM=xterm-256color",
                quote_word(&self.host.hostname())
            ),
        ];

        for (copy, paths) in [(false, &DEFAULT_VOLUMES[..]), (true, &DEFAULT_COPIES[..])] {
            defaults.extend(
                paths
                    .iter()
                    .filter_map(|path| volume_arg(path, None, copy, identity, self.cwd)),
            );
        }

        if !self.docker_flag_given(parsed, "workdir") {
            defaults.push("-w /app".to_string());
            defaults.push(format!(
                "-v {}",
                quote_word(&format!("{}:/app", self.cwd.display()))
            ));
        }
        defaults
    }

    async fn x11_args(&self) -> Vec<String> {
        let Some(authority) = self.host.xauthority_file().await else {
            tracing::info!("No X authority available, skipping x11");
            return Vec::new();
        };
        if !self.host.x11_socket_exists() {
            tracing::info!("No X11 socket, skipping x11");
            return Vec::new();
        }
        vec![
            "-e=DISPLAY".to_string(),
            format!("-v={}", X11_SOCKET_VOLUME),
            format!(
                "-v={}",
                quote_word(&format!("{}:~/.Xauthority:ro", authority.display()))
            ),
        ]
    }
}
