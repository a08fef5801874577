use crate::config::defaults_file::{find_nearest_defaults_file, project_root};
use crate::core::expand::{Expander, Expansion};
use crate::core::flags::FlagTable;
use crate::core::image::parse_image_name;
use crate::core::parser::{merge, parse, render, split_all};
use crate::core::venv::{persist_script, user_command, VenvScript, SCRIPT_DIR, VENV_COPY_PATH};
use crate::core::volumes::{expand_tilde, resolve_path, rewrite};
use crate::domain::model::{
    DockerInvocation, DockerwFlag, FlagId, OptionValue, ParsedArgs, PostOptions, RunOutcome,
};
use crate::domain::ports::{DockerEngine, HostEnvironment};
use crate::utils::error::{DockerwError, Result};
use std::path::{Path, PathBuf};

/// Upper bound on expansion passes; each pass expands the dockerw flags
/// present at its start, and expansions may introduce further flags.
const MAX_EXPANSION_PASSES: usize = 16;

/// Marker the venv expansion leaves in the rendered arguments.
const VENV_ENV_ARG: &str = "--env=DOCKERW_VENV=1";

/// Turns `dockerw run` arguments into a `docker run` invocation.
pub struct RunEngine<'a> {
    docker: &'a dyn DockerEngine,
    host: &'a dyn HostEnvironment,
    launch_dir: PathBuf,
    script_dir: PathBuf,
}

impl<'a> RunEngine<'a> {
    pub fn new(
        docker: &'a dyn DockerEngine,
        host: &'a dyn HostEnvironment,
        launch_dir: PathBuf,
    ) -> Self {
        Self {
            docker,
            host,
            launch_dir,
            script_dir: PathBuf::from(SCRIPT_DIR),
        }
    }

    /// Where venv entrypoint scripts are written; mounted at the same path.
    pub fn with_script_dir(mut self, script_dir: PathBuf) -> Self {
        self.script_dir = script_dir;
        self
    }

    pub async fn run(&self, args: Vec<String>) -> Result<RunOutcome> {
        let docker_help = self.docker.run_help().await?;
        let mut table = FlagTable::with_dockerw_flags();
        table.register_docker_help(&docker_help)?;

        let (args, cwd) = self.resolve_project(args, &table)?;
        tracing::debug!("Working directory: {}", cwd.display());

        let expander = Expander {
            docker: self.docker,
            host: self.host,
            table: &table,
            docker_help: &docker_help,
            launch_dir: &self.launch_dir,
            cwd: &cwd,
        };

        let (mut docker_args, mut parsed, post) =
            match self.expand_all(args, &table, &expander, &cwd).await? {
                Settled::Done(args, parsed, post) => (args, parsed, post),
                Settled::Terminal(text) => return Ok(RunOutcome::Print(text)),
            };

        let image_name = match parsed.image_cmd.first() {
            Some(first) if first != "--" => first.clone(),
            _ => return Err(DockerwError::MissingImage),
        };
        let image = parse_image_name(&image_name)?;
        let image_full = image.to_string();
        parsed.image_cmd[0] = image_full.clone();

        if post.print {
            let invocation = self.invocation(&docker_args, &parsed.image_cmd, &cwd);
            return Ok(RunOutcome::Print(invocation.command_line()));
        }
        if let Some(defaults) = post.print_defaults {
            return Ok(RunOutcome::Print(defaults.join(" ")));
        }

        let mut image_cmd = parsed.image_cmd;
        if docker_args.iter().any(|arg| arg == VENV_ENV_ARG) {
            docker_args.push(format!("--env=DOCKERW_VENV_IMG={}", image_full));
            docker_args.push(format!("--env=DOCKERW_VENV_IMG_REPO={}", image.registry));
            docker_args.push(format!("--env=DOCKERW_VENV_IMG_NAME={}", image.name));
            docker_args.push(format!("--env=DOCKERW_VENV_IMG_TAG={}", image.tag));

            let copy_destinations = docker_args
                .iter()
                .filter_map(|arg| arg.strip_prefix("--volume="))
                .filter_map(|spec| spec.split(':').nth(1))
                .filter(|dest| dest.starts_with(VENV_COPY_PATH))
                .map(str::to_string)
                .collect();

            let venv = VenvScript {
                identity: self.host.identity(),
                hostname: self.host.hostname(),
                cpu: self.host.cpu_summary(),
                prompt_banner: post.prompt_banner.clone().unwrap_or_else(|| image_full.clone()),
                dood_gid: if post.dood {
                    self.host.docker_socket_gid()
                } else {
                    None
                },
                copy_destinations,
                command: user_command(&image_cmd[1..]),
            };
            let script = persist_script(&self.script_dir, |path| venv.render(path))?;
            tracing::info!("venv entrypoint at {}", script.display());

            docker_args.push(format!(
                "--volume={}:{}",
                self.script_dir.display(),
                self.script_dir.display()
            ));
            image_cmd = vec![image_full];
            if post.login_shell {
                image_cmd.push("-l".to_string());
            }
            image_cmd.push(script.display().to_string());
        }

        Ok(RunOutcome::Exec(self.invocation(&docker_args, &image_cmd, &cwd)))
    }

    /// An explicit `--load` moves docker into that directory; otherwise the
    /// nearest project with a defaults file is loaded implicitly.
    fn resolve_project(&self, mut args: Vec<String>, table: &FlagTable) -> Result<(Vec<String>, PathBuf)> {
        let parsed = parse(&args, table)?;

        if let Some(load) = parsed.value(table.id_of(DockerwFlag::Load)) {
            let dir = resolve_path(
                &expand_tilde(load, &self.host.identity().home),
                &self.launch_dir,
            );
            if !dir.is_dir() {
                return Err(DockerwError::LoadPathNotFound {
                    path: load.to_string(),
                });
            }
            return Ok((args, dir));
        }

        if let Some(defaults_file) = find_nearest_defaults_file(&self.launch_dir) {
            if let Some(root) = project_root(&defaults_file) {
                tracing::info!("Loading dockerw project {}", root.display());
                args.insert(0, format!("--load={}", root.display()));
            }
        }
        Ok((args, self.launch_dir.clone()))
    }

    async fn expand_all(
        &self,
        mut args: Vec<String>,
        table: &FlagTable,
        expander: &Expander<'_>,
        cwd: &Path,
    ) -> Result<Settled> {
        let mut post = PostOptions::default();

        for pass in 0..MAX_EXPANSION_PASSES {
            let mut parsed = parse(&args, table)?;
            let pending: Vec<(FlagId, DockerwFlag)> = parsed
                .options
                .keys()
                .filter_map(|id| table.spec(*id).dockerw_flag().map(|flag| (*id, flag)))
                .collect();

            for (id, flag) in pending {
                let new_args = match expander.expand(flag, &mut parsed, &mut post).await? {
                    Expansion::Terminal(text) => return Ok(Settled::Terminal(text)),
                    Expansion::Args(new_args) => new_args,
                };
                let expanded = parse(&split_all(&new_args)?, table)?;
                if !expanded.image_cmd.is_empty() {
                    return Err(DockerwError::ExpansionProducedImage {
                        flag: flag.long().to_string(),
                        tokens: expanded.image_cmd.join(" "),
                    });
                }
                tracing::debug!("--{} expanded to {:?}", flag.long(), new_args);
                parsed.options.remove(&id);
                merge(&mut parsed, expanded);
            }

            self.rewrite_volumes(&mut parsed, table, cwd);
            let unsettled = parsed
                .options
                .keys()
                .any(|id| table.spec(*id).dockerw_flag().is_some());
            args = render(&parsed, table);

            if !unsettled {
                tracing::debug!("Expansion settled after {} passes", pass + 1);
                return Ok(Settled::Done(args, parsed, post));
            }
            args.extend(parsed.image_cmd.iter().cloned());
        }

        Err(DockerwError::ExpansionLoop {
            iterations: MAX_EXPANSION_PASSES,
        })
    }

    fn rewrite_volumes(&self, parsed: &mut ParsedArgs, table: &FlagTable, cwd: &Path) {
        let Some(volume_id) = table.lookup_long("volume") else {
            return;
        };
        if let Some(OptionValue::List(items)) = parsed.options.get_mut(&volume_id) {
            for item in items.iter_mut() {
                *item = rewrite(item, self.host.identity(), cwd, false);
            }
        }
    }

    fn invocation(&self, docker_args: &[String], image_cmd: &[String], cwd: &Path) -> DockerInvocation {
        let mut args = vec!["run".to_string()];
        args.extend(docker_args.iter().cloned());
        args.extend(image_cmd.iter().cloned());
        DockerInvocation {
            program: self.docker.program().to_string(),
            args,
            working_dir: cwd.to_path_buf(),
        }
    }
}

enum Settled {
    Done(Vec<String>, ParsedArgs, PostOptions),
    Terminal(String),
}
