pub mod defaults_file;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};

const VERBOSE_FLAG: &str = "--dockerw-verbose";

/// Entry arguments. Everything is forwarded to docker, so the only option of
/// our own is read from the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "dockerw")]
#[command(about = "Docker run wrapper. Provides a super-set of docker run capabilities.")]
#[command(disable_help_flag = true, disable_version_flag = true)]
pub struct CliConfig {
    /// Enable debug logging
    #[arg(
        long = "dockerw-verbose",
        env = "DOCKERW_VERBOSE",
        hide = true,
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub verbose: bool,

    /// Docker command line; `run` enables the dockerw options
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl CliConfig {
    /// Parses `argv`, keeping the docker arguments exactly as given. clap
    /// would swallow a leading `--`, which docker must still see.
    pub fn try_from_argv<I, T>(argv: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        let mut config = Self::try_parse_from(&argv)?;

        let forwarded = argv
            .iter()
            .skip(1)
            .skip_while(|arg| *arg == VERBOSE_FLAG || arg.starts_with("--dockerw-verbose="));
        config.args = forwarded.cloned().collect();
        Ok(config)
    }

    pub fn from_env_args() -> Self {
        Self::try_from_argv(std::env::args()).unwrap_or_else(|e| e.exit())
    }

    pub fn is_run(&self) -> bool {
        self.args.first().is_some_and(|arg| arg == "run")
    }

    /// Arguments after `run`.
    pub fn run_args(&self) -> &[String] {
        if self.is_run() {
            &self.args[1..]
        } else {
            &[]
        }
    }
}
