use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Flags handled by dockerw itself rather than forwarded to `docker run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DockerwFlag {
    Help,
    Version,
    Load,
    ImageDefault,
    Defaults,
    X11,
    Venv,
    LoginShell,
    Dood,
    Print,
    PrintDefaults,
    Copy,
    PromptBanner,
}

impl DockerwFlag {
    /// Registration order; also the order expansions run in.
    pub const ALL: [DockerwFlag; 13] = [
        DockerwFlag::Help,
        DockerwFlag::Version,
        DockerwFlag::Load,
        DockerwFlag::ImageDefault,
        DockerwFlag::Defaults,
        DockerwFlag::X11,
        DockerwFlag::Venv,
        DockerwFlag::LoginShell,
        DockerwFlag::Dood,
        DockerwFlag::Print,
        DockerwFlag::PrintDefaults,
        DockerwFlag::Copy,
        DockerwFlag::PromptBanner,
    ];

    pub fn long(&self) -> &'static str {
        match self {
            DockerwFlag::Help => "help",
            DockerwFlag::Version => "version",
            DockerwFlag::Load => "load",
            DockerwFlag::ImageDefault => "image-default",
            DockerwFlag::Defaults => "defaults",
            DockerwFlag::X11 => "x11",
            DockerwFlag::Venv => "venv",
            DockerwFlag::LoginShell => "login-shell",
            DockerwFlag::Dood => "dood",
            DockerwFlag::Print => "print",
            DockerwFlag::PrintDefaults => "print-defaults",
            DockerwFlag::Copy => "copy",
            DockerwFlag::PromptBanner => "prompt-banner",
        }
    }

    pub fn kind(&self) -> FlagKind {
        match self {
            DockerwFlag::Load | DockerwFlag::ImageDefault | DockerwFlag::PromptBanner => {
                FlagKind::Value
            }
            DockerwFlag::Copy => FlagKind::List,
            _ => FlagKind::Switch,
        }
    }

    /// Help text; `None` hides the flag from the dockerw options listing.
    pub fn help(&self) -> Option<&'static str> {
        match self {
            DockerwFlag::Help | DockerwFlag::Version => None,
            DockerwFlag::Load => Some("Load dockerw project"),
            DockerwFlag::ImageDefault => Some("Default image if not specified"),
            DockerwFlag::Defaults => Some("Enable dockerw default args"),
            DockerwFlag::X11 => Some("Enable x11 support if possible"),
            DockerwFlag::Venv => Some("Enable user creation"),
            DockerwFlag::LoginShell => {
                Some("Enable login shell for venv (venv must be enabled)")
            }
            DockerwFlag::Dood => Some("Enable Docker-outside-of-Docker"),
            DockerwFlag::Print => Some("Print dockerw generated command"),
            DockerwFlag::PrintDefaults => {
                Some("Print dockerw args generated by \"--defaults\" flag")
            }
            DockerwFlag::Copy => Some("Bind mount and copy a volume (venv must be enabled)"),
            DockerwFlag::PromptBanner => Some(
                "CLI prompt banner to display. Default is docker image name (venv must be enabled)",
            ),
        }
    }

    pub fn value_name(&self) -> &'static str {
        match self.kind() {
            FlagKind::List => "list",
            _ => "string",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    /// Takes no value.
    Switch,
    /// Takes one value; a repeated flag keeps the last one.
    Value,
    /// Takes one value per occurrence and accumulates them.
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagOwner {
    Dockerw(DockerwFlag),
    Docker,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSpec {
    pub long: String,
    pub short: Option<char>,
    pub kind: FlagKind,
    pub owner: FlagOwner,
}

impl FlagSpec {
    pub fn dockerw_flag(&self) -> Option<DockerwFlag> {
        match self.owner {
            FlagOwner::Dockerw(flag) => Some(flag),
            FlagOwner::Docker => None,
        }
    }
}

/// Index of a flag in its `FlagTable`; ordering follows registration.
pub type FlagId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Switch,
    Value(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    pub options: BTreeMap<FlagId, OptionValue>,
    /// Image and command, starting at the first positional token or a literal `--`.
    pub image_cmd: Vec<String>,
}

impl ParsedArgs {
    pub fn contains(&self, id: FlagId) -> bool {
        self.options.contains_key(&id)
    }

    pub fn value(&self, id: FlagId) -> Option<&str> {
        match self.options.get(&id) {
            Some(OptionValue::Value(value)) => Some(value),
            _ => None,
        }
    }

    pub fn list(&self, id: FlagId) -> &[String] {
        match self.options.get(&id) {
            Some(OptionValue::List(items)) => items,
            _ => &[],
        }
    }
}

/// State set by expansions and consumed once the expansion loop has settled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostOptions {
    pub print: bool,
    pub print_defaults: Option<Vec<String>>,
    pub login_shell: bool,
    pub dood: bool,
    pub prompt_banner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub registry: String,
    pub name: String,
    pub tag: String,
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.name, self.tag)
    }
}

/// The host user a venv recreates inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub uid: u32,
    pub gid: u32,
    pub name: String,
    pub home: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl DockerInvocation {
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Text for stdout; nothing is executed.
    Print(String),
    Exec(DockerInvocation),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dockerw_flag_kinds() {
        assert_eq!(DockerwFlag::Copy.kind(), FlagKind::List);
        assert_eq!(DockerwFlag::Load.kind(), FlagKind::Value);
        assert_eq!(DockerwFlag::Venv.kind(), FlagKind::Switch);
        assert!(DockerwFlag::Help.help().is_none());
    }

    #[test]
    fn test_invocation_command_line() {
        let invocation = DockerInvocation {
            program: "docker".to_string(),
            args: vec!["run".to_string(), "--rm".to_string(), "docker.io/alpine:latest".to_string()],
            working_dir: PathBuf::from("/"),
        };
        assert_eq!(invocation.command_line(), "docker run --rm docker.io/alpine:latest");
    }
}
