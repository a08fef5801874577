use crate::domain::model::{DockerwFlag, FlagId, FlagKind, FlagOwner, FlagSpec};
use crate::utils::error::Result;
use clap::{Arg, ArgAction, Command};
use regex::Regex;
use std::collections::HashMap;

/// Matches one option line of `docker run --help`, e.g.
/// `  -e, --env list       Set environment variables`.
const HELP_LINE_PATTERN: &str =
    r"^\s*(?P<short>-\w)?,?\s*(?P<long>--[^\s]+)\s+(?P<val_type>[^\s]+)?\s{4,}(?P<help>\w+.*)";

/// Every flag `dockerw run` understands, dockerw's own first.
#[derive(Debug, Clone, Default)]
pub struct FlagTable {
    specs: Vec<FlagSpec>,
    by_long: HashMap<String, FlagId>,
    by_short: HashMap<char, FlagId>,
}

impl FlagTable {
    pub fn with_dockerw_flags() -> Self {
        let mut table = Self::default();
        for flag in DockerwFlag::ALL {
            table.register(FlagSpec {
                long: flag.long().to_string(),
                short: None,
                kind: flag.kind(),
                owner: FlagOwner::Dockerw(flag),
            });
        }
        table
    }

    /// Adds a flag unless its long name is already taken. Returns its id.
    pub fn register(&mut self, spec: FlagSpec) -> Option<FlagId> {
        if self.by_long.contains_key(&spec.long) {
            return None;
        }
        let id = self.specs.len();
        self.by_long.insert(spec.long.clone(), id);
        if let Some(short) = spec.short {
            self.by_short.entry(short).or_insert(id);
        }
        self.specs.push(spec);
        Some(id)
    }

    /// Registers the docker flags listed in `docker run --help` output.
    /// Returns how many were added.
    pub fn register_docker_help(&mut self, help: &str) -> Result<usize> {
        let re = Regex::new(HELP_LINE_PATTERN)?;
        let mut added = 0;

        for line in help.lines() {
            let Some(caps) = re.captures(line) else {
                continue;
            };
            let long = caps["long"].trim_start_matches("--").to_string();
            let short = caps
                .name("short")
                .and_then(|m| m.as_str().chars().nth(1));
            let kind = match caps.name("val_type").map(|m| m.as_str()) {
                Some("list") => FlagKind::List,
                Some(_) => FlagKind::Value,
                None => FlagKind::Switch,
            };

            if self
                .register(FlagSpec {
                    long,
                    short,
                    kind,
                    owner: FlagOwner::Docker,
                })
                .is_some()
            {
                added += 1;
            }
        }

        tracing::debug!("Registered {} docker run flags", added);
        Ok(added)
    }

    pub fn spec(&self, id: FlagId) -> &FlagSpec {
        &self.specs[id]
    }

    pub fn lookup_long(&self, long: &str) -> Option<FlagId> {
        self.by_long.get(long).copied()
    }

    pub fn lookup_short(&self, short: char) -> Option<FlagId> {
        self.by_short.get(&short).copied()
    }

    pub fn id_of(&self, flag: DockerwFlag) -> FlagId {
        // dockerw flags are registered first, in `DockerwFlag::ALL` order
        DockerwFlag::ALL
            .iter()
            .position(|f| *f == flag)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// The "Dockerw Options:" section of `dockerw run --help`.
    pub fn dockerw_help(&self) -> String {
        let mut command = Command::new("dockerw")
            .disable_help_flag(true)
            .disable_version_flag(true);

        for flag in DockerwFlag::ALL {
            let Some(help) = flag.help() else {
                continue;
            };
            let arg = Arg::new(flag.long()).long(flag.long()).help(help);
            let arg = match flag.kind() {
                FlagKind::Switch => arg.action(ArgAction::SetTrue),
                FlagKind::Value => arg.value_name(flag.value_name()).action(ArgAction::Set),
                FlagKind::List => arg.value_name(flag.value_name()).action(ArgAction::Append),
            };
            command = command.arg(arg);
        }

        let rendered = command.render_help().to_string();
        rendered
            .rsplit("Options:")
            .next()
            .unwrap_or_default()
            .trim_start_matches('\n')
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELP: &str = "
Usage:  docker run [OPTIONS] IMAGE [COMMAND] [ARG...]

Create and run a new container from an image

Options:
      --add-host list                  Add a custom host-to-IP mapping (host:ip)
  -d, --detach                         Run container in background and print container ID
  -e, --env list                       Set environment variables
      --help                           Print usage
  -i, --interactive                    Keep STDIN open even if not attached
      --name string                    Assign a name to the container
  -w, --workdir string                 Working directory inside the container
";

    #[test]
    fn test_register_docker_help() {
        let mut table = FlagTable::with_dockerw_flags();
        let added = table.register_docker_help(HELP).unwrap();

        // --help is already owned by dockerw
        assert_eq!(added, 6);

        let env = table.lookup_short('e').unwrap();
        assert_eq!(table.spec(env).long, "env");
        assert_eq!(table.spec(env).kind, FlagKind::List);

        let detach = table.lookup_long("detach").unwrap();
        assert_eq!(table.spec(detach).kind, FlagKind::Switch);

        let workdir = table.lookup_short('w').unwrap();
        assert_eq!(table.spec(workdir).kind, FlagKind::Value);

        let help = table.lookup_long("help").unwrap();
        assert_eq!(table.spec(help).dockerw_flag(), Some(DockerwFlag::Help));
    }

    #[test]
    fn test_id_of_matches_registration() {
        let table = FlagTable::with_dockerw_flags();
        for flag in DockerwFlag::ALL {
            let id = table.id_of(flag);
            assert_eq!(table.spec(id).dockerw_flag(), Some(flag));
        }
    }

    #[test]
    fn test_dockerw_help_lists_visible_flags() {
        let help = FlagTable::with_dockerw_flags().dockerw_help();
        assert!(help.contains("--venv"));
        assert!(help.contains("Enable Docker-outside-of-Docker"));
        assert!(help.contains("--copy <list>"));
        assert!(!help.contains("--version"));
    }
}
