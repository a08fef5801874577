use crate::core::volumes::volume_arg;
use crate::domain::model::UserIdentity;
use crate::utils::error::Result;
use crate::utils::validation::{validate_option_entry, validate_path, Validate};
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULTS_DIR: &str = ".dockerw";
pub const DEFAULTS_FILE: &str = "defaults.toml";

/// Project defaults, read from `<project>/.dockerw/defaults.toml`.
///
/// ```toml
/// dockerw_defaults = ["--venv --x11", "-e API_KEY=${API_KEY}"]
///
/// [[volume]]
/// src = "~/.config/gh"
/// copy = true
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct DefaultsFile {
    /// Option strings, split like a shell would.
    #[serde(default)]
    pub dockerw_defaults: Vec<String>,
    #[serde(default, rename = "volume")]
    pub volumes: Vec<VolumeEntry>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct VolumeEntry {
    pub src: String,
    /// Defaults to `src` as written.
    pub dest: Option<String>,
    #[serde(default)]
    pub copy: bool,
}

impl DefaultsFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// Replaces `${VAR}` with the environment value; unset variables are
    /// left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn path_in(project_dir: &Path) -> PathBuf {
        project_dir.join(DEFAULTS_DIR).join(DEFAULTS_FILE)
    }

    /// Reads the project's defaults file, `None` when there is none.
    pub fn load_from_project(project_dir: &Path) -> Result<Option<Self>> {
        let path = Self::path_in(project_dir);
        if !path.is_file() {
            return Ok(None);
        }
        Self::from_file(&path).map(Some)
    }

    /// Argument strings for the expansion loop. Volumes whose source is
    /// missing on this host are dropped.
    pub fn args(&self, identity: &UserIdentity, cwd: &Path) -> Vec<String> {
        let mut args = self.dockerw_defaults.clone();
        args.extend(self.volumes.iter().filter_map(|volume| {
            volume_arg(
                &volume.src,
                volume.dest.as_deref(),
                volume.copy,
                identity,
                cwd,
            )
        }));
        args
    }
}

impl Validate for DefaultsFile {
    fn validate(&self) -> Result<()> {
        for entry in &self.dockerw_defaults {
            validate_option_entry("dockerw_defaults", entry)?;
        }
        for volume in &self.volumes {
            validate_path("volume.src", &volume.src)?;
            if let Some(dest) = &volume.dest {
                validate_path("volume.dest", dest)?;
            }
        }
        Ok(())
    }
}

/// Walks up from `start` to the first directory holding a defaults file and
/// returns that file's path.
pub fn find_nearest_defaults_file(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(DefaultsFile::path_in)
        .find(|path| path.is_file())
}

/// Project root owning a defaults file path (`<root>/.dockerw/defaults.toml`).
pub fn project_root(defaults_file: &Path) -> Option<&Path> {
    defaults_file.parent()?.parent()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_parse_defaults_file() {
        let toml_content = r#"
dockerw_defaults = ["--venv --x11", "-e TERM=xterm"]

[[volume]]
src = "~/.config/gh"
dest = "/etc/gh"

[[volume]]
src = "~/.ssh"
copy = true
"#;

        let defaults = DefaultsFile::from_toml_str(toml_content).unwrap();

        assert_eq!(defaults.dockerw_defaults, vec!["--venv --x11", "-e TERM=xterm"]);
        assert_eq!(defaults.volumes.len(), 2);
        assert_eq!(defaults.volumes[0].dest.as_deref(), Some("/etc/gh"));
        assert!(!defaults.volumes[0].copy);
        assert!(defaults.volumes[1].copy);
        assert!(defaults.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("DOCKERW_TEST_IMAGE_TAG", "3.19");

        let toml_content = r#"
dockerw_defaults = ["--image-default alpine:${DOCKERW_TEST_IMAGE_TAG}", "-e X=${DOCKERW_TEST_UNSET_VAR}"]
"#;

        let defaults = DefaultsFile::from_toml_str(toml_content).unwrap();
        assert_eq!(defaults.dockerw_defaults[0], "--image-default alpine:3.19");
        assert_eq!(defaults.dockerw_defaults[1], "-e X=${DOCKERW_TEST_UNSET_VAR}");

        std::env::remove_var("DOCKERW_TEST_IMAGE_TAG");
    }

    #[test]
    fn test_empty_file_is_valid() {
        let defaults = DefaultsFile::from_toml_str("").unwrap();
        assert_eq!(defaults, DefaultsFile::default());
    }

    #[test]
    fn test_validation_rejects_positional_entry() {
        let defaults = DefaultsFile::from_toml_str(r#"dockerw_defaults = ["ubuntu"]"#).unwrap();
        assert!(defaults.validate().is_err());
    }

    #[test]
    fn test_malformed_toml() {
        assert!(DefaultsFile::from_toml_str("dockerw_defaults = [").is_err());
    }

    #[test]
    fn test_defaults_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(br#"dockerw_defaults = ["--dood"]"#)
            .unwrap();

        let defaults = DefaultsFile::from_file(temp_file.path()).unwrap();
        assert_eq!(defaults.dockerw_defaults, vec!["--dood"]);
    }

    #[test]
    fn test_find_nearest_defaults_file() {
        let project = TempDir::new().unwrap();
        let nested = project.path().join("src/deep/er");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::create_dir_all(project.path().join(DEFAULTS_DIR)).unwrap();
        std::fs::write(DefaultsFile::path_in(project.path()), "").unwrap();

        let found = find_nearest_defaults_file(&nested).unwrap();
        assert_eq!(found, DefaultsFile::path_in(project.path()));
        assert_eq!(project_root(&found), Some(project.path()));

        assert!(DefaultsFile::load_from_project(&nested).unwrap().is_none());
        assert!(DefaultsFile::load_from_project(project.path()).unwrap().is_some());
    }
}
