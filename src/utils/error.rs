use thiserror::Error;

#[derive(Error, Debug)]
pub enum DockerwError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Load path does not exist: {path}")]
    LoadPathNotFound { path: String },

    #[error("No image specified")]
    MissingImage,

    #[error("Unknown flag: {flag}")]
    UnknownFlag { flag: String },

    #[error("Flag needs an argument: {flag}")]
    MissingValue { flag: String },

    #[error("Unterminated quote in: {input}")]
    UnterminatedQuote { input: String },

    #[error("Expansion of --{flag} produced an image command: {tokens}")]
    ExpansionProducedImage { flag: String, tokens: String },

    #[error("dockerw options did not settle after {iterations} expansion passes")]
    ExpansionLoop { iterations: usize },

    #[error("Docker is unavailable: {message}")]
    DockerUnavailable { message: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("User lookup failed for uid {uid}")]
    UserLookup { uid: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Usage,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    High,
    Critical,
}

impl DockerwError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DockerwError::MissingImage
            | DockerwError::UnknownFlag { .. }
            | DockerwError::MissingValue { .. }
            | DockerwError::UnterminatedQuote { .. } => ErrorCategory::Usage,
            DockerwError::TomlError(_)
            | DockerwError::LoadPathNotFound { .. }
            | DockerwError::ExpansionProducedImage { .. }
            | DockerwError::ExpansionLoop { .. }
            | DockerwError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            DockerwError::IoError(_)
            | DockerwError::RegexError(_)
            | DockerwError::DockerUnavailable { .. }
            | DockerwError::UserLookup { .. } => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Usage | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// Process exit code used by the binary.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        format!("Error: {}", self)
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            DockerwError::LoadPathNotFound { .. } => {
                "Check the directory passed to --load exists"
            }
            DockerwError::MissingImage => {
                "Pass an image name or set one with --image-default"
            }
            DockerwError::UnknownFlag { .. } | DockerwError::MissingValue { .. } => {
                "Run 'dockerw run --help' to list the supported options"
            }
            DockerwError::UnterminatedQuote { .. } => "Close the quote in the argument",
            DockerwError::TomlError(_) | DockerwError::InvalidConfigValueError { .. } => {
                "Fix .dockerw/defaults.toml in the project directory"
            }
            DockerwError::ExpansionProducedImage { .. } => {
                "Defaults may only contain options, not an image or command"
            }
            DockerwError::ExpansionLoop { .. } => {
                "Check that defaults files do not load each other in a cycle"
            }
            DockerwError::DockerUnavailable { .. } => {
                "Make sure docker is installed and on PATH"
            }
            DockerwError::UserLookup { .. } => "Check SUDO_UID and the passwd database",
            DockerwError::IoError(_) | DockerwError::RegexError(_) => {
                "Check file permissions and available disk space"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, DockerwError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_follow_severity() {
        assert_eq!(DockerwError::MissingImage.exit_code(), 1);
        assert_eq!(
            DockerwError::LoadPathNotFound {
                path: "/nope".to_string()
            }
            .exit_code(),
            1
        );
        assert_eq!(
            DockerwError::DockerUnavailable {
                message: "not found".to_string()
            }
            .exit_code(),
            3
        );
    }

    #[test]
    fn test_user_friendly_message() {
        let err = DockerwError::UnknownFlag {
            flag: "--bogus".to_string(),
        };
        assert_eq!(err.user_friendly_message(), "Error: Unknown flag: --bogus");
        assert_eq!(err.category(), ErrorCategory::Usage);
    }
}
