use crate::utils::error::{DockerwError, Result};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(DockerwError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(DockerwError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    if path.contains(':') {
        return Err(DockerwError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot contain ':' (volume separator)".to_string(),
        });
    }

    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DockerwError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// Defaults entries are spliced into the option list, so a bare word
/// would be taken as the image name.
pub fn validate_option_entry(field_name: &str, value: &str) -> Result<()> {
    validate_non_empty_string(field_name, value)?;
    if !value.trim_start().starts_with('-') {
        return Err(DockerwError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Entry must start with an option flag".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("volume.src", "~/.ssh").is_ok());
        assert!(validate_path("volume.src", "").is_err());
        assert!(validate_path("volume.src", "a\0b").is_err());
        assert!(validate_path("volume.dest", "/a:/b").is_err());
    }

    #[test]
    fn test_validate_option_entry() {
        assert!(validate_option_entry("dockerw_defaults", "--venv --x11").is_ok());
        assert!(validate_option_entry("dockerw_defaults", "  -it").is_ok());
        assert!(validate_option_entry("dockerw_defaults", "ubuntu").is_err());
        assert!(validate_option_entry("dockerw_defaults", "   ").is_err());
    }
}
