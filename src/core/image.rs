use crate::domain::model::ImageRef;
use crate::utils::error::{DockerwError, Result};
use regex::Regex;

pub const DEFAULT_REGISTRY: &str = "docker.io";
pub const DEFAULT_TAG: &str = "latest";

/// A first path segment is a registry when it looks like a host
/// (contains `.` or `:`) or is `localhost`.
const IMAGE_PATTERN: &str =
    r"^((?P<registry>([^/]*[.:]|localhost)[^/]*)/)?/?(?P<name>[^:]*):?(?P<tag>.*)$";

/// Splits an image reference into registry, name and tag, filling in
/// `docker.io` and `latest` when they are omitted.
pub fn parse_image_name(image: &str) -> Result<ImageRef> {
    let re = Regex::new(IMAGE_PATTERN)?;
    let caps = re.captures(image).ok_or(DockerwError::MissingImage)?;

    let name = caps.name("name").map(|m| m.as_str()).unwrap_or_default();
    if name.is_empty() {
        return Err(DockerwError::MissingImage);
    }

    let registry = caps
        .name("registry")
        .map(|m| m.as_str())
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_REGISTRY);
    let tag = caps
        .name("tag")
        .map(|m| m.as_str())
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TAG);

    Ok(ImageRef {
        registry: registry.to_string(),
        name: name.to_string(),
        tag: tag.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_filled_in() {
        let image = parse_image_name("ubuntu").unwrap();
        assert_eq!(image.to_string(), "docker.io/ubuntu:latest");

        let image = parse_image_name("library/alpine:3.19").unwrap();
        assert_eq!(image.registry, "docker.io");
        assert_eq!(image.name, "library/alpine");
        assert_eq!(image.tag, "3.19");
    }

    #[test]
    fn test_registry_detection() {
        let image = parse_image_name("ghcr.io/kschwab/dev:1.0").unwrap();
        assert_eq!(image.registry, "ghcr.io");
        assert_eq!(image.name, "kschwab/dev");

        let image = parse_image_name("localhost:5000/tools").unwrap();
        assert_eq!(image.registry, "localhost:5000");
        assert_eq!(image.to_string(), "localhost:5000/tools:latest");

        let image = parse_image_name("localhost/tools").unwrap();
        assert_eq!(image.registry, "localhost");
    }

    #[test]
    fn test_already_normalized_is_stable() {
        let once = parse_image_name("ubuntu:22.04").unwrap().to_string();
        let twice = parse_image_name(&once).unwrap().to_string();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_name_is_missing_image() {
        assert!(matches!(parse_image_name(""), Err(DockerwError::MissingImage)));
        assert!(matches!(parse_image_name(":tag"), Err(DockerwError::MissingImage)));
    }
}
