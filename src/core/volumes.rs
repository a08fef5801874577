use crate::core::parser::quote_word;
use crate::core::venv::{venv_home_path, VENV_COPY_PATH};
use crate::domain::model::UserIdentity;
use std::path::{Component, Path, PathBuf};

/// Replaces a leading `~` with `home`.
pub fn expand_tilde(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        home.to_path_buf()
    } else if let Some(rest) = path.strip_prefix("~/") {
        home.join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// Absolute form of `path`, with symlinks resolved when it exists.
pub fn resolve_path(path: &Path, cwd: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };

    match std::fs::canonicalize(&absolute) {
        Ok(resolved) => resolved,
        Err(_) => normalize(&absolute),
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

fn is_named_volume(src: &str) -> bool {
    !src.is_empty() && !src.contains('/') && !src.starts_with('~') && !src.starts_with('.')
}

fn home_relative<'a>(dest: &'a str, home: &str) -> Option<&'a str> {
    let rest = dest.strip_prefix(home)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

/// Rewrites a `SRC:DEST[:OPTS]` volume spec for the host user.
///
/// Host paths are resolved, `~` in the destination means the user's home in
/// the container. Destinations in that home are staged under the venv home,
/// which the entrypoint moves into place once the user exists. In copy mode
/// the destination is staged read-only under the copy area instead.
/// Applying the rewrite twice yields the same spec.
pub fn rewrite(spec: &str, identity: &UserIdentity, cwd: &Path, copy: bool) -> String {
    let mut parts = spec.splitn(3, ':');
    let src = parts.next().unwrap_or_default();
    let dest = match parts.next() {
        Some(dest) if !dest.is_empty() => dest,
        _ => return spec.to_string(),
    };
    let options = parts.next().unwrap_or_default();

    let src = if is_named_volume(src) {
        src.to_string()
    } else {
        resolve_path(&expand_tilde(src, &identity.home), cwd)
            .display()
            .to_string()
    };

    let container_home = format!("/home/{}", identity.name);
    let mut dest = if dest == "~" || dest.starts_with("~/") {
        format!("{}{}", container_home, &dest[1..])
    } else {
        dest.to_string()
    };
    let mut options = options.to_string();

    if copy && !dest.starts_with(VENV_COPY_PATH) {
        let mut opts: Vec<&str> = options.split(',').filter(|o| !o.is_empty()).collect();
        if !opts.contains(&"ro") {
            opts.retain(|o| *o != "rw");
            opts.push("ro");
        }
        options = opts.join(",");
        dest = format!("{}/{}", VENV_COPY_PATH, dest.trim_start_matches('/'));
    } else if let Some(rest) = home_relative(&dest, &container_home) {
        dest = format!("{}{}", venv_home_path(identity), rest);
    }

    if options.is_empty() {
        format!("{}:{}", src, dest)
    } else {
        format!("{}:{}:{}", src, dest, options)
    }
}

/// `--volume SRC:DEST` (or `--copy`) when `src` exists on the host.
/// `dest` defaults to `src` as written, so `~/.vimrc` lands in the
/// container user's home.
pub fn volume_arg(
    src: &str,
    dest: Option<&str>,
    copy: bool,
    identity: &UserIdentity,
    cwd: &Path,
) -> Option<String> {
    let src_path = resolve_path(&expand_tilde(src, &identity.home), cwd);
    if !src_path.exists() {
        tracing::debug!("Skipping volume for missing path {}", src_path.display());
        return None;
    }

    let action = if copy { "copy" } else { "volume" };
    let spec = format!("{}:{}", src_path.display(), dest.unwrap_or(src));
    Some(format!("--{} {}", action, quote_word(&spec)))
}
