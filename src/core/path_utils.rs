/*
 * This module provides utility functions for path manipulation: locating the
 * per-user configuration directory, lexical normalization of configured paths,
 * and the forward-slash relative paths used as ledger keys and for ignore-pattern
 * matching.
 */
use directories::ProjectDirs;
use std::fs;
use std::path::{Component, Path, PathBuf};

/*
 * Retrieves the application's primary local configuration directory, creating it
 * if necessary. Returns `None` if the platform directory cannot be determined or
 * created.
 */
pub fn get_base_app_config_local_dir(app_name: &str) -> Option<PathBuf> {
    log::trace!("PathUtils: Attempting to get base app config local dir for '{app_name}'");
    ProjectDirs::from("", "", app_name).and_then(|proj_dirs| {
        let config_path = proj_dirs.config_local_dir();
        if !config_path.exists() {
            if let Err(e) = fs::create_dir_all(config_path) {
                log::error!(
                    "PathUtils: Failed to create base app config directory {config_path:?}: {e}"
                );
                return None;
            }
            log::debug!("PathUtils: Created base app config directory: {config_path:?}");
        }
        Some(config_path.to_path_buf())
    })
}

/*
 * Removes `.` components and folds `..` into the preceding component without
 * touching the file system. Paths that do not exist yet (fresh destination
 * trees) normalize the same way as existing ones.
 */
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component.as_os_str());
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/*
 * Resolves a configured path against `base` unless it is already absolute.
 */
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_lexically(path)
    } else {
        normalize_lexically(&base.join(path))
    }
}

/*
 * Returns `path` relative to `root` with components joined by '/', or `None` if
 * `path` is not inside `root`. The root itself maps to the empty string.
 */
pub fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let relative = normalize_lexically(path)
        .strip_prefix(normalize_lexically(root))
        .ok()?
        .to_path_buf();
    Some(
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/"),
    )
}
