//! Resolution of job-supplied object references against a storage root.

use std::path::{Component, Path, PathBuf};

use filevault_core::error::AppError;
use filevault_core::result::AppResult;

/// Resolve `local_ref` beneath `root`.
///
/// Leading slashes are ignored. References that are empty or contain `..`
/// are rejected so a job config can never reach outside the root.
pub fn resolve_under(root: &Path, local_ref: &str) -> AppResult<PathBuf> {
    let relative = Path::new(local_ref.trim_start_matches('/'));
    let mut resolved = root.to_path_buf();
    let mut depth = 0usize;

    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(AppError::validation(format!(
                    "Path '{local_ref}' escapes the storage root"
                )));
            }
        }
    }

    if depth == 0 {
        return Err(AppError::validation("Path must not be empty"));
    }
    Ok(resolved)
}
