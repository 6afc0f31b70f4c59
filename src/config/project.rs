//! Resolves a project-linked instance by walking up from the current
//! directory looking for `edgedb.toml`, then hashing its location the same
//! way the CLI does to find the stash directory that holds the linked
//! instance name (§4.4).

use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};

use crate::error::ConfigError;

const PROJECT_FILE: &str = "edgedb.toml";

/// Walks from `start` up to the filesystem root (without crossing device
/// boundaries) looking for `edgedb.toml`. Returns the directory containing
/// it, not the file itself.
pub fn find_project_dir(start: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let mut dir = start.to_path_buf();
    let start_dev = device_id(&dir)?;

    loop {
        if dir.join(PROJECT_FILE).is_file() {
            return Ok(Some(dir));
        }
        match dir.parent() {
            Some(parent) => {
                if device_id(parent)? != start_dev {
                    return Ok(None);
                }
                dir = parent.to_path_buf();
            }
            None => return Ok(None),
        }
    }
}

#[cfg(unix)]
fn device_id(path: &Path) -> Result<u64, ConfigError> {
    use std::os::unix::fs::MetadataExt;
    Ok(std::fs::metadata(path).map_err(ConfigError::Io)?.dev())
}

#[cfg(not(unix))]
fn device_id(_path: &Path) -> Result<u64, ConfigError> {
    // No stable device id on this platform; treat everything as one device
    // so the walk only stops at the filesystem root.
    Ok(0)
}

/// Computes the stash directory name for a project directory: the lowercase
/// hex SHA-1 of its canonicalized path, joined with the directory's own
/// basename for readability in listings.
pub fn stash_key(project_dir: &Path) -> Result<String, ConfigError> {
    let canonical = std::fs::canonicalize(project_dir).map_err(ConfigError::Io)?;
    let display_path = with_windows_verbatim_prefix(&canonical);

    let mut hasher = Sha1::new();
    hasher.update(display_path.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();

    let basename = project_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(format!("{basename}-{hex}"))
}

/// Ensures the path hashed starts with the `\\?\` verbatim prefix, prepending
/// it when absent. Windows' own `canonicalize` already returns paths with
/// this prefix, so on that platform this is a no-op; it only changes inputs
/// that lack it.
fn with_windows_verbatim_prefix(path: &Path) -> String {
    let s = path.to_string_lossy();
    if s.starts_with(r"\\") {
        s.into_owned()
    } else {
        format!(r"\\?\{s}")
    }
}

/// Reads the instance name a stash directory points at.
pub fn read_linked_instance(stash_dir: &Path) -> Result<Option<String>, ConfigError> {
    let marker = stash_dir.join("instance-name");
    if !marker.is_file() {
        return Ok(None);
    }
    let name = std::fs::read_to_string(marker)
        .map_err(ConfigError::Io)?
        .trim()
        .to_owned();
    Ok(Some(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_project_file_in_ancestor() {
        let tmp = std::env::temp_dir().join(format!(
            "edgetalk-project-test-{}",
            std::process::id()
        ));
        let nested = tmp.join("a/b/c");
        fs::create_dir_all(&nested).unwrap();
        fs::write(tmp.join(PROJECT_FILE), "").unwrap();

        let found = find_project_dir(&nested).unwrap();
        assert_eq!(found, Some(tmp.clone()));

        fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn returns_none_when_absent() {
        let tmp = std::env::temp_dir().join(format!(
            "edgetalk-project-test-absent-{}",
            std::process::id()
        ));
        fs::create_dir_all(&tmp).unwrap();
        assert_eq!(find_project_dir(&tmp).unwrap(), None);
        fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn leaves_existing_verbatim_prefix_untouched() {
        let p = Path::new(r"\\?\C:\Users\demo\project");
        assert_eq!(with_windows_verbatim_prefix(p), r"\\?\C:\Users\demo\project");
    }

    #[test]
    fn prepends_verbatim_prefix_when_absent() {
        let p = Path::new(r"C:\Users\demo\project");
        assert_eq!(with_windows_verbatim_prefix(p), r"\\?\C:\Users\demo\project");
    }
}
