use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const UNKNOWN_AUTHOR: &str = "unknown";

/// Where the svn client caches simple (username/password) credentials.
pub fn svn_auth_dir() -> Option<PathBuf> {
    if cfg!(windows) {
        dirs::config_dir().map(|dir| dir.join("Subversion").join("auth").join("svn.simple"))
    } else {
        dirs::home_dir().map(|dir| dir.join(".subversion").join("auth").join("svn.simple"))
    }
}

/// Pull the `username` value out of one svn credential cache file.
///
/// The file is a run of `K <len>` / key / `V <len>` / value records ending in
/// `END`.
pub fn parse_username(content: &str) -> Option<String> {
    let mut lines = content.lines();
    let mut key: Option<&str> = None;

    while let Some(line) = lines.next() {
        if line == "END" {
            break;
        }
        if line.starts_with("K ") {
            key = lines.next();
        } else if line.starts_with("V ") {
            let value = lines.next()?;
            if key == Some("username") && !value.trim().is_empty() {
                return Some(value.to_string());
            }
            key = None;
        }
    }

    None
}

/// Username from the first cache entry (in file-name order) that has one.
pub fn cached_username(dir: &Path) -> Result<Option<String>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    entries.sort();

    for path in entries {
        match fs::read_to_string(&path) {
            Ok(content) => {
                if let Some(username) = parse_username(&content) {
                    return Ok(Some(username));
                }
            }
            Err(e) => debug!("Skipping credential cache {}: {}", path.display(), e),
        }
    }

    Ok(None)
}

/// Author for events with no log entry to take one from: the configured
/// username, else the svn credential cache, else [`UNKNOWN_AUTHOR`].
pub fn resolve_author(configured: Option<&str>) -> String {
    resolve_author_from(configured, svn_auth_dir().as_deref())
}

pub fn resolve_author_from(configured: Option<&str>, auth_dir: Option<&Path>) -> String {
    if let Some(username) = configured.filter(|u| !u.trim().is_empty()) {
        return username.to_string();
    }

    if let Some(dir) = auth_dir.filter(|d| d.is_dir()) {
        match cached_username(dir) {
            Ok(Some(username)) => return username,
            Ok(None) => debug!("No username in {}", dir.display()),
            Err(e) => warn!("Failed to read svn credential cache: {:#}", e),
        }
    }

    UNKNOWN_AUTHOR.to_string()
}
