//! File discovery with authoritative exclusion semantics (§4.2 step 1)
//!
//! Exclusion always wins: a path matching any exclude glob is discarded even
//! if it also matches an include glob.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};

/// Coarse OS-error classification so callers can branch on "doesn't exist"
/// vs. "no permission" vs. anything else, without matching on the walker's
/// internal error variants (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryErrorCode {
    Enoent,
    Eacces,
    Unknown,
}

#[derive(Debug)]
pub struct DiscoveryError {
    pub code: DiscoveryErrorCode,
    pub path: Option<PathBuf>,
}

impl std::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "discovery error ({:?}) at {}", self.code, path.display()),
            None => write!(f, "discovery error ({:?})", self.code),
        }
    }
}

impl std::error::Error for DiscoveryError {}

impl From<ignore::Error> for DiscoveryError {
    fn from(err: ignore::Error) -> Self {
        let path = err.path().map(|p| p.to_path_buf());
        let code = match err.io_error().map(|e| e.kind()) {
            Some(std::io::ErrorKind::NotFound) => DiscoveryErrorCode::Enoent,
            Some(std::io::ErrorKind::PermissionDenied) => DiscoveryErrorCode::Eacces,
            _ => DiscoveryErrorCode::Unknown,
        };
        DiscoveryError { code, path }
    }
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Default exclusions: build output, VCS metadata, lockfiles, binaries, and
/// common secret file names. Authoritative regardless of include patterns.
pub fn default_excludes() -> Vec<String> {
    vec![
        "**/target/**".into(),
        "**/node_modules/**".into(),
        "**/.git/**".into(),
        "**/dist/**".into(),
        "**/build/**".into(),
        "**/*.lock".into(),
        "**/Cargo.lock".into(),
        "**/package-lock.json".into(),
        "**/*.min.js".into(),
        "**/*.{png,jpg,jpeg,gif,ico,pdf,zip,tar,gz,so,dylib,dll,exe,bin}".into(),
        "**/.env".into(),
        "**/.env.*".into(),
        "**/*.pem".into(),
        "**/*.key".into(),
    ]
}

pub fn default_includes() -> Vec<String> {
    vec!["**/*".into()]
}

fn build_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|_| DiscoveryError {
            code: DiscoveryErrorCode::Unknown,
            path: Some(PathBuf::from(pattern)),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|_| DiscoveryError {
        code: DiscoveryErrorCode::Unknown,
        path: None,
    })
}

/// Walks `root`, returning repo-relative paths that match `includes` and do
/// not match `excludes`, capped at `max_files`.
pub fn discover_files(
    root: &Path,
    includes: &[String],
    excludes: &[String],
    max_files: usize,
) -> Result<Vec<PathBuf>> {
    let include_set = build_set(includes)?;
    let exclude_set = build_set(excludes)?;

    let mut files = Vec::new();
    for entry in ignore::WalkBuilder::new(root).hidden(false).build() {
        if files.len() >= max_files {
            break;
        }
        let entry = entry?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let rel = match entry.path().strip_prefix(root) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        if exclude_set.is_match(rel) {
            continue;
        }
        if !include_set.is_match(rel) {
            continue;
        }
        files.push(rel.to_path_buf());
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_discover_respects_exclusion_authority() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("target")).unwrap();
        fs::write(dir.path().join("target/generated.rs"), "fn x() {}").unwrap();
        fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();

        let files = discover_files(
            dir.path(),
            &default_includes(),
            &default_excludes(),
            1000,
        )
        .unwrap();

        assert!(files.iter().any(|p| p == Path::new("main.rs")));
        assert!(!files.iter().any(|p| p.starts_with("target")));
    }

    #[test]
    fn test_discover_caps_at_max_files() {
        let dir = tempdir().unwrap();
        for i in 0..5 {
            fs::write(dir.path().join(format!("f{i}.rs")), "fn x() {}").unwrap();
        }
        let files = discover_files(dir.path(), &default_includes(), &[], 3).unwrap();
        assert_eq!(files.len(), 3);
    }
}
