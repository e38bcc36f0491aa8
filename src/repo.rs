//! Target resolution: batch-list file, remote repository, or local path.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use regex::Regex;
use tracing::{info, warn};

use qlagent_executor::CommandRunner;

/// Permissive repository-URL shape: optional scheme, optional `user@`, host,
/// `/`-or-`:` separated owner/name, optional `.git`, optional trailing slash.
const REPO_URL_PATTERN: &str =
    r"^(?:(?:https?|ssh|git|ftps?)://)?(?:[^/@]+@)?[^/:]+[/:](?P<owner>[^/:]+)/(?P<name>.+?)(?:\.git)?/?$";

/// A target string resolved to what it denotes, decided once at the top of
/// the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedTarget {
    /// An existing non-directory file whose lines are further targets.
    Batch(PathBuf),
    /// An existing directory, canonicalized.
    Local(PathBuf),
    /// A remote repository reference to clone.
    Remote(RemoteRepo),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRepo {
    pub url: String,
    pub owner: String,
    pub name: String,
}

impl RemoteRepo {
    /// Clone destination: `<owner>@<name>` under the working directory.
    pub fn destination(&self) -> PathBuf {
        PathBuf::from(format!("{}@{}", self.owner, self.name))
    }
}

/// Classify a target string. Filesystem checks disambiguate batch file vs.
/// directory; only non-existent paths are considered as repository URLs.
pub fn classify_target(target: &str) -> Result<ResolvedTarget> {
    let path = Path::new(target);
    if path.is_file() {
        return Ok(ResolvedTarget::Batch(path.to_path_buf()));
    }
    if path.is_dir() {
        let canonical = std::fs::canonicalize(path)
            .with_context(|| format!("Failed to resolve source folder {target}"))?;
        return Ok(ResolvedTarget::Local(canonical));
    }
    if let Some(remote) = parse_remote(target) {
        return Ok(ResolvedTarget::Remote(remote));
    }
    bail!("Folder {target} is not a directory. Please provide a valid directory path and try again.")
}

/// Parse a repository reference, extracting owner and repository name.
pub fn parse_remote(target: &str) -> Option<RemoteRepo> {
    let pattern = Regex::new(REPO_URL_PATTERN).ok()?;
    let captures = pattern.captures(target)?;
    Some(RemoteRepo {
        url: target.to_string(),
        owner: captures.name("owner")?.as_str().to_string(),
        name: captures.name("name")?.as_str().to_string(),
    })
}

/// Clone a remote repository via the version-control client. An existing
/// destination is reused rather than re-created; remove stale clones before
/// scanning if a fresh checkout is needed.
pub async fn clone_remote(
    runner: &CommandRunner,
    vcs: &str,
    remote: &RemoteRepo,
    destination: &Path,
) -> Result<()> {
    if destination.exists() {
        warn!(
            "Clone destination {} already exists; reusing it",
            destination.display()
        );
        return Ok(());
    }

    info!("Cloning remote repository {}", remote.url);
    let args = vec![
        "clone".to_string(),
        remote.url.clone(),
        destination.display().to_string(),
    ];
    runner.run(vcs, &args, "Clone remote repository").await?;

    if !destination.is_dir() {
        bail!("Failed to clone remote repository {}", remote.url);
    }
    Ok(())
}

/// Recursive removal, best-effort: failures are warnings, never fatal.
pub fn remove_folder(path: &Path) {
    if let Err(e) = std::fs::remove_dir_all(path) {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}
