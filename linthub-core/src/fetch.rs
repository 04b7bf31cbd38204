//! Repository fetching.
//!
//! A fetch clones the submitted locator into a scratch directory and
//! selects the files the analysis stage will look at. After a successful
//! fetch the scratch directory survives until the job reclaims it; a
//! failed fetch removes it before returning, since no [`FetchedTree`]
//! carries the path out.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{AnalysisError, Result};

/// A materialized working tree plus the files selected for analysis.
#[derive(Debug)]
pub struct FetchedTree {
    pub root: PathBuf,
    pub files: Vec<PathBuf>,
}

impl FetchedTree {
    /// Delete the working tree. Jobs call this on every exit path.
    pub async fn reclaim(self) -> Result<()> {
        tokio::fs::remove_dir_all(&self.root).await.map_err(|e| {
            AnalysisError::Cleanup(format!("{}: {e}", self.root.display()))
        })
    }
}

#[async_trait]
pub trait RepoFetcher: Send + Sync {
    /// Materialize `repo_url` locally and select the files the analysis
    /// stage will look at.
    async fn fetch(&self, repo_url: &str) -> Result<FetchedTree>;
}

/// Fetches over the `git` CLI with a shallow clone.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    git_command: String,
}

impl GitFetcher {
    pub fn new(git_command: impl Into<String>) -> Self {
        Self {
            git_command: git_command.into(),
        }
    }
}

#[async_trait]
impl RepoFetcher for GitFetcher {
    async fn fetch(&self, repo_url: &str) -> Result<FetchedTree> {
        let root = tempfile::Builder::new()
            .prefix("repo-clone-")
            .tempdir()
            .map_err(|e| {
                AnalysisError::Fetch(format!(
                    "failed to allocate scratch directory: {e}"
                ))
            })?
            .keep();

        let output = match Command::new(&self.git_command)
            .arg("clone")
            .arg("--depth")
            .arg("1")
            .arg("--no-tags")
            .arg(repo_url)
            .arg(&root)
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                let err = AnalysisError::Fetch(format!(
                    "failed to run {}: {e}",
                    self.git_command
                ));
                return Err(abandon(&root, err).await);
            }
        };

        if !output.status.success() {
            let err = AnalysisError::Fetch(clone_failure(&output));
            return Err(abandon(&root, err).await);
        }

        let files = match collect_files(&root) {
            Ok(files) => files,
            Err(err) => return Err(abandon(&root, err).await),
        };
        debug!(
            count = files.len(),
            root = %root.display(),
            "working tree ready"
        );

        Ok(FetchedTree { root, files })
    }
}

/// Delete the scratch tree on an error exit. No [`FetchedTree`] exists
/// yet, so this is the only place that can remove it; the original error
/// keeps priority over a removal failure.
async fn abandon(root: &Path, err: AnalysisError) -> AnalysisError {
    let _ = tokio::fs::remove_dir_all(root).await;
    err
}

/// The most specific line git printed, or the exit status when it was
/// silent.
fn clone_failure(output: &std::process::Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("git clone failed with {}", output.status))
}

/// Extension of the sources the engine analyzes. The configuration's
/// extension filter only shapes the engine's document, not this walk.
const SOURCE_EXTENSION: &str = "java";

/// Regular `.java` files under `root`, skipping git metadata, in path
/// order.
fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git");

    for entry in walker {
        let entry = entry.map_err(|e| {
            AnalysisError::Internal(format!(
                "Failed to scan working tree: {e}"
            ))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_source = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(SOURCE_EXTENSION));
        if is_source {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn selects_only_java_sources() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/main")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("src/main/App.java"), "class App {}")
            .unwrap();
        fs::write(dir.path().join("src/main/Util.java"), "class Util {}")
            .unwrap();
        fs::write(dir.path().join("pom.xml"), "<project/>").unwrap();
        fs::write(dir.path().join("README.md"), "# readme").unwrap();
        fs::write(dir.path().join(".git/Stale.java"), "class Stale {}")
            .unwrap();

        let files = collect_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|path| {
                path.strip_prefix(dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();

        assert_eq!(names, ["src/main/App.java", "src/main/Util.java"]);
    }

    #[test]
    fn extension_match_ignores_case() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Legacy.JAVA"), "class Legacy {}").unwrap();

        let files = collect_files(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn files_without_extensions_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Makefile"), "all:").unwrap();

        let files = collect_files(dir.path()).unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn abandon_removes_the_tree_and_keeps_the_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("scratch");
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/App.java"), "class App {}").unwrap();

        let err =
            abandon(&root, AnalysisError::Fetch("network unreachable".into()))
                .await;

        assert_eq!(err.to_string(), "network unreachable");
        assert!(!root.exists());
    }

    #[cfg(unix)]
    fn fake_git(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-git");
        fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))
            .unwrap();
        script.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn a_failed_clone_leaves_no_scratch_directory() {
        let dir = tempfile::tempdir().unwrap();
        let reported = dir.path().join("clone-target");
        // The clone target is argument six; record it so the test can
        // check the directory afterwards.
        let script = fake_git(
            dir.path(),
            &format!(
                "printf '%s' \"$6\" > \"{}\"\n\
                 echo 'fatal: repository not found' >&2\n\
                 exit 128",
                reported.display()
            ),
        );

        let fetcher = GitFetcher::new(script);
        let err = fetcher
            .fetch("https://git.example/missing.git")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "fatal: repository not found");
        let target = fs::read_to_string(&reported).unwrap();
        assert!(!Path::new(&target).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn a_vanished_clone_target_surfaces_the_scan_error() {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_git(dir.path(), "rm -rf \"$6\"\nexit 0");

        let fetcher = GitFetcher::new(script);
        let err = fetcher
            .fetch("https://git.example/empty.git")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AnalysisError::Internal(ref msg)
                if msg.starts_with("Failed to scan working tree")
        ));
    }

    #[tokio::test]
    async fn a_missing_git_binary_is_a_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-git");

        let fetcher = GitFetcher::new(missing.to_string_lossy());
        let err = fetcher
            .fetch("https://git.example/any.git")
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("failed to run "));
    }
}
