//! Version-control collaborator.
//!
//! The write gate only needs two things from a VCS: select a branch and
//! commit a set of already-written files. `GitCli` shells out to `git`.

use crate::core::error::AkrError;
use std::path::{Path, PathBuf};
use std::process::Command;

pub trait VersionControl: Send + Sync {
    /// Switch to `branch`, creating it from the current HEAD if needed.
    fn ensure_branch(&self, repo: &Path, branch: &str) -> Result<(), AkrError>;

    /// Stage `files` (repository-relative) and commit them. Returns the
    /// new commit id, or HEAD when the files already match it.
    fn stage_and_commit(
        &self,
        repo: &Path,
        files: &[PathBuf],
        message: &str,
    ) -> Result<String, AkrError>;
}

#[derive(Debug, Clone, Default)]
pub struct GitCli {
    author_name: Option<String>,
    author_email: Option<String>,
}

impl GitCli {
    pub fn with_identity(name: Option<String>, email: Option<String>) -> Self {
        Self {
            author_name: name,
            author_email: email,
        }
    }

    fn command(&self, repo: &Path) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(repo);
        if let Some(name) = &self.author_name {
            cmd.arg("-c").arg(format!("user.name={}", name));
        }
        if let Some(email) = &self.author_email {
            cmd.arg("-c").arg(format!("user.email={}", email));
        }
        cmd
    }

    fn run_git(&self, repo: &Path, args: &[&str]) -> Result<String, AkrError> {
        let output = self
            .command(repo)
            .args(args)
            .output()
            .map_err(|e| AkrError::Vcs(format!("git {} could not start: {}", args.join(" "), e)))?;
        if !output.status.success() {
            return Err(AkrError::Vcs(format!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Whether the index differs from HEAD for `paths`.
    fn has_staged_changes(&self, repo: &Path, paths: &[String]) -> Result<bool, AkrError> {
        let mut args = vec!["diff", "--cached", "--quiet", "--"];
        args.extend(paths.iter().map(String::as_str));
        let status = self
            .command(repo)
            .args(&args)
            .status()
            .map_err(|e| AkrError::Vcs(format!("git diff could not start: {}", e)))?;
        match status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(AkrError::Vcs(format!("git diff --cached failed: {}", status))),
        }
    }

    fn current_branch(&self, repo: &Path) -> Result<String, AkrError> {
        // symbolic-ref also works on an unborn HEAD, where rev-parse does not.
        self.run_git(repo, &["symbolic-ref", "--short", "HEAD"])
            .or_else(|_| self.run_git(repo, &["rev-parse", "--abbrev-ref", "HEAD"]))
    }

    fn branch_exists(&self, repo: &Path, branch: &str) -> bool {
        self.run_git(
            repo,
            &["rev-parse", "--verify", "--quiet", &format!("refs/heads/{}", branch)],
        )
        .is_ok()
    }

    fn has_commits(&self, repo: &Path) -> bool {
        self.run_git(repo, &["rev-parse", "--verify", "--quiet", "HEAD"])
            .is_ok()
    }
}

impl VersionControl for GitCli {
    fn ensure_branch(&self, repo: &Path, branch: &str) -> Result<(), AkrError> {
        if self.current_branch(repo)? == branch {
            return Ok(());
        }
        if self.branch_exists(repo, branch) {
            self.run_git(repo, &["checkout", branch])?;
        } else if self.has_commits(repo) {
            self.run_git(repo, &["checkout", "-b", branch])?;
        } else {
            // Unborn repository: point HEAD at the new branch name.
            self.run_git(repo, &["symbolic-ref", "HEAD", &format!("refs/heads/{}", branch)])?;
        }
        tracing::info!(branch, "switched documentation branch");
        Ok(())
    }

    fn stage_and_commit(
        &self,
        repo: &Path,
        files: &[PathBuf],
        message: &str,
    ) -> Result<String, AkrError> {
        if files.is_empty() {
            return Err(AkrError::Vcs("nothing to commit".to_string()));
        }
        let paths: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
        let mut add_args = vec!["add", "--"];
        add_args.extend(paths.iter().map(String::as_str));
        self.run_git(repo, &add_args)?;

        // Rewriting identical bytes leaves HEAD as the commit of record.
        if !self.has_staged_changes(repo, &paths)? {
            let sha = self.run_git(repo, &["rev-parse", "HEAD"])?;
            tracing::info!(commit = %sha, "documentation unchanged, nothing committed");
            return Ok(sha);
        }

        let mut commit_args = vec!["commit", "-m", message, "--"];
        commit_args.extend(paths.iter().map(String::as_str));
        self.run_git(repo, &commit_args)?;

        let sha = self.run_git(repo, &["rev-parse", "HEAD"])?;
        tracing::info!(commit = %sha, files = paths.len(), "documentation committed");
        Ok(sha)
    }
}
