//! `git` subprocess adapter.

use crate::config::{CoordinatorConfig, GitIdentity};
use crate::merge::domain::{FastForwardOutcome, RebaseOutcome};
use crate::merge::ports::{GitError, GitOps, GitResult};
use crate::process::{CommandOutput, run_command};
use crate::task::domain::{BranchName, CommitSha};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use std::time::Duration;
use tracing::debug;

const GIT: &str = "git";
const GIT_ENV: [(&str, &str); 3] = [
    ("GIT_TERMINAL_PROMPT", "0"),
    ("GIT_EDITOR", "true"),
    ("GIT_SEQUENCE_EDITOR", "true"),
];
const STASH_MESSAGE: &str = "atelier merge pipeline";

/// Runs every operation as a `git` subprocess under a fixed timeout.
///
/// Commits created by rebases carry the configured identity regardless of
/// the host's git configuration.
#[derive(Debug, Clone)]
pub struct GitCli {
    timeout: Duration,
    identity: GitIdentity,
}

impl GitCli {
    /// Creates an adapter with an explicit timeout and identity.
    #[must_use]
    pub const fn new(timeout: Duration, identity: GitIdentity) -> Self {
        Self { timeout, identity }
    }

    /// Creates an adapter from coordinator settings.
    #[must_use]
    pub fn from_config(config: &CoordinatorConfig) -> Self {
        Self::new(config.git_timeout(), config.git_identity.clone())
    }

    /// Runs git and returns its output whatever the exit code.
    async fn run(&self, repo: &Utf8Path, args: &[&str]) -> GitResult<CommandOutput> {
        let command = args.first().copied().unwrap_or_default().to_owned();
        let user_name = format!("user.name={}", self.identity.name);
        let user_email = format!("user.email={}", self.identity.email);
        let mut full_args = vec!["-c", user_name.as_str(), "-c", user_email.as_str()];
        full_args.extend_from_slice(args);

        let output = run_command(GIT, &full_args, &GIT_ENV, repo, self.timeout)
            .await
            .map_err(|err| GitError::Spawn {
                command: command.clone(),
                reason: err.to_string(),
            })?;
        if output.timed_out {
            return Err(GitError::TimedOut { command });
        }
        debug!(repo = %repo, command = %command, exit_code = output.exit_code, "git finished");
        Ok(output)
    }

    /// Runs git and returns trimmed stdout, failing on a non-zero exit.
    async fn run_checked(&self, repo: &Utf8Path, args: &[&str]) -> GitResult<String> {
        let output = self.run(repo, args).await?;
        if !output.success() {
            return Err(command_failed(args, &output));
        }
        Ok(output.stdout_trimmed().to_owned())
    }
}

fn command_failed(args: &[&str], output: &CommandOutput) -> GitError {
    GitError::CommandFailed {
        command: args.first().copied().unwrap_or_default().to_owned(),
        detail: output.failure_summary(),
    }
}

fn parse_sha(command: &str, raw: &str) -> GitResult<CommitSha> {
    CommitSha::new(raw.trim()).map_err(|_| GitError::InvalidOutput {
        command: command.to_owned(),
        output: raw.to_owned(),
    })
}

/// Finds the linked worktree holding `refs/heads/<branch>` in
/// `git worktree list --porcelain` output. The first block always
/// describes the main checkout and is ignored.
fn linked_worktree_for(porcelain: &str, branch: &BranchName) -> Option<Utf8PathBuf> {
    let wanted = format!("refs/heads/{branch}");
    porcelain
        .split("\n\n")
        .skip(1)
        .find(|block| {
            block
                .lines()
                .any(|line| line.strip_prefix("branch ") == Some(wanted.as_str()))
        })
        .and_then(|block| block.lines().find_map(|line| line.strip_prefix("worktree ")))
        .map(Utf8PathBuf::from)
}

#[async_trait]
impl GitOps for GitCli {
    async fn worktree_for_branch(
        &self,
        repo: &Utf8Path,
        branch: &BranchName,
    ) -> GitResult<Option<Utf8PathBuf>> {
        let listing = self
            .run_checked(repo, &["worktree", "list", "--porcelain"])
            .await?;
        Ok(linked_worktree_for(&listing, branch))
    }

    async fn add_worktree(
        &self,
        repo: &Utf8Path,
        path: &Utf8Path,
        branch: &BranchName,
        start_point: Option<&BranchName>,
    ) -> GitResult<()> {
        match start_point {
            Some(start) => {
                self.run_checked(
                    repo,
                    &[
                        "worktree",
                        "add",
                        "-b",
                        branch.as_str(),
                        path.as_str(),
                        start.as_str(),
                    ],
                )
                .await?;
            }
            None => {
                self.run_checked(repo, &["worktree", "add", path.as_str(), branch.as_str()])
                    .await?;
            }
        }
        Ok(())
    }

    async fn remove_worktree(&self, repo: &Utf8Path, path: &Utf8Path) -> GitResult<()> {
        self.run_checked(repo, &["worktree", "remove", "--force", path.as_str()])
            .await
            .map(drop)
    }

    async fn prune_worktrees(&self, repo: &Utf8Path) -> GitResult<()> {
        self.run_checked(repo, &["worktree", "prune"]).await.map(drop)
    }

    async fn current_branch(&self, repo: &Utf8Path) -> GitResult<Option<BranchName>> {
        let args = ["symbolic-ref", "--quiet", "--short", "HEAD"];
        let output = self.run(repo, &args).await?;
        if output.exit_code == 1 && output.stdout_trimmed().is_empty() {
            return Ok(None);
        }
        if !output.success() {
            return Err(command_failed(&args, &output));
        }
        BranchName::new(output.stdout_trimmed())
            .map(Some)
            .map_err(|_| GitError::InvalidOutput {
                command: "symbolic-ref".to_owned(),
                output: output.stdout.clone(),
            })
    }

    async fn stash_push(&self, repo: &Utf8Path) -> GitResult<bool> {
        let status = self.run_checked(repo, &["status", "--porcelain"]).await?;
        if status.is_empty() {
            return Ok(false);
        }
        self.run_checked(
            repo,
            &["stash", "push", "--include-untracked", "-m", STASH_MESSAGE],
        )
        .await?;
        Ok(true)
    }

    async fn stash_pop(&self, repo: &Utf8Path) -> GitResult<()> {
        self.run_checked(repo, &["stash", "pop"]).await.map(drop)
    }

    async fn checkout(&self, repo: &Utf8Path, branch: &BranchName) -> GitResult<()> {
        self.run_checked(repo, &["checkout", branch.as_str(), "--"])
            .await
            .map(drop)
    }

    async fn rebase(&self, repo: &Utf8Path, onto: &BranchName) -> GitResult<RebaseOutcome> {
        let args = ["rebase", onto.as_str()];
        let output = self.run(repo, &args).await?;
        if output.success() {
            return Ok(RebaseOutcome::Rebased);
        }
        let conflicted = self
            .run_checked(repo, &["diff", "--name-only", "--diff-filter=U"])
            .await?;
        let files: Vec<String> = conflicted.lines().map(str::to_owned).collect();
        if files.is_empty() {
            return Err(command_failed(&args, &output));
        }
        Ok(RebaseOutcome::Conflict(files))
    }

    async fn abort_rebase(&self, repo: &Utf8Path) -> GitResult<()> {
        self.run_checked(repo, &["rebase", "--abort"]).await.map(drop)
    }

    async fn merge_fast_forward(
        &self,
        repo: &Utf8Path,
        branch: &BranchName,
    ) -> GitResult<FastForwardOutcome> {
        let ancestry = ["merge-base", "--is-ancestor", "HEAD", branch.as_str()];
        let output = self.run(repo, &ancestry).await?;
        match output.exit_code {
            0 => {}
            1 => return Ok(FastForwardOutcome::NotFastForward),
            _ => return Err(command_failed(&ancestry, &output)),
        }
        self.run_checked(repo, &["merge", "--ff-only", branch.as_str()])
            .await?;
        let head = self.rev_parse(repo, "HEAD").await?;
        Ok(FastForwardOutcome::Merged(head))
    }

    async fn rev_parse(&self, repo: &Utf8Path, rev: &str) -> GitResult<CommitSha> {
        let spec = format!("{rev}^{{commit}}");
        let raw = self
            .run_checked(repo, &["rev-parse", "--verify", spec.as_str()])
            .await?;
        parse_sha("rev-parse", &raw)
    }

    async fn unreviewed_commits(
        &self,
        repo: &Utf8Path,
        integration: &BranchName,
        reviewed: Option<&CommitSha>,
        head: &BranchName,
    ) -> GitResult<Vec<CommitSha>> {
        let exclude = format!("^{integration}");
        let range = reviewed.map_or_else(
            || head.as_str().to_owned(),
            |sha| format!("{sha}...{head}"),
        );
        let mut args = vec!["rev-list", "--reverse", "--no-merges"];
        if reviewed.is_some() {
            args.extend(["--cherry-pick", "--right-only"]);
        }
        args.extend([range.as_str(), exclude.as_str()]);
        let listing = self.run_checked(repo, &args).await?;
        listing
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| parse_sha("rev-list", line))
            .collect()
    }

    async fn parent_count(&self, repo: &Utf8Path, rev: &str) -> GitResult<usize> {
        let line = self
            .run_checked(repo, &["rev-list", "--parents", "-n", "1", rev])
            .await?;
        let fields = line.split_whitespace().count();
        if fields == 0 {
            return Err(GitError::InvalidOutput {
                command: "rev-list".to_owned(),
                output: line,
            });
        }
        Ok(fields - 1)
    }

    async fn branch_exists(&self, repo: &Utf8Path, branch: &BranchName) -> GitResult<bool> {
        let reference = format!("refs/heads/{branch}");
        let args = ["show-ref", "--verify", "--quiet", reference.as_str()];
        let output = self.run(repo, &args).await?;
        match output.exit_code {
            0 => Ok(true),
            1 => Ok(false),
            _ => Err(command_failed(&args, &output)),
        }
    }

    async fn delete_branch(&self, repo: &Utf8Path, branch: &BranchName) -> GitResult<()> {
        self.run_checked(repo, &["branch", "-D", branch.as_str()])
            .await
            .map(drop)
    }
}
