//! Git plumbing used to find issue keys in commit subjects.

use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, warn};

use crate::error::{EvidenceError, Result};
use crate::identifiers::{IdPattern, IdentifierSet};

/// Runs a git subcommand and returns its trimmed stdout.
pub trait GitCommand {
    fn run(&self, args: &[&str]) -> Result<String>;
}

/// Invokes the `git` binary, optionally inside a fixed directory.
#[derive(Debug, Clone, Default)]
pub struct SystemGit {
    repo_dir: Option<PathBuf>,
}

impl SystemGit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_dir(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: Some(repo_dir.into()),
        }
    }
}

impl GitCommand for SystemGit {
    fn run(&self, args: &[&str]) -> Result<String> {
        let operation = args.join(" ");
        let mut command = Command::new("git");
        command.args(args);
        if let Some(dir) = &self.repo_dir {
            command.current_dir(dir);
        }
        debug!(operation = %operation, "running git");
        let output = command
            .output()
            .map_err(|error| EvidenceError::git(&operation, format!("failed to run git: {error}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let reason = if stderr.is_empty() {
                output.status.to_string()
            } else {
                stderr
            };
            return Err(EvidenceError::git(operation, reason));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchInfo {
    pub branch: String,
    pub head: String,
    /// First issue key in the latest commit subject, else in the branch name.
    pub seed: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    pub start: &'a str,
    pub pattern: &'a IdPattern,
    pub seed: Option<&'a str>,
    pub single_commit: bool,
}

pub struct GitService<G = SystemGit> {
    git: G,
    seed_pattern: IdPattern,
}

impl GitService<SystemGit> {
    pub fn system() -> Result<Self> {
        Self::new(SystemGit::new())
    }
}

impl<G: GitCommand> GitService<G> {
    pub fn new(git: G) -> Result<Self> {
        Ok(Self {
            git,
            seed_pattern: IdPattern::default_pattern()?,
        })
    }

    pub fn check_repository(&self) -> Result<()> {
        self.git
            .run(&["rev-parse", "--git-dir"])
            .map(|_| ())
            .map_err(|_| EvidenceError::git("rev-parse --git-dir", "not in a git repository"))
    }

    pub fn validate_head(&self) -> Result<()> {
        self.git
            .run(&["rev-parse", "--verify", "HEAD"])
            .map(|_| ())
            .map_err(|_| {
                EvidenceError::git(
                    "rev-parse --verify HEAD",
                    "repository may be empty or corrupted",
                )
            })
    }

    /// Format check first so malformed input never reaches git.
    pub fn validate_reference(&self, reference: &str) -> Result<()> {
        validate_commit_hash(reference)?;
        self.git
            .run(&["rev-parse", "--verify", reference])
            .map(|_| ())
            .map_err(|_| {
                EvidenceError::git(
                    "rev-parse --verify",
                    format!("commit '{reference}' not found"),
                )
            })
    }

    pub fn branch_info(&self) -> Result<BranchInfo> {
        let branch = self.git.run(&["branch", "--show-current"])?;
        let latest = self.git.run(&["log", "-1", "--format=%H%n%s"])?;
        let (head, subject) = latest
            .split_once('\n')
            .unwrap_or((latest.as_str(), ""));
        let head = head.trim();
        if head.is_empty() {
            return Err(EvidenceError::git("log -1", "unexpected output format"));
        }
        let seed = self
            .seed_pattern
            .find_first(subject)
            .or_else(|| self.seed_pattern.find_first(&branch))
            .map(ToString::to_string);

        Ok(BranchInfo {
            branch,
            head: head.to_string(),
            seed,
        })
    }

    /// Single-commit mode scans only `start`'s subject and ignores the seed;
    /// range mode scans `start..HEAD` and unions the seed in first.
    pub fn extract_identifiers(&self, request: &ExtractionRequest<'_>) -> Result<Vec<String>> {
        self.validate_reference(request.start)?;

        let messages = if request.single_commit {
            self.git
                .run(&["log", "-1", "--pretty=format:%s", request.start])?
        } else {
            let range = format!("{}..HEAD", request.start);
            self.git.run(&["log", "--pretty=format:%s", &range])?
        };

        let mut identifiers = IdentifierSet::new();
        if !request.single_commit
            && let Some(seed) = request.seed
            && request.pattern.matches_whole(seed)
        {
            identifiers.insert(seed);
        }
        identifiers.extend_from_text(&messages, request.pattern);

        if identifiers.is_empty() {
            if request.single_commit {
                warn!(commit = request.start, "no issue keys found in commit");
            } else {
                warn!(
                    range = %format!("{}..HEAD", request.start),
                    "no issue keys found in commit range"
                );
            }
        }

        Ok(identifiers.into_vec())
    }
}

/// Commit references must be non-empty hexadecimal (short hashes allowed).
pub fn validate_commit_hash(hash: &str) -> Result<()> {
    if hash.is_empty() {
        return Err(EvidenceError::validation("commit", hash, "cannot be empty"));
    }
    if !hash.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(EvidenceError::validation("commit", hash, "invalid format"));
    }
    Ok(())
}
