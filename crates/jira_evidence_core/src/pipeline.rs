//! Steps shared by the git and direct-key runs.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{info, warn};

use crate::error::EvidenceError;
use crate::git::{BranchInfo, ExtractionRequest, GitCommand, GitService};
use crate::identifiers::IdPattern;
use crate::model::EvidenceResponse;
use crate::output::write_artifact;
use crate::report::render;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preflight {
    Ready,
    /// Routine repository state; the run stops without failing.
    SoftFail(EvidenceError),
}

/// Repository, HEAD and start-reference checks, in that order.
///
/// Git-level failures are soft; a malformed reference stays a hard
/// validation error.
pub fn preflight_repository<G: GitCommand>(
    git: &GitService<G>,
    start: &str,
) -> std::result::Result<Preflight, EvidenceError> {
    let checked = git
        .check_repository()
        .and_then(|()| git.validate_head())
        .and_then(|()| git.validate_reference(start));
    match checked {
        Ok(()) => Ok(Preflight::Ready),
        Err(error) if error.is_git() => {
            warn!(error = %error, "repository not ready, nothing to do");
            Ok(Preflight::SoftFail(error))
        }
        Err(error) => Err(error),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub branch: BranchInfo,
    pub identifiers: Vec<String>,
}

pub fn extract<G: GitCommand>(
    git: &GitService<G>,
    start: &str,
    pattern: &IdPattern,
    single_commit: bool,
) -> std::result::Result<Extraction, EvidenceError> {
    let branch = git.branch_info()?;
    let identifiers = git.extract_identifiers(&ExtractionRequest {
        start,
        pattern,
        seed: branch.seed.as_deref(),
        single_commit,
    })?;
    Ok(Extraction {
        branch,
        identifiers,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedEvidence {
    pub json_path: PathBuf,
    pub markdown_path: Option<PathBuf>,
}

/// Write the structured file and, when asked, the narrative next to it.
pub fn save_evidence(
    response: &EvidenceResponse,
    output: &Path,
    markdown: Option<&Path>,
    generated_at: &str,
) -> Result<SavedEvidence> {
    let rendered = render(response, generated_at)?;
    write_artifact(output, rendered.json.as_bytes())?;
    info!(path = %output.display(), tasks = response.tasks.len(), "wrote evidence");

    if let Some(path) = markdown {
        write_artifact(path, rendered.markdown.as_bytes())?;
        info!(path = %path.display(), "wrote narrative report");
    }

    Ok(SavedEvidence {
        json_path: output.to_path_buf(),
        markdown_path: markdown.map(Path::to_path_buf),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub tasks: usize,
    pub errors: usize,
    pub requests: usize,
}

impl RunSummary {
    pub fn new(response: &EvidenceResponse, requests: usize) -> Self {
        Self {
            tasks: response.tasks.len(),
            errors: response.error_count(),
            requests,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tasks: {}, errors: {}, tracker requests: {}",
            self.tasks, self.errors, self.requests
        )
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::testing::{FakeGit, StubTracker};
    use crate::tracker::{Issue, IssueFields, IssueTrackerApi, NamedRef, fetch_details};

    fn ready_git() -> FakeGit {
        FakeGit::default()
            .with("rev-parse --git-dir", ".git")
            .with("rev-parse --verify HEAD", "fedcba98")
            .with("rev-parse --verify abc123", "abc123")
    }

    fn issue(key: &str, status: &str) -> Issue {
        Issue {
            key: key.to_string(),
            fields: Some(IssueFields {
                status: Some(NamedRef {
                    name: status.to_string(),
                }),
                ..IssueFields::default()
            }),
            changelog: None,
        }
    }

    #[test]
    fn preflight_passes_on_ready_repository() {
        let service = GitService::new(ready_git()).expect("service");
        assert_eq!(
            preflight_repository(&service, "abc123").expect("preflight"),
            Preflight::Ready
        );
    }

    #[test]
    fn preflight_soft_fails_outside_repository_and_stops_early() {
        let git = FakeGit::default().failing("rev-parse --git-dir");
        let service = GitService::new(git.clone()).expect("service");
        let outcome = preflight_repository(&service, "abc123").expect("preflight");
        assert!(matches!(outcome, Preflight::SoftFail(ref error) if error.is_git()));
        assert_eq!(git.calls(), vec!["rev-parse --git-dir"]);
    }

    #[test]
    fn preflight_soft_fails_on_empty_history_and_unknown_commit() {
        let empty = FakeGit::default()
            .with("rev-parse --git-dir", ".git")
            .failing("rev-parse --verify HEAD");
        let service = GitService::new(empty).expect("service");
        assert!(matches!(
            preflight_repository(&service, "abc123").expect("preflight"),
            Preflight::SoftFail(_)
        ));

        let unknown = FakeGit::default()
            .with("rev-parse --git-dir", ".git")
            .with("rev-parse --verify HEAD", "fedcba98")
            .failing("rev-parse --verify abc123");
        let service = GitService::new(unknown).expect("service");
        assert!(matches!(
            preflight_repository(&service, "abc123").expect("preflight"),
            Preflight::SoftFail(_)
        ));
    }

    #[test]
    fn preflight_keeps_malformed_reference_fatal() {
        let service = GitService::new(ready_git()).expect("service");
        let error = preflight_repository(&service, "main").expect_err("malformed");
        assert_eq!(error.field(), Some("commit"));
    }

    #[test]
    fn range_run_extracts_fetches_and_saves() {
        let git = ready_git()
            .with("branch --show-current", "feature/EV-1")
            .with("log -1 --format=%H%n%s", "fedcba98\nEV-2 second")
            .with(
                "log --pretty=format:%s abc123..HEAD",
                "EV-2 second\nEV-1 first\nEV-1 repeated",
            );
        let service = GitService::new(git).expect("service");
        let pattern = IdPattern::default_pattern().expect("pattern");

        assert_eq!(
            preflight_repository(&service, "abc123").expect("preflight"),
            Preflight::Ready
        );
        let extraction = extract(&service, "abc123", &pattern, false).expect("extract");
        assert_eq!(extraction.branch.branch, "feature/EV-1");
        assert_eq!(extraction.identifiers, vec!["EV-2", "EV-1"]);

        let mut api = StubTracker::default().with_issue(issue("EV-2", "Done"));
        let response = fetch_details(&mut api, &extraction.identifiers);
        let summary = RunSummary::new(&response, api.request_count());
        assert_eq!(
            summary,
            RunSummary {
                tasks: 2,
                errors: 1,
                requests: 2
            }
        );
        assert_eq!(summary.to_string(), "tasks: 2, errors: 1, tracker requests: 2");

        let temp = tempdir().expect("tempdir");
        let json_path = temp.path().join("out").join("evidence.json");
        let markdown_path = temp.path().join("out").join("evidence.md");
        let saved = save_evidence(
            &response,
            &json_path,
            Some(&markdown_path),
            "2025-01-01 00:00:00",
        )
        .expect("save");

        assert_eq!(saved.markdown_path.as_deref(), Some(markdown_path.as_path()));
        let written = EvidenceResponse::from_json(&fs::read_to_string(&json_path).expect("json"))
            .expect("parse");
        assert_eq!(written, response);
        assert_eq!(written.tasks[0].link, "https://tracker.test/browse/EV-2");
        let markdown = fs::read_to_string(&markdown_path).expect("markdown");
        assert!(markdown.contains("Total tasks: 2"));
        assert!(markdown.contains("| Done | 1 |"));
        assert!(markdown.contains("| Error | 1 |"));
    }

    #[test]
    fn save_without_markdown_writes_only_json() {
        let temp = tempdir().expect("tempdir");
        let json_path = temp.path().join("evidence.json");
        let saved = save_evidence(&EvidenceResponse::default(), &json_path, None, "now")
            .expect("save");
        assert!(saved.markdown_path.is_none());
        assert_eq!(
            fs::read_to_string(&json_path).expect("json"),
            "{\n  \"tasks\": []\n}"
        );
        assert_eq!(fs::read_dir(temp.path()).expect("read dir").count(), 1);
    }
}
