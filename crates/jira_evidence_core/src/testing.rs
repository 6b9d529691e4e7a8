//! In-crate fakes for the git and tracker seams.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{Result, bail};

use crate::error::EvidenceError;
use crate::git::GitCommand;
use crate::tracker::{Issue, IssueTrackerApi};

/// Answers git invocations from a table keyed by the space-joined args.
/// Clones share one call log.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeGit {
    responses: HashMap<String, Option<String>>,
    calls: Rc<RefCell<Vec<String>>>,
}

impl FakeGit {
    pub(crate) fn with(mut self, command: &str, output: &str) -> Self {
        self.responses
            .insert(command.to_string(), Some(output.to_string()));
        self
    }

    pub(crate) fn failing(mut self, command: &str) -> Self {
        self.responses.insert(command.to_string(), None);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl GitCommand for FakeGit {
    fn run(&self, args: &[&str]) -> crate::error::Result<String> {
        let command = args.join(" ");
        self.calls.borrow_mut().push(command.clone());
        match self.responses.get(&command) {
            Some(Some(output)) => Ok(output.clone()),
            Some(None) => Err(EvidenceError::git(command, "exit status: 128")),
            None => Err(EvidenceError::git(command, "unexpected command")),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct StubTracker {
    issues: HashMap<String, Issue>,
    requests: usize,
}

impl StubTracker {
    pub(crate) fn with_issue(mut self, issue: Issue) -> Self {
        self.issues.insert(issue.key.clone(), issue);
        self
    }
}

impl IssueTrackerApi for StubTracker {
    fn get_issue(&mut self, key: &str) -> Result<Issue> {
        self.requests += 1;
        match self.issues.get(key) {
            Some(issue) => Ok(issue.clone()),
            None => bail!("issue {key} not found (HTTP 404)"),
        }
    }

    fn browse_url(&self, key: &str) -> Option<String> {
        Some(format!("https://tracker.test/browse/{key}"))
    }

    fn request_count(&self) -> usize {
        self.requests
    }
}
