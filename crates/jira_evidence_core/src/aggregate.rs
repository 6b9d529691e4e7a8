use crate::model::{EvidenceResponse, TaskResult};

/// Result of one fetch attempt, success or captured failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Fetched(TaskResult),
    Failed { key: String, reason: String },
}

impl TaskOutcome {
    pub fn into_task(self) -> TaskResult {
        match self {
            Self::Fetched(task) => task,
            Self::Failed { key, reason } => TaskResult::error(&key, &reason),
        }
    }
}

/// Fold outcomes into a response, keeping the order they were produced in.
pub fn assemble<I>(outcomes: I) -> EvidenceResponse
where
    I: IntoIterator<Item = TaskOutcome>,
{
    EvidenceResponse::new(outcomes.into_iter().map(TaskOutcome::into_task).collect())
}
