use serde::{Deserialize, Deserializer, Serialize};

/// Status (and issue type) carried by tasks whose fetch failed.
pub const ERROR_STATUS: &str = "Error";
pub const ERROR_TYPE: &str = "Error";
/// Prefix of every error task description.
pub const ERROR_MARKER: &str = "Error:";
/// Description used when the tracker answered without issue fields.
pub const MISSING_ISSUE_REASON: &str = "Could not retrieve issue";

/// Timestamp layout used by the tracker, e.g. `2020-01-01T12:11:56.063+0530`.
pub const TRACKER_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Evidence predicate handed to the signing step.
///
/// ```json
/// {
///   "tasks": [
///     {
///       "key": "EV-1",
///       "link": "https://example.atlassian.net/browse/EV-1",
///       "status": "QA in Progress",
///       "description": "...",
///       "type": "Task",
///       "project": "EV",
///       "created": "2020-01-01T12:11:56.063+0530",
///       "updated": "2020-01-01T12:12:01.876+0530",
///       "assignee": "Jane Doe",
///       "reporter": "John Doe",
///       "priority": "Medium",
///       "transitions": [
///         {
///           "from_status": "To Do",
///           "to_status": "In Progress",
///           "author": "Jane Doe",
///           "author_user_name": "jane@example.com",
///           "transition_time": "2020-07-28T16:39:54.620+0530"
///         }
///       ]
///     }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tasks: Vec<TaskResult>,
}

impl EvidenceResponse {
    pub fn new(tasks: Vec<TaskResult>) -> Self {
        Self { tasks }
    }

    pub fn error_count(&self) -> usize {
        self.tasks.iter().filter(|task| task.is_error()).count()
    }

    /// Canonical structured form: two-space indented JSON.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(input: &str) -> serde_json::Result<Self> {
        serde_json::from_str(input)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub link: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub issue_type: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub reporter: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub transitions: Vec<Transition>,
}

impl TaskResult {
    /// Build the record for an identifier whose fetch failed.
    pub fn error(key: &str, reason: &str) -> Self {
        Self {
            key: key.to_string(),
            link: String::new(),
            status: ERROR_STATUS.to_string(),
            description: format!("{ERROR_MARKER} {reason}"),
            issue_type: ERROR_TYPE.to_string(),
            project: String::new(),
            created: String::new(),
            updated: String::new(),
            assignee: None,
            reporter: String::new(),
            priority: String::new(),
            transitions: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ERROR_STATUS
    }

    pub fn link(&self) -> Option<&str> {
        if self.link.is_empty() {
            None
        } else {
            Some(&self.link)
        }
    }

    /// Assignee for display; an absent or blank assignee is "Unassigned".
    pub fn assignee_display(&self) -> &str {
        match self.assignee.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => "Unassigned",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    #[serde(default)]
    pub from_status: String,
    #[serde(default)]
    pub to_status: String,
    #[serde(default)]
    pub author: String,
    #[serde(rename = "author_user_name", default)]
    pub author_email: String,
    #[serde(default)]
    pub transition_time: String,
}

// Older evidence files wrote `null` for empty lists.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
