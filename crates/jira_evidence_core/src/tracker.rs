use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{TimeZone, Utc};
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::aggregate::{TaskOutcome, assemble};
use crate::error::EvidenceError;
use crate::model::{EvidenceResponse, MISSING_ISSUE_REASON, TRACKER_TIME_FORMAT, TaskResult, Transition};

pub const DEFAULT_USER_AGENT: &str = "jira-evidence/0.1";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerCredentials {
    pub base_url: String,
    pub username: String,
    pub api_token: String,
}

impl TrackerCredentials {
    /// Missing values are reported by environment-variable name, token first.
    pub fn from_parts(
        base_url: Option<&str>,
        username: Option<&str>,
        api_token: Option<&str>,
    ) -> Result<Self, EvidenceError> {
        let api_token = required("JIRA_API_TOKEN", api_token)?;
        let base_url = required("JIRA_URL", base_url)?;
        let username = required("JIRA_USERNAME", username)?;
        Ok(Self {
            base_url,
            username,
            api_token,
        })
    }
}

fn required(field: &str, value: Option<&str>) -> Result<String, EvidenceError> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(EvidenceError::validation(
            field,
            "",
            "environment variable is required",
        )),
    }
}

pub trait IssueTrackerApi {
    /// Fetch one issue with its full change history.
    fn get_issue(&mut self, key: &str) -> Result<Issue>;
    /// Human-facing link for an issue, when the tracker has one.
    fn browse_url(&self, key: &str) -> Option<String>;
    fn request_count(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct JiraClientConfig {
    pub credentials: TrackerCredentials,
    pub user_agent: String,
    pub timeout_ms: u64,
}

pub struct JiraClient {
    client: Client,
    config: JiraClientConfig,
    base_url: Url,
    request_count: usize,
}

impl JiraClient {
    pub fn new(config: JiraClientConfig) -> Result<Self> {
        let base_url = Url::parse(config.credentials.base_url.trim_end_matches('/'))
            .with_context(|| format!("invalid JIRA_URL: {}", config.credentials.base_url))?;
        if base_url.cannot_be_a_base() {
            bail!("invalid JIRA_URL: {}", config.credentials.base_url);
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build Jira HTTP client")?;
        Ok(Self {
            client,
            config,
            base_url,
            request_count: 0,
        })
    }

    fn issue_url(&self, key: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("invalid JIRA_URL: {}", self.base_url))?
            .pop_if_empty()
            .extend(["rest", "api", "3", "issue", key]);
        Ok(url)
    }
}

impl IssueTrackerApi for JiraClient {
    fn get_issue(&mut self, key: &str) -> Result<Issue> {
        let url = self.issue_url(key)?;
        self.request_count += 1;
        debug!(key, url = %url, "fetching issue");

        let response = self
            .client
            .get(url)
            .basic_auth(
                &self.config.credentials.username,
                Some(&self.config.credentials.api_token),
            )
            .header("User-Agent", self.config.user_agent.clone())
            .header("Accept", "application/json")
            .query(&[("expand", "changelog")])
            .send()
            .with_context(|| format!("failed to call Jira API for {key}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("{}", describe_failure(key, status, &body));
        }

        response
            .json::<Issue>()
            .with_context(|| format!("failed to decode Jira issue response for {key}"))
    }

    fn browse_url(&self, key: &str) -> Option<String> {
        let base = self.config.credentials.base_url.trim_end_matches('/');
        if base.is_empty() {
            return None;
        }
        Some(format!("{base}/browse/{key}"))
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

fn describe_failure(key: &str, status: StatusCode, body: &str) -> String {
    let messages = serde_json::from_str::<ErrorBody>(body)
        .map(|parsed| parsed.error_messages)
        .unwrap_or_default();
    let summary = match status {
        StatusCode::NOT_FOUND => format!("issue {key} not found"),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            format!("not authorized to read issue {key}")
        }
        _ => format!("request for issue {key} failed"),
    };
    if messages.is_empty() {
        format!("{summary} (HTTP {})", status.as_u16())
    } else {
        format!("{summary} (HTTP {}): {}", status.as_u16(), messages.join("; "))
    }
}

/// Fetch every key in order, one call at a time.
///
/// A failing key becomes an error task; it never stops the batch.
pub fn fetch_details<A: IssueTrackerApi>(api: &mut A, keys: &[String]) -> EvidenceResponse {
    let mut outcomes = Vec::with_capacity(keys.len());
    for key in keys {
        let outcome = match api.get_issue(key) {
            Ok(issue) => match &issue.fields {
                Some(fields) => {
                    let resolved_key = if issue.key.is_empty() {
                        key.as_str()
                    } else {
                        issue.key.as_str()
                    };
                    let link = api.browse_url(resolved_key);
                    TaskOutcome::Fetched(normalize_issue(resolved_key, fields, &issue, link))
                }
                None => TaskOutcome::Failed {
                    key: key.clone(),
                    reason: MISSING_ISSUE_REASON.to_string(),
                },
            },
            Err(error) => {
                warn!(key = %key, error = %format!("{error:#}"), "failed to fetch issue");
                TaskOutcome::Failed {
                    key: key.clone(),
                    reason: format!("{error:#}"),
                }
            }
        };
        outcomes.push(outcome);
    }
    assemble(outcomes)
}

fn normalize_issue(
    key: &str,
    fields: &IssueFields,
    issue: &Issue,
    link: Option<String>,
) -> TaskResult {
    TaskResult {
        key: key.to_string(),
        link: link.unwrap_or_default(),
        status: named(&fields.status),
        description: description_text(&fields.description),
        issue_type: named(&fields.issue_type),
        project: fields
            .project
            .as_ref()
            .map(|project| project.key.clone())
            .unwrap_or_default(),
        created: timestamp_text(&fields.created),
        updated: timestamp_text(&fields.updated),
        assignee: fields
            .assignee
            .as_ref()
            .map(|user| user.display_name.clone()),
        reporter: fields
            .reporter
            .as_ref()
            .map(|user| user.display_name.clone())
            .unwrap_or_default(),
        priority: named(&fields.priority),
        transitions: status_transitions(issue.changelog.as_ref()),
    }
}

fn named(value: &Option<NamedRef>) -> String {
    value
        .as_ref()
        .map(|named| named.name.clone())
        .unwrap_or_default()
}

/// Status changes in changelog order; other field changes are skipped.
pub fn status_transitions(changelog: Option<&Changelog>) -> Vec<Transition> {
    let Some(changelog) = changelog else {
        return Vec::new();
    };
    let mut transitions = Vec::new();
    for history in &changelog.histories {
        for item in &history.items {
            if item.field != "status" {
                continue;
            }
            let author = history.author.as_ref();
            transitions.push(Transition {
                from_status: item.from_text.clone().unwrap_or_default(),
                to_status: item.to_text.clone().unwrap_or_default(),
                author: author
                    .map(|user| user.display_name.clone())
                    .unwrap_or_default(),
                author_email: author
                    .map(|user| user.email_address.clone())
                    .unwrap_or_default(),
                transition_time: timestamp_text(&history.created),
            });
        }
    }
    transitions
}

/// Text of a tracker timestamp; epoch milliseconds are rendered in the
/// tracker layout (UTC).
pub fn timestamp_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Number(number) => number
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .map(|time| time.format(TRACKER_TIME_FORMAT).to_string())
            .unwrap_or_else(|| number.to_string()),
        other => other.to_string(),
    }
}

/// Rich-text document node (Atlassian document format subset).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DocumentNode {
    Doc {
        #[serde(default, deserialize_with = "lossy_nodes")]
        content: Vec<DocumentNode>,
    },
    Paragraph {
        #[serde(default, deserialize_with = "lossy_nodes")]
        content: Vec<DocumentNode>,
    },
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(other)]
    Other,
}

impl DocumentNode {
    /// Nodes that fail to decode are treated as unknown.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or(Self::Other)
    }

    pub fn plain_text(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Other => String::new(),
            Self::Doc { content } | Self::Paragraph { content } => {
                content.iter().map(DocumentNode::plain_text).collect()
            }
        }
    }
}

// A `null` or malformed child list never discards its siblings.
fn lossy_nodes<'de, D>(deserializer: D) -> Result<Vec<DocumentNode>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(DocumentNode::from_value)
        .collect())
}

/// Flatten a description to plain text.
///
/// Plain strings pass through. An object's `content` list is walked in
/// order collecting text leaves. Anything yielding no text falls back to
/// its JSON rendering.
pub fn description_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Object(fields) => {
            let flattened: Option<String> = fields
                .get("content")
                .and_then(Value::as_array)
                .map(|children| {
                    children
                        .iter()
                        .map(|child| DocumentNode::from_value(child.clone()).plain_text())
                        .collect()
                });
            match flattened {
                Some(text) if !text.is_empty() => text,
                _ => value.to_string(),
            }
        }
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Issue {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub fields: Option<IssueFields>,
    #[serde(default)]
    pub changelog: Option<Changelog>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueFields {
    #[serde(default)]
    pub status: Option<NamedRef>,
    #[serde(default)]
    pub description: Value,
    #[serde(default, rename = "issuetype")]
    pub issue_type: Option<NamedRef>,
    #[serde(default)]
    pub project: Option<ProjectRef>,
    #[serde(default)]
    pub created: Value,
    #[serde(default)]
    pub updated: Value,
    #[serde(default)]
    pub assignee: Option<TrackerUser>,
    #[serde(default)]
    pub reporter: Option<TrackerUser>,
    #[serde(default)]
    pub priority: Option<NamedRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedRef {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectRef {
    #[serde(default)]
    pub key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerUser {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email_address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Changelog {
    #[serde(default)]
    pub histories: Vec<History>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct History {
    #[serde(default)]
    pub author: Option<TrackerUser>,
    #[serde(default)]
    pub created: Value,
    #[serde(default)]
    pub items: Vec<ChangeItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeItem {
    #[serde(default)]
    pub field: String,
    #[serde(default, rename = "fromString")]
    pub from_text: Option<String>,
    #[serde(default, rename = "toString")]
    pub to_text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    error_messages: Vec<String>,
}
