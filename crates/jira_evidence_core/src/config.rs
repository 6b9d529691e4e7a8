use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::EvidenceError;
use crate::identifiers::DEFAULT_ID_PATTERN;
use crate::tracker::{DEFAULT_TIMEOUT_MS, DEFAULT_USER_AGENT, JiraClientConfig, TrackerCredentials};

pub const DEFAULT_OUTPUT_FILE: &str = "transformed_jira_data.json";
pub const DEFAULT_MARKDOWN_FILE: &str = "transformed_jira_data.md";
pub const DEFAULT_CONFIG_FILE: &str = ".jira-evidence.toml";

/// Optional on-disk defaults. The API token is never read from here.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct FileConfig {
    #[serde(default)]
    pub tracker: TrackerSection,
    #[serde(default)]
    pub evidence: EvidenceSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct TrackerSection {
    pub url: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct EvidenceSection {
    pub id_pattern: Option<String>,
    pub output_file: Option<String>,
    pub markdown_output: Option<String>,
}

/// Load and parse a FileConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<FileConfig> {
    if !config_path.exists() {
        return Ok(FileConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: FileConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

/// Values given on the command line; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct FlagOverrides {
    pub id_pattern: Option<String>,
    pub output_file: Option<PathBuf>,
    pub markdown_output: Option<PathBuf>,
}

/// Run configuration, resolved once: flag > env > config file > default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub tracker_url: Option<String>,
    pub tracker_username: Option<String>,
    pub api_token: Option<String>,
    pub id_pattern: String,
    pub output_file: PathBuf,
    /// Set only when a narrative path was given explicitly.
    pub markdown_output: Option<PathBuf>,
    pub user_agent: String,
    pub timeout_ms: u64,
}

impl Settings {
    pub fn resolve<F>(flags: &FlagOverrides, file: &FileConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_value = |name: &str| lookup(name).and_then(|value| non_empty(&value));

        let id_pattern = first_non_empty([
            flags.id_pattern.clone(),
            env_value("JIRA_ID_REGEX"),
            file.evidence.id_pattern.clone(),
        ])
        .unwrap_or_else(|| DEFAULT_ID_PATTERN.to_string());

        let output_file = flags
            .output_file
            .clone()
            .or_else(|| {
                first_non_empty([env_value("OUTPUT_FILE"), file.evidence.output_file.clone()])
                    .map(PathBuf::from)
            })
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_FILE));

        let markdown_output = flags.markdown_output.clone().or_else(|| {
            first_non_empty([file.evidence.markdown_output.clone()]).map(PathBuf::from)
        });

        Self {
            tracker_url: first_non_empty([env_value("JIRA_URL"), file.tracker.url.clone()]),
            tracker_username: first_non_empty([
                env_value("JIRA_USERNAME"),
                file.tracker.username.clone(),
            ]),
            api_token: env_value("JIRA_API_TOKEN"),
            id_pattern,
            output_file,
            markdown_output,
            user_agent: env_value("JIRA_USER_AGENT")
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            timeout_ms: env_value("JIRA_HTTP_TIMEOUT_MS")
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(DEFAULT_TIMEOUT_MS),
        }
    }

    /// Resolve against the process environment and the config file it names.
    pub fn from_process(flags: &FlagOverrides) -> Result<Self> {
        let config_path = config_path_from_env();
        let file = load_config(&config_path)?;
        Ok(Self::resolve(flags, &file, |name| env::var(name).ok()))
    }

    pub fn tracker_credentials(&self) -> std::result::Result<TrackerCredentials, EvidenceError> {
        TrackerCredentials::from_parts(
            self.tracker_url.as_deref(),
            self.tracker_username.as_deref(),
            self.api_token.as_deref(),
        )
    }

    pub fn jira_client_config(&self) -> std::result::Result<JiraClientConfig, EvidenceError> {
        Ok(JiraClientConfig {
            credentials: self.tracker_credentials()?,
            user_agent: self.user_agent.clone(),
            timeout_ms: self.timeout_ms,
        })
    }

    pub fn markdown_output_path(&self) -> PathBuf {
        self.markdown_output
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MARKDOWN_FILE))
    }
}

fn config_path_from_env() -> PathBuf {
    env::var("JIRA_EVIDENCE_CONFIG")
        .ok()
        .and_then(|value| non_empty(&value))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn first_non_empty<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find_map(|value| non_empty(&value))
}
