//! Structured and narrative renderings of an evidence response.
//!
//! Both renderings are pure functions of the response (plus the generation
//! timestamp for the narrative), so the same input always yields the same
//! bytes.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use crate::model::{EvidenceResponse, TRACKER_TIME_FORMAT, TaskResult};
use crate::output::write_artifact;

pub const REPORT_TITLE: &str = "JIRA Tasks Report";
const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEvidence {
    pub json: String,
    pub markdown: String,
}

pub fn render(response: &EvidenceResponse, generated_at: &str) -> Result<RenderedEvidence> {
    let json = response
        .to_json_pretty()
        .context("failed to serialize evidence JSON")?;
    Ok(RenderedEvidence {
        json,
        markdown: render_markdown(response, generated_at),
    })
}

pub fn generation_timestamp() -> String {
    Local::now().format(DISPLAY_TIME_FORMAT).to_string()
}

/// `N/A` for empty input, `YYYY-MM-DD HH:MM:SS` for tracker timestamps,
/// anything else unchanged.
pub fn format_date(value: &str) -> String {
    if value.is_empty() {
        return "N/A".to_string();
    }
    match DateTime::parse_from_str(value, TRACKER_TIME_FORMAT) {
        Ok(parsed) => parsed.format(DISPLAY_TIME_FORMAT).to_string(),
        Err(_) => value.to_string(),
    }
}

pub fn render_markdown(response: &EvidenceResponse, generated_at: &str) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {REPORT_TITLE}\n\n"));
    output.push_str(&format!("Generated on: {generated_at}\n\n"));
    output.push_str(&format!("Total tasks: {}\n\n", response.tasks.len()));

    output.push_str("## Summary\n\n");
    output.push_str("| Key | Status | Type | Priority | Assignee |\n");
    output.push_str("|-----|--------|------|----------|----------|\n");
    for task in &response.tasks {
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            key_display(task),
            cell(&task.status),
            cell(&task.issue_type),
            cell(&task.priority),
            cell(task.assignee_display()),
        ));
    }
    output.push('\n');

    output.push_str("## Task Details\n\n");
    for (index, task) in response.tasks.iter().enumerate() {
        push_task_details(&mut output, index + 1, task);
    }

    output.push_str("## Status Distribution\n\n");
    output.push_str("| Status | Count |\n");
    output.push_str("|--------|-------|\n");
    for (status, count) in status_distribution(response) {
        output.push_str(&format!("| {} | {count} |\n", cell(status)));
    }

    output
}

fn push_task_details(output: &mut String, position: usize, task: &TaskResult) {
    output.push_str(&format!("### {position}. {}\n\n", key_display(task)));

    output.push_str("**Basic Information:**\n");
    output.push_str(&format!("- **Status:** {}\n", task.status));
    output.push_str(&format!("- **Type:** {}\n", task.issue_type));
    output.push_str(&format!("- **Project:** {}\n", task.project));
    output.push_str(&format!("- **Priority:** {}\n", task.priority));

    output.push_str("\n**People:**\n");
    output.push_str(&format!("- **Assignee:** {}\n", task.assignee_display()));
    output.push_str(&format!("- **Reporter:** {}\n", task.reporter));

    output.push_str("\n**Dates:**\n");
    output.push_str(&format!("- **Created:** {}\n", format_date(&task.created)));
    output.push_str(&format!("- **Updated:** {}\n", format_date(&task.updated)));

    if !task.description.is_empty() {
        output.push_str("\n**Description:**\n");
        output.push_str(&format!("> {}\n", task.description.replace('\n', "\n> ")));
    }

    if !task.transitions.is_empty() {
        output.push_str("\n**Transition History:**\n\n");
        output.push_str("| From Status | To Status | Author | Date |\n");
        output.push_str("|-------------|-----------|--------|------|\n");
        for transition in &task.transitions {
            output.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                cell(&transition.from_status),
                cell(&transition.to_status),
                cell(&transition.author),
                format_date(&transition.transition_time),
            ));
        }
    }

    output.push_str("\n---\n\n");
}

/// Tasks per status, ordered by status name.
pub fn status_distribution(response: &EvidenceResponse) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for task in &response.tasks {
        *counts.entry(task.status.as_str()).or_insert(0) += 1;
    }
    counts
}

fn key_display(task: &TaskResult) -> String {
    match task.link() {
        Some(link) => format!("[{}]({link})", task.key),
        None => task.key.clone(),
    }
}

fn cell(value: &str) -> String {
    value.replace('|', "\\|").replace(['\r', '\n'], " ")
}

/// Render the narrative report for an existing evidence file.
/// Returns the number of tasks rendered.
pub fn generate_markdown_from_file(input: &Path, output: &Path) -> Result<usize> {
    let raw = fs::read_to_string(input)
        .with_context(|| format!("failed to read evidence file {}", input.display()))?;
    let response = EvidenceResponse::from_json(&raw)
        .with_context(|| format!("failed to parse evidence file {}", input.display()))?;
    let markdown = render_markdown(&response, &generation_timestamp());
    write_artifact(output, markdown.as_bytes())?;
    Ok(response.tasks.len())
}
