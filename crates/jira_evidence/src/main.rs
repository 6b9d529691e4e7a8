use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::Parser;
use jira_evidence_core::config::{FlagOverrides, Settings};
use jira_evidence_core::git::GitService;
use jira_evidence_core::identifiers::IdPattern;
use jira_evidence_core::model::EvidenceResponse;
use jira_evidence_core::modes::{ExecutionConfig, ExecutionMode, ModeFlags, select_mode};
use jira_evidence_core::pipeline::{
    Preflight, RunSummary, extract, preflight_repository, save_evidence,
};
use jira_evidence_core::report::{generate_markdown_from_file, generation_timestamp};
use jira_evidence_core::telemetry::init_tracing;
use jira_evidence_core::tracker::{IssueTrackerApi, JiraClient, fetch_details};
use tracing::Level;

#[derive(Debug, Parser)]
#[command(
    name = "jira-evidence",
    version,
    about = "Collect Jira issue evidence for a commit, a commit range, or explicit issue keys"
)]
struct Cli {
    #[arg(
        short = 'r',
        long = "regex",
        value_name = "PATTERN",
        help = "Issue key pattern (default: [A-Z]+-[0-9]+)"
    )]
    regex: Option<String>,
    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Evidence JSON file (default: transformed_jira_data.json)"
    )]
    output: Option<PathBuf>,
    #[arg(long, help = "Only print the issue keys found in git history")]
    extract_only: bool,
    #[arg(
        long,
        help = "Legacy mode: <start_commit> <id_regex>, prints branch info and keys"
    )]
    extract_from_git: bool,
    #[arg(long, help = "Scan every commit after the start commit instead of just that commit")]
    range: bool,
    #[arg(long, help = "Render the markdown report from an existing evidence file")]
    markdown: bool,
    #[arg(
        long,
        value_name = "FILE",
        help = "Markdown report file (default: transformed_jira_data.md)"
    )]
    markdown_output: Option<PathBuf>,
    #[arg(value_name = "ARGS", help = "Start commit, or one or more issue keys")]
    args: Vec<String>,
}

impl Cli {
    fn overrides(&self) -> FlagOverrides {
        FlagOverrides {
            id_pattern: self.regex.clone(),
            output_file: self.output.clone(),
            markdown_output: self.markdown_output.clone(),
        }
    }

    fn mode_flags(&self) -> ModeFlags {
        ModeFlags {
            markdown: self.markdown,
            legacy_extract: self.extract_from_git,
            extract_only: self.extract_only,
            range: self.range,
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(Level::WARN);

    let cli = Cli::parse();
    let settings = Settings::from_process(&cli.overrides())?;
    let mode = select_mode(&cli.mode_flags(), &cli.args, &settings)?;

    match mode {
        ExecutionMode::Markdown { input, output } => run_markdown(&input, &output),
        ExecutionMode::LegacyExtract { start, pattern } => run_legacy_extract(&start, &pattern),
        ExecutionMode::DirectIdentifiers(config) => run_direct(&settings, &config),
        ExecutionMode::ExtractOnly(config) => run_extract_only(&config),
        ExecutionMode::Full(config) => run_full(&settings, &config),
    }
}

fn run_markdown(input: &Path, output: &Path) -> Result<()> {
    println!("=== Markdown Generation Mode ===");
    println!("Input JSON file: {}", normalize_path(input));
    println!("Output Markdown file: {}", normalize_path(output));
    println!();

    let tasks = generate_markdown_from_file(input, output)?;
    println!("Rendered {tasks} tasks to {}", normalize_path(output));

    println!();
    println!("=== Markdown generation completed successfully ===");
    Ok(())
}

fn run_legacy_extract(start: &str, pattern: &IdPattern) -> Result<()> {
    let git = GitService::system()?;
    if let Preflight::SoftFail(_) = preflight_repository(&git, start)? {
        return Ok(());
    }

    let extraction = extract(&git, start, pattern, false)?;
    println!("BRANCH_NAME: {}", extraction.branch.branch);
    println!(
        "JIRA ID: {}",
        extraction.branch.seed.as_deref().unwrap_or_default()
    );
    println!("START_COMMIT: {}", extraction.branch.head);

    print_identifier_list(&extraction.identifiers);
    Ok(())
}

fn run_extract_only(config: &ExecutionConfig) -> Result<()> {
    let start = start_ref(config)?;
    let git = GitService::system()?;
    if let Preflight::SoftFail(_) = preflight_repository(&git, start)? {
        return Ok(());
    }

    println!("=== JIRA ID Extraction (Extract Only Mode) ===");
    print_scope(config, start);
    println!();

    let extraction = extract(&git, start, &config.pattern, config.single_commit)?;
    println!("Branch: {}", extraction.branch.branch);
    println!("Latest Commit: {}", extraction.branch.head);

    print_identifier_list(&extraction.identifiers);
    Ok(())
}

fn run_full(settings: &Settings, config: &ExecutionConfig) -> Result<()> {
    let client_config = settings.jira_client_config()?;
    let start = start_ref(config)?;
    let git = GitService::system()?;
    if let Preflight::SoftFail(_) = preflight_repository(&git, start)? {
        return Ok(());
    }

    println!("=== JIRA Details Fetching Process ===");
    print_scope(config, start);
    println!("Output File: {}", normalize_path(&config.output_file));
    println!();

    if config.single_commit {
        println!("Step 1: Extracting JIRA IDs from commit...");
    } else {
        println!("Step 1: Extracting JIRA IDs from git commits...");
    }
    let extraction = extract(&git, start, &config.pattern, config.single_commit)?;
    println!("Branch: {}", extraction.branch.branch);
    println!("Latest Commit: {}", extraction.branch.head);

    if extraction.identifiers.is_empty() {
        println!("No JIRA IDs found in commit range");
        return Ok(());
    }
    println!("Found JIRA IDs: {}", extraction.identifiers.join(", "));

    println!();
    println!("Step 2: Fetching JIRA details...");
    let mut client = JiraClient::new(client_config)?;
    let response = fetch_details(&mut client, &extraction.identifiers);

    println!();
    println!("Step 3: Writing results...");
    write_results(&response, config, client.request_count())?;

    println!();
    println!("=== Process completed successfully ===");
    Ok(())
}

fn run_direct(settings: &Settings, config: &ExecutionConfig) -> Result<()> {
    let client_config = settings.jira_client_config()?;
    let identifiers = config.identifiers();
    println!("Processing JIRA IDs: {}", identifiers.join(", "));

    let mut client = JiraClient::new(client_config)?;
    let response = fetch_details(&mut client, identifiers);
    write_results(&response, config, client.request_count())
}

fn write_results(response: &EvidenceResponse, config: &ExecutionConfig, requests: usize) -> Result<()> {
    let saved = save_evidence(
        response,
        &config.output_file,
        config.markdown_output.as_deref(),
        &generation_timestamp(),
    )?;
    println!("JIRA data saved to: {}", normalize_path(&saved.json_path));
    if let Some(path) = &saved.markdown_path {
        println!("Markdown report saved to: {}", normalize_path(path));
    }
    println!("Summary: {}", RunSummary::new(response, requests));
    Ok(())
}

fn start_ref(config: &ExecutionConfig) -> Result<&str> {
    match config.start_ref() {
        Some(start) => Ok(start),
        None => bail!("a start commit is required for git-based modes"),
    }
}

fn print_scope(config: &ExecutionConfig, start: &str) {
    if config.single_commit {
        println!("Commit: {start}");
    } else {
        println!("Start Commit: {start}");
    }
    println!("JIRA ID Regex: {}", config.pattern.as_str());
}

fn print_identifier_list(identifiers: &[String]) {
    if identifiers.is_empty() {
        println!("No JIRA IDs found");
    } else {
        println!("{}", identifiers.join(","));
    }
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
