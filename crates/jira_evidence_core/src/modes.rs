//! Chooses the single pipeline a run executes.
//!
//! Precedence, first match wins:
//! 1. `--markdown`: render an existing evidence file.
//! 2. `--extract-from-git <start> <regex>`: legacy extraction.
//! 3. No positional input: configuration error.
//! 4. Every positional is an issue key (and not `--extract-only`): fetch those keys.
//! 5. Otherwise the first positional is a start commit: extract-only or full run.

use std::path::PathBuf;

use tracing::debug;

use crate::config::Settings;
use crate::error::{EvidenceError, Result};
use crate::identifiers::IdPattern;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeFlags {
    pub markdown: bool,
    pub legacy_extract: bool,
    pub extract_only: bool,
    pub range: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionTarget {
    StartRef(String),
    Identifiers(Vec<String>),
}

/// Immutable description of a git or direct-key run.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub pattern: IdPattern,
    pub output_file: PathBuf,
    pub markdown_output: Option<PathBuf>,
    pub single_commit: bool,
    pub target: ExecutionTarget,
}

impl ExecutionConfig {
    pub fn start_ref(&self) -> Option<&str> {
        match &self.target {
            ExecutionTarget::StartRef(start) => Some(start),
            ExecutionTarget::Identifiers(_) => None,
        }
    }

    pub fn identifiers(&self) -> &[String] {
        match &self.target {
            ExecutionTarget::Identifiers(ids) => ids,
            ExecutionTarget::StartRef(_) => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExecutionMode {
    Markdown { input: PathBuf, output: PathBuf },
    LegacyExtract { start: String, pattern: IdPattern },
    DirectIdentifiers(ExecutionConfig),
    ExtractOnly(ExecutionConfig),
    Full(ExecutionConfig),
}

impl ExecutionMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Markdown { .. } => "markdown",
            Self::LegacyExtract { .. } => "legacy-extract",
            Self::DirectIdentifiers(_) => "direct-identifiers",
            Self::ExtractOnly(_) => "extract-only",
            Self::Full(_) => "full",
        }
    }

    /// Modes that call the tracker and therefore need credentials.
    pub fn needs_tracker(&self) -> bool {
        matches!(self, Self::DirectIdentifiers(_) | Self::Full(_))
    }
}

pub fn select_mode(flags: &ModeFlags, args: &[String], settings: &Settings) -> Result<ExecutionMode> {
    let mode = select(flags, args, settings)?;
    debug!(mode = mode.name(), "selected execution mode");
    Ok(mode)
}

fn select(flags: &ModeFlags, args: &[String], settings: &Settings) -> Result<ExecutionMode> {
    if flags.markdown {
        return Ok(ExecutionMode::Markdown {
            input: settings.output_file.clone(),
            output: settings.markdown_output_path(),
        });
    }

    if flags.legacy_extract {
        let [start, regex, ..] = args else {
            return Err(EvidenceError::validation(
                "args",
                args.join(" "),
                "usage: --extract-from-git <start_commit> <id_regex>",
            ));
        };
        return Ok(ExecutionMode::LegacyExtract {
            start: start.clone(),
            pattern: IdPattern::compile(regex)?,
        });
    }

    let Some(first) = args.first() else {
        return Err(EvidenceError::validation(
            "args",
            "",
            "missing required arguments",
        ));
    };

    let pattern = IdPattern::compile(&settings.id_pattern)?;
    let direct = !flags.extract_only && pattern.all_match(args);
    let target = if direct {
        ExecutionTarget::Identifiers(args.to_vec())
    } else {
        ExecutionTarget::StartRef(first.clone())
    };
    let config = ExecutionConfig {
        pattern,
        output_file: settings.output_file.clone(),
        markdown_output: settings.markdown_output.clone(),
        single_commit: !flags.range,
        target,
    };

    Ok(if direct {
        ExecutionMode::DirectIdentifiers(config)
    } else if flags.extract_only {
        ExecutionMode::ExtractOnly(config)
    } else {
        ExecutionMode::Full(config)
    })
}
