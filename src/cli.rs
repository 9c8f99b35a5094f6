//! Command-line surface: checks operation documents before they are wired
//! into runners.

use crate::document::{Document, DocumentClassifier, OperationKind, SourceClassifier};
use crate::error::RunnerError;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

/// Mutation runner tooling
#[derive(Parser)]
#[command(name = "mutation-runner")]
#[command(about = "Validate mutation documents for ordered mutation runners")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify documents and fail unless every one is a single mutation
    Check {
        /// Document files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Debug, Serialize)]
pub struct CheckEntry {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<OperationKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckEntry {
    pub fn is_mutation(&self) -> bool {
        self.kind == Some(OperationKind::Mutation)
    }
}

#[derive(Debug)]
pub struct CheckReport {
    pub entries: Vec<CheckEntry>,
}

impl CheckReport {
    pub fn all_mutations(&self) -> bool {
        self.entries.iter().all(CheckEntry::is_mutation)
    }

    pub fn render(&self, format: &str) -> Result<String, RunnerError> {
        match format {
            "json" => serde_json::to_string_pretty(&self.entries)
                .map_err(|e| RunnerError::ConfigError(format!("Failed to encode report: {}", e))),
            "text" => Ok(self
                .entries
                .iter()
                .map(|entry| match (&entry.kind, &entry.error) {
                    (Some(OperationKind::Mutation), _) => {
                        format!("{}: mutation", entry.path.display())
                    }
                    (Some(kind), _) => {
                        format!("{}: {} (not a mutation)", entry.path.display(), kind)
                    }
                    (None, Some(error)) => format!("{}: error: {}", entry.path.display(), error),
                    (None, None) => format!("{}: unknown", entry.path.display()),
                })
                .collect::<Vec<_>>()
                .join("\n")),
            other => Err(RunnerError::ConfigError(format!(
                "Invalid output format: {} (must be 'json' or 'text')",
                other
            ))),
        }
    }
}

/// Classify each file. Read and parse failures are reported per entry.
pub fn check_documents(files: &[PathBuf], classifier: &dyn DocumentClassifier) -> CheckReport {
    let entries = files
        .iter()
        .map(|path| {
            let outcome = std::fs::read_to_string(path)
                .map_err(|e| e.to_string())
                .and_then(|source| {
                    classifier
                        .classify(&Document::new(source))
                        .map_err(|e| e.to_string())
                });
            debug!(path = %path.display(), ?outcome, "Checked document");
            match outcome {
                Ok(kind) => CheckEntry {
                    path: path.clone(),
                    kind: Some(kind),
                    error: None,
                },
                Err(error) => CheckEntry {
                    path: path.clone(),
                    kind: None,
                    error: Some(error),
                },
            }
        })
        .collect();
    CheckReport { entries }
}

/// Execute a command. Returns the rendered output and whether it passed.
pub fn execute(command: &Commands) -> Result<(String, bool), RunnerError> {
    match command {
        Commands::Check { files, format } => {
            let report = check_documents(files, &SourceClassifier);
            Ok((report.render(format)?, report.all_mutations()))
        }
    }
}
