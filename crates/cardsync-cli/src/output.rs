//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use cardsync_core::{Applied, SyncReport};
use serde_json::json;

/// Longest summary line printed in human mode
const SUMMARY_WIDTH: usize = 100;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
    /// Confirmations are answered with yes
    pub assume_yes: bool,
}

impl Output {
    pub fn new(format: OutputFormat, assume_yes: bool) -> Self {
        Self { format, assume_yes }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print a titled list of changes awaiting confirmation
    pub fn print_summary(&self, title: &str, lines: &[String]) {
        match self.format {
            OutputFormat::Human => {
                println!("{}", title);
                for line in lines {
                    println!("  {}", truncate(line, SUMMARY_WIDTH));
                }
            }
            OutputFormat::Json => {
                println!("{}", json!({ "summary": title, "changes": lines }));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print progress after one applied mutation
    pub fn print_applied(&self, applied: &Applied, done: usize, total: usize) {
        match self.format {
            OutputFormat::Human => println!("[{}/{}] {}", done, total, applied),
            OutputFormat::Json => {
                println!(
                    "{}",
                    json!({ "applied": applied.to_string(), "done": done, "total": total })
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print the outcome of a sync run
    pub fn print_report(&self, report: &SyncReport) {
        match self.format {
            OutputFormat::Human => {
                if report.applied.is_empty() {
                    println!("✓ Up to date ({} documents)", report.documents);
                } else {
                    println!(
                        "✓ Applied {} change(s), {} card(s) unchanged",
                        report.applied.len(),
                        report.unchanged
                    );
                }
            }
            OutputFormat::Json => {
                let applied: Vec<String> = report.applied.iter().map(ToString::to_string).collect();
                println!(
                    "{:#}",
                    json!({
                        "documents": report.documents,
                        "meta_changes": report.meta_changes,
                        "unchanged": report.unchanged,
                        "applied": applied,
                    })
                );
            }
            OutputFormat::Quiet => {
                println!("{}", report.applied.len());
            }
        }
    }

    /// Print arbitrary JSON; pretty in human and JSON modes
    pub fn print_json(&self, value: &serde_json::Value) {
        match self.format {
            OutputFormat::Human | OutputFormat::Json => println!("{:#}", value),
            OutputFormat::Quiet => println!("{}", value),
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!("{}", json!({"status": "success", "message": message}));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
