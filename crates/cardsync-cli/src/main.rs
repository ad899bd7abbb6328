//! cardsync CLI
//!
//! Command-line interface for cardsync - keeps markdown flashcards in sync
//! with Mochi.

use anyhow::Result;
use cardsync_core::{StorageError, SyncError};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod editor;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "cardsync")]
#[command(about = "cardsync - Sync markdown flashcards with Mochi")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Base directory holding config.toml and credentials.toml
    #[arg(long, global = true, env = "CARDSYNC_BASE", default_value = "data")]
    base: PathBuf,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Answer yes to every confirmation
    #[arg(short, long, global = true)]
    yes: bool,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync all configured decks
    Sync,
    /// Save the raw remote cards of every configured deck to JSON files
    Backup,
    /// Rename a document in place, keeping its cards
    Rename {
        /// Document to rename
        source: PathBuf,
        /// New file name
        name: String,
        /// Open the renamed document in $EDITOR
        #[arg(short, long)]
        edit: bool,
    },
    /// Move a document to another deck, keeping its cards
    #[command(name = "move", alias = "mv")]
    Move {
        /// Document to move
        source: PathBuf,
        /// Target deck folder
        deck: String,
    },
    /// Show a document as it will be formatted, and its images
    Show {
        /// Markdown file
        path: PathBuf,
    },
    /// Print the raw remote record of a card
    Fetch {
        /// Remote card id
        card_id: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet), cli.yes);

    let result = match cli.command {
        Commands::Sync => commands::sync::sync(&cli.base, &output),
        Commands::Backup => commands::backup::backup(&cli.base, &output),
        Commands::Rename { source, name, edit } => {
            commands::relocate::rename(&cli.base, &source, &name, edit, &output)
        }
        Commands::Move { source, deck } => {
            commands::relocate::move_to_deck(&cli.base, &source, &deck, &output)
        }
        Commands::Show { path } => commands::show::show(&path, &output),
        Commands::Fetch { card_id } => commands::fetch::fetch(&cli.base, &card_id, &output),
    };

    if let Err(e) = &result {
        if let Some(hint) = recovery_hint(e) {
            eprintln!("hint: {}", hint);
        }
    }
    result
}

fn recovery_hint(error: &anyhow::Error) -> Option<&'static str> {
    error.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<SyncError>() {
            e.recovery_suggestion()
        } else {
            cause
                .downcast_ref::<StorageError>()
                .and_then(StorageError::recovery_suggestion)
        }
    })
}

/// Log to stderr; RUST_LOG overrides the verbosity flags
fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "cardsync_core={},cardsync_cli={}",
            log_level, log_level
        ))
    });

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
