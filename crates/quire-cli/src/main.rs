//! quire: command-line client for the quire notes server.
//!
//! Every command drives the same state store a graphical client would use,
//! so validation, relevance checks and failure reporting behave identically.
//! Results are printed as JSON on stdout; logs go to stderr.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quire_gateway::HttpGateway;
use quire_store::{AutosaveScheduler, EditTarget, Outcome, Store};

use crate::config::QuireConfig;

#[derive(Parser)]
#[command(name = "quire")]
#[command(author, version, about = "Command-line client for quire notes")]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (default: ~/.config/quire/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the server base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List folders
    Folders,

    /// Create a folder (blank name uses the placeholder name)
    FolderAdd {
        /// Folder name
        name: Option<String>,
    },

    /// Rename a folder
    FolderRename { id: String, name: String },

    /// Delete a folder
    FolderDelete { id: String },

    /// List the notes of a folder
    Notes { folder: String },

    /// Create a note in a folder
    NoteAdd { folder: String, content: String },

    /// Replace the content of a note
    NoteEdit {
        folder: String,
        id: String,
        content: String,
    },

    /// Move a note to the recycle bin
    NoteDelete { folder: String, id: String },

    /// Move a note to another folder
    NoteMove {
        folder: String,
        id: String,
        target: String,
    },

    /// List notes in the recycle bin
    Recycled,

    /// Restore a note from the recycle bin
    Restore { id: String },

    /// Compose a note from stdin, autosaving as lines arrive
    Compose { folder: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Environment variables:
///   QUIRE_LOG_FORMAT - "json" or "text" (default: "text")
///   RUST_LOG         - standard env filter (default: "quire=info,quire_store=info")
fn init_tracing() {
    let log_format = std::env::var("QUIRE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "quire=info,quire_store=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if log_format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = QuireConfig::load(cli.config.as_deref())?;
    if let Some(api_url) = cli.api_url {
        config.api.base_url = api_url;
    }
    config.validate().context("invalid configuration")?;

    let gateway = HttpGateway::new(config.api.clone())?;
    let store = Store::new(Arc::new(gateway));

    match cli.command {
        Commands::Folders => {
            applied(&store, "folders", store.load_folders().await?).await?;
            print_json(&store.snapshot().await.folders)?;
        }
        Commands::FolderAdd { name } => {
            let name = name.unwrap_or_default();
            let folder = applied(&store, "folder-add", store.add_folder(&name).await?).await?;
            print_json(&folder)?;
        }
        Commands::FolderRename { id, name } => {
            applied(&store, "folders", store.load_folders().await?).await?;
            let folder =
                applied(&store, "folder-rename", store.rename_folder(&id, &name).await?).await?;
            print_json(&folder)?;
        }
        Commands::FolderDelete { id } => {
            applied(&store, "folders", store.load_folders().await?).await?;
            applied(&store, "folder-delete", store.delete_folder(&id).await?).await?;
            print_json(&serde_json::json!({ "deleted": id }))?;
        }
        Commands::Notes { folder } => {
            open_folder(&store, &folder).await?;
            print_json(&store.snapshot().await.notes)?;
        }
        Commands::NoteAdd { folder, content } => {
            open_folder(&store, &folder).await?;
            let note = applied(&store, "note-add", store.add_note(&content).await?).await?;
            print_json(&note)?;
        }
        Commands::NoteEdit {
            folder,
            id,
            content,
        } => {
            open_folder(&store, &folder).await?;
            applied(&store, "note-edit", store.edit_note(&id, &content).await?).await?;
            print_json(&store.snapshot().await.note(&id))?;
        }
        Commands::NoteDelete { folder, id } => {
            open_folder(&store, &folder).await?;
            applied(&store, "note-delete", store.delete_note(&id).await?).await?;
            print_json(&serde_json::json!({ "deleted": id }))?;
        }
        Commands::NoteMove { folder, id, target } => {
            open_folder(&store, &folder).await?;
            applied(&store, "note-move", store.move_note(&id, &target).await?).await?;
            print_json(&serde_json::json!({ "moved": id, "target_folder_id": target }))?;
        }
        Commands::Recycled => {
            applied(&store, "recycled", store.fetch_deleted_notes().await?).await?;
            print_json(&store.snapshot().await.deleted_notes)?;
        }
        Commands::Restore { id } => {
            applied(&store, "recycled", store.fetch_deleted_notes().await?).await?;
            applied(&store, "restore", store.restore_note(&id).await?).await?;
            print_json(&serde_json::json!({ "restored": id }))?;
        }
        Commands::Compose { folder } => {
            open_folder(&store, &folder).await?;
            compose(&store, config).await?;
        }
    }

    Ok(())
}

async fn open_folder(store: &Store, folder_id: &str) -> anyhow::Result<()> {
    applied(store, "notes", store.select_folder(Some(folder_id)).await?).await
}

/// Feed stdin through the autosave scheduler as one growing draft, then
/// wait for the last save to land.
async fn compose(store: &Store, config: QuireConfig) -> anyhow::Result<()> {
    let scheduler = AutosaveScheduler::new(store.clone(), config.autosave);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut content = String::new();

    while let Some(line) = lines.next_line().await? {
        if !content.is_empty() {
            content.push('\n');
        }
        content.push_str(&line);
        scheduler.on_change(EditTarget::Draft, content.clone());
    }

    while scheduler.is_pending(&EditTarget::Draft) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let Some(note_id) = scheduler.bound_draft() else {
        bail!("nothing was saved");
    };
    info!(note_id = %note_id, "Draft saved");
    print_json(&store.snapshot().await.note(&note_id))
}

/// Turn a non-applied outcome into an error, with the store's last error
/// as detail.
async fn applied<T>(store: &Store, op: &str, outcome: Outcome<T>) -> anyhow::Result<T> {
    match outcome {
        Outcome::Applied(value) => Ok(value),
        Outcome::RemoteFailed => {
            let detail = store.snapshot().await.last_error.unwrap_or_default();
            bail!("{op} failed: {detail}")
        }
        Outcome::Superseded => bail!("{op} was superseded by a newer request"),
        Outcome::Missing => bail!("{op}: no such item"),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_subcommands_use_kebab_case() {
        let cli = Cli::try_parse_from(["quire", "note-move", "A", "1", "B"]).unwrap();
        match cli.command {
            Commands::NoteMove { folder, id, target } => {
                assert_eq!((folder.as_str(), id.as_str(), target.as_str()), ("A", "1", "B"));
            }
            _ => panic!("expected note-move"),
        }
    }

    #[test]
    fn test_folder_add_name_is_optional() {
        let cli = Cli::try_parse_from(["quire", "folder-add"]).unwrap();
        assert!(matches!(cli.command, Commands::FolderAdd { name: None }));
    }

    #[test]
    fn test_global_overrides_after_subcommand() {
        let cli =
            Cli::try_parse_from(["quire", "folders", "--api-url", "http://notes:3000"]).unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://notes:3000"));
    }
}
