use anyhow::{Context, Result};
use chanread::feed::load_bundle;
use chanread::storage::{Database, Persistence, StateExport, StorageError};
use chanread::{Config, Reader};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

/// Get the config directory path (~/.config/chanread/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("chanread"))
}

#[derive(Parser, Debug)]
#[command(name = "chanread", about = "Reading state for multi-channel feed bundles")]
struct Args {
    /// Feed bundle (channel directory and posts) as JSON
    #[arg(long, value_name = "FILE", global = true)]
    bundle: Option<PathBuf>,

    /// State database (default: ~/.config/chanread/state.db)
    #[arg(long, value_name = "FILE", global = true)]
    db: Option<PathBuf>,

    /// Config file (default: ~/.config/chanread/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current projection
    Show,
    /// Open a post, marking it read
    Open { slug: String, id: i64 },
    /// Toggle the star on a post
    Star { slug: String, id: i64 },
    /// Switch to "latest", "starred", or a channel slug
    View { name: String },
    /// Filter the active view by a search query
    Search { query: String },
    /// Filter by tag; omit to clear
    Tag { tag: Option<String> },
    /// Toggle the starred-only filter
    StarFilter,
    /// Mark every post in the active view's scope read
    MarkAllRead,
    /// Expand or collapse the tag menu
    TagsExpanded { state: Toggle },
    /// Write all stored reading state to a JSON file
    Export { file: PathBuf },
    /// Restore reading state from an exported JSON file
    Import { file: PathBuf },
    /// Delete the state database
    Reset,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Toggle {
    On,
    Off,
}

fn open_database(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create state directory: {}", parent.display())
            })?;
        }
    }
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    match Database::open(path_str) {
        Ok(db) => Ok(db),
        Err(StorageError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of chanread appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => Err(anyhow::anyhow!("Failed to open database: {}", e)),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config: {}", config_path.display()))?;

    let db_path = args
        .db
        .clone()
        .or_else(|| config.database_path.clone())
        .unwrap_or_else(|| config_dir.join("state.db"));

    // Commands that work on the raw store, without a bundle
    match &args.command {
        Command::Reset => {
            if db_path.exists() {
                std::fs::remove_file(&db_path).context("Failed to delete database")?;
                println!("Database reset.");
            } else {
                println!("No database at {}", db_path.display());
            }
            return Ok(());
        }
        Command::Export { file } => {
            let persistence = Persistence::new(open_database(&db_path)?, &config.storage_namespace);
            let export = persistence.export().context("Failed to read reading state")?;
            let json = serde_json::to_string_pretty(&export)?;
            std::fs::write(file, json)
                .with_context(|| format!("Failed to write export: {}", file.display()))?;
            println!("Exported {} entries to {}", export.entries.len(), file.display());
            return Ok(());
        }
        Command::Import { file } => {
            let content = std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read import file: {}", file.display()))?;
            let export: StateExport =
                serde_json::from_str(&content).context("File is not a chanread export")?;
            let persistence = Persistence::new(open_database(&db_path)?, &config.storage_namespace);
            let written = persistence
                .import(&export)
                .context("Failed to write reading state")?;
            println!("Imported {} entries from {}", written, file.display());
            return Ok(());
        }
        _ => {}
    }

    let bundle_path = args
        .bundle
        .as_deref()
        .context("--bundle is required for this command")?;
    let feed = load_bundle(bundle_path)
        .with_context(|| format!("Failed to load bundle: {}", bundle_path.display()))?;

    let persistence = Persistence::new(open_database(&db_path)?, &config.storage_namespace);
    let mut reader = Reader::new(feed, persistence, &config);

    let projection = match args.command {
        Command::Show => reader.projection(),
        Command::Open { slug, id } => reader.open_post(&slug, id),
        Command::Star { slug, id } => reader.toggle_star(&slug, id),
        Command::View { name } => reader.switch_view(&name),
        Command::Search { query } => reader.set_search(&query),
        Command::Tag { tag } => reader.set_tag(tag.as_deref()),
        Command::StarFilter => reader.toggle_star_filter(),
        Command::MarkAllRead => reader.mark_all_read(),
        Command::TagsExpanded { state } => reader.set_tags_expanded(matches!(state, Toggle::On)),
        Command::Reset | Command::Export { .. } | Command::Import { .. } => {
            unreachable!("handled before the bundle is loaded")
        }
    };

    println!("{}", serde_json::to_string_pretty(&projection)?);
    Ok(())
}
