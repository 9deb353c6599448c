use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use cardboard::config::CardboardConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "cardboard")]
#[command(version, about = "Kanban boards with optimistic local edits")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Board data file. Overrides cardboard.toml and CARDBOARD_DATA.
    #[arg(long, global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a cardboard project and its board file
    Init {
        /// Title for a newly created board
        #[arg(long)]
        title: Option<String>,
    },
    /// Print the board
    Show {
        /// Print the board as JSON instead
        #[arg(long)]
        json: bool,
    },
    /// Append a list to the board
    AddList { title: String },
    /// Append a card to a list (by id, title, or 1-based number)
    AddCard {
        list: String,
        title: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Move a card (by id or title) into a list
    Move {
        card: String,
        to: String,
        /// Zero-based slot in the target list; appends when omitted
        #[arg(short, long)]
        index: Option<usize>,
    },
    /// Delete a list and all of its cards
    RemoveList { list: String },
    /// Delete a card
    RemoveCard { card: String },
    /// Change a card's title
    Rename { card: String, title: String },
    /// Replace a card's description
    Describe { card: String, text: String },
    /// Check the stored board for ordering and reference problems
    Validate,
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let config = CardboardConfig::with_cli_args(project_dir, cli.verbose, cli.data.clone())?;
    cardboard::telemetry::init(&config)?;

    match &cli.command {
        Commands::Init { title } => cmd::cmd_init(&config, title.as_deref()).await?,
        Commands::Show { json } => cmd::cmd_show(&config, *json).await?,
        Commands::AddList { title } => cmd::cmd_add_list(&config, title).await?,
        Commands::AddCard {
            list,
            title,
            description,
        } => cmd::cmd_add_card(&config, list, title, description.as_deref()).await?,
        Commands::Move { card, to, index } => cmd::cmd_move(&config, card, to, *index).await?,
        Commands::RemoveList { list } => cmd::cmd_remove_list(&config, list).await?,
        Commands::RemoveCard { card } => cmd::cmd_remove_card(&config, card).await?,
        Commands::Rename { card, title } => cmd::cmd_rename(&config, card, title).await?,
        Commands::Describe { card, text } => cmd::cmd_describe(&config, card, text).await?,
        Commands::Validate => cmd::cmd_validate(&config).await?,
        Commands::Config { command } => cmd::cmd_config(&config, command.clone())?,
    }

    Ok(())
}
