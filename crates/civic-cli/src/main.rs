//! civic - Operator CLI for the civic issue store
//!
//! Works directly on the same issues.jsonl the API serves.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "civic")]
#[command(about = "Operator CLI for civic issue reporting")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file and create the data directory
    Init {
        /// Issue ID prefix
        #[arg(long, default_value = "iss")]
        prefix: String,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Report a new issue
    Create {
        /// Issue title
        title: String,

        /// Description
        #[arg(short, long)]
        description: String,

        /// Category (see `civic categories`)
        #[arg(short, long, default_value = "Other")]
        category: String,

        /// Latitude
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,

        /// Human-readable address
        #[arg(short, long, default_value = "")]
        address: String,

        /// Reporting user
        #[arg(short = 'u', long)]
        created_by: String,

        /// Already-hosted image URL
        #[arg(long)]
        image: Option<String>,
    },

    /// List issues, newest first
    List {
        /// Filter by category
        #[arg(short, long)]
        category: Option<String>,

        /// Filter by status
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by reporting user
        #[arg(short = 'u', long)]
        created_by: Option<String>,
    },

    /// Show issue details
    Show {
        /// Issue ID
        id: String,
    },

    /// Toggle a user's upvote on an issue
    Upvote {
        /// Issue ID
        id: String,

        /// Voting user
        #[arg(short, long)]
        user: String,
    },

    /// Change an issue's status, remarks or estimated fix time
    Status {
        /// Issue ID
        id: String,

        /// New status (pending, in progress, resolved, rejected)
        #[arg(short, long)]
        status: Option<String>,

        /// Remarks for the reporter
        #[arg(short, long)]
        remarks: Option<String>,

        /// Estimated fix time
        #[arg(long)]
        eta: Option<String>,
    },

    /// List well-known categories
    Categories,

    /// Show or reset configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Reset to default configuration
    Reset,
    /// Get a specific config value
    Get {
        /// Config key (e.g., "prefix", "server.port")
        key: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { prefix, force } => commands::init(&prefix, force),
        Commands::Create {
            title,
            description,
            category,
            lat,
            lng,
            address,
            created_by,
            image,
        } => commands::create(
            commands::CreateArgs {
                title,
                description,
                category,
                lat,
                lng,
                address,
                created_by,
                image,
            },
            cli.json,
        ),
        Commands::List {
            category,
            status,
            created_by,
        } => commands::list(category, status, created_by, cli.json),
        Commands::Show { id } => commands::show(&id, cli.json),
        Commands::Upvote { id, user } => commands::upvote(&id, &user, cli.json),
        Commands::Status {
            id,
            status,
            remarks,
            eta,
        } => commands::status(&id, status, remarks, eta, cli.json),
        Commands::Categories => commands::categories(cli.json),
        Commands::Config { command } => match command {
            Some(ConfigCommands::Show) | None => commands::config_show(cli.json),
            Some(ConfigCommands::Reset) => commands::config_reset(),
            Some(ConfigCommands::Get { key }) => commands::config_get(&key, cli.json),
        },
    }
}
