//! # Gunsmith CLI (`gunsmith`)
//!
//! ```bash
//! gunsmith --config ./config/gunsmith.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gunsmith init` | Create the manifest database and run migrations |
//! | `gunsmith sync` | Fetch the manifest and download its content database |
//! | `gunsmith current` | Show the current manifest |
//! | `gunsmith history` | List recorded manifests, newest first |
//! | `gunsmith lookup <table> <hash>` | Print one content definition |
//! | `gunsmith vendor <rotation> ...` | List a vendor rotation's sale items |
//! | `gunsmith player <name> ...` | Resolve a display name to a membership id |
//!
//! Logs go to stderr; set `RUST_LOG=gunsmith=debug` for request-level detail.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use gunsmith::api::{CharacterRef, Rotation};
use gunsmith::models::{ContentTable, MembershipType};
use gunsmith::{commands, config, migrate, sync};

/// Gunsmith: manifest-versioned Destiny 2 content access with cached
/// vendor reads.
#[derive(Parser)]
#[command(name = "gunsmith", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/gunsmith.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the manifest database. Idempotent.
    Init,

    /// Fetch the remote manifest and materialize its content database.
    ///
    /// Does nothing if the current manifest already matches and its
    /// content database is on disk.
    Sync,

    /// Show the current manifest.
    Current,

    /// List recorded manifests, newest first.
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Look up a content definition by hash.
    Lookup {
        /// Table: `ClassDefinition`, `ItemDefinition`, `ItemCategory`, `VendorDefinition`
        /// (a `Destiny` prefix is accepted).
        table: ContentTable,
        hash: u32,
    },

    /// List the sale items of a vendor rotation.
    Vendor {
        /// `field-test`, `foundry`, `iron-banner` or `xur`.
        rotation: Rotation,

        /// `xbox` (1) or `psn` (2).
        #[arg(long)]
        membership_type: MembershipType,

        #[arg(long)]
        membership_id: String,

        #[arg(long)]
        character_id: String,

        /// OAuth access token for user-scoped reads.
        #[arg(long)]
        token: Option<String>,
    },

    /// Resolve a display name to a membership id.
    Player {
        display_name: String,

        #[arg(long)]
        membership_type: MembershipType,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gunsmith=info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", commands::describe_failure(&e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sync => {
            sync::run_sync(&cfg).await?;
        }
        Commands::Current => {
            commands::run_current(&cfg).await?;
        }
        Commands::History { limit } => {
            commands::run_history(&cfg, limit).await?;
        }
        Commands::Lookup { table, hash } => {
            commands::run_lookup(&cfg, table, hash).await?;
        }
        Commands::Vendor {
            rotation,
            membership_type,
            membership_id,
            character_id,
            token,
        } => {
            let character = CharacterRef::new(membership_type, membership_id, character_id);
            commands::run_vendor(&cfg, rotation, &character, token.as_deref()).await?;
        }
        Commands::Player {
            display_name,
            membership_type,
        } => {
            commands::run_player(&cfg, membership_type, &display_name).await?;
        }
    }

    Ok(())
}
