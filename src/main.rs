//! # envsync CLI
//!
//! ## Usage
//!
//! ```bash
//! envsync --config ./config/envsync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `envsync init` | Create the SQLite database and schema |
//! | `envsync import <env> <file>` | Load a JSON fixture into an environment |
//! | `envsync envs` | List environments with per-collection counts |
//! | `envsync clear <env>` | Remove every record in an environment |
//! | `envsync get <collection> <id>` | Print one record as JSON |
//! | `envsync find-games <team>` | Find games by team name and date range |
//! | `envsync preview <id>` | Show what a sync would copy |
//! | `envsync commit <id>` | Copy a record and its references |
//! | `envsync serve mcp` | Start the HTTP tool server and MCP endpoint |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use envsync::{config, fixtures, games, get, logging, migrate, server, sync_cmd};

/// envsync: copy a game and everything it references between environments.
#[derive(Parser)]
#[command(
    name = "envsync",
    about = "Dependency-aware sync of games and their references between data environments",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/envsync.toml`. When the file is missing,
    /// built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/envsync.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Load a JSON fixture file into an environment.
    ///
    /// The file is an object keyed by collection name (`games`, `teams`,
    /// ...), each holding an array of records. Ids that already exist in
    /// the environment are rejected.
    Import {
        /// Environment to load into.
        environment: String,
        /// Path to the fixture file.
        file: PathBuf,
    },

    /// List environments and how many records each collection holds.
    Envs,

    /// Remove every record in an environment.
    Clear {
        environment: String,
    },

    /// Print one record as JSON.
    Get {
        /// Collection name (`games`, `teams`, `players`, `competitions`, `seasons`, `leagues`).
        collection: String,
        id: String,
        /// Environment to read from (defaults to `[sync].default_source`).
        #[arg(long)]
        env: Option<String>,
    },

    /// Find games involving a team, newest first.
    FindGames {
        /// Part of either team's name (case-insensitive).
        team: String,
        /// Earliest game day, YYYY-MM-DD (inclusive).
        #[arg(long)]
        start: Option<String>,
        /// Latest game day, YYYY-MM-DD (inclusive).
        #[arg(long)]
        end: Option<String>,
        /// Environment to search (defaults to `[sync].default_source`).
        #[arg(long)]
        env: Option<String>,
    },

    /// Show what syncing a record would copy, without writing.
    Preview {
        /// Id of the root record.
        id: String,
        /// Collection of the root record.
        #[arg(long, default_value = "games")]
        kind: String,
        #[arg(long)]
        source: Option<String>,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Copy a record and everything it references into the target environment.
    Commit {
        /// Id of the root record.
        id: String,
        /// Collection of the root record.
        #[arg(long, default_value = "games")]
        kind: String,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        target: Option<String>,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start a server.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },
}

#[derive(Subcommand)]
enum ServeService {
    /// Start the HTTP tool server with the MCP endpoint on `[server].bind`.
    Mcp,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        config::Config::minimal()
    };
    logging::init(cli.verbose, &cfg.log.level);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { environment, file } => {
            fixtures::run_import(&cfg, &environment, &file).await?;
        }
        Commands::Envs => {
            fixtures::run_envs(&cfg).await?;
        }
        Commands::Clear { environment } => {
            fixtures::run_clear(&cfg, &environment).await?;
        }
        Commands::Get {
            collection,
            id,
            env,
        } => {
            get::run_get(&cfg, &collection, &id, env.as_deref()).await?;
        }
        Commands::FindGames {
            team,
            start,
            end,
            env,
        } => {
            games::run_find_games(
                &cfg,
                &team,
                start.as_deref(),
                end.as_deref(),
                env.as_deref(),
            )
            .await?;
        }
        Commands::Preview {
            id,
            kind,
            source,
            json,
        } => {
            sync_cmd::run_preview(&cfg, &id, &kind, source.as_deref(), json).await?;
        }
        Commands::Commit {
            id,
            kind,
            source,
            target,
            json,
        } => {
            sync_cmd::run_commit(
                &cfg,
                &id,
                &kind,
                source.as_deref(),
                target.as_deref(),
                json,
            )
            .await?;
        }
        Commands::Serve { service } => match service {
            ServeService::Mcp => {
                server::run_server(&cfg).await?;
            }
        },
    }

    Ok(())
}
