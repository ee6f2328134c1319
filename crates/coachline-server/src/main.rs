use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use uuid::Uuid;

use coachline_core::auth::issue_token;
use coachline_core::{LogNotifier, SystemClock};
use coachline_db::models::PartyRole;
use coachline_db::pool;

use coachline_server::api::{self, AppState};
use coachline_server::config::{self, CoachlineConfig};

#[derive(Parser)]
#[command(name = "coachline", about = "Coaching request and plan assignment server")]
struct Cli {
    /// Database URL (overrides COACHLINE_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a coachline config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/coachline")]
        db_url: String,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create the database if needed and apply migrations
    DbInit,
    /// Run the HTTP API
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Session token utilities
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
    /// Print shell completions to stdout
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Mint a session token for a user
    Issue {
        #[arg(long)]
        user_id: Uuid,
        /// trainer or client
        #[arg(long)]
        role: PartyRole,
        /// Hours until the token expires
        #[arg(long, default_value_t = 24)]
        ttl_hours: i64,
    },
}

/// Execute `coachline init`: write the config file.
fn cmd_init(db_url: &str, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let token_secret = config::generate_token_secret();

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        auth: config::AuthSection {
            token_secret: token_secret.clone(),
        },
        server: config::ServerSection::default(),
        policy: config::PolicySection::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!("  auth.token_secret = {}...{}", &token_secret[..8], &token_secret[56..]);
    println!("  server = {}:{}", cfg.server.bind, cfg.server.port);
    println!("  policy.cooldown_days = {}", cfg.policy.cooldown_days);
    println!();
    println!("Next: run `coachline db-init` to create and migrate the database.");

    Ok(())
}

/// Execute `coachline db-init`: create the database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = CoachlineConfig::resolve(cli_db_url)?;

    println!("Initializing coachline database...");

    if pool::ensure_database_exists(&resolved.db_config).await? {
        println!("Created database.");
    }
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("coachline db-init complete.");
    Ok(())
}

async fn cmd_serve(
    cli_db_url: Option<&str>,
    bind: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let resolved = CoachlineConfig::resolve(cli_db_url)?;
    let bind = bind.unwrap_or(resolved.server.bind);
    let port = port.unwrap_or(resolved.server.port);

    let db_pool = pool::create_pool(&resolved.db_config).await?;
    let state = AppState::new(
        db_pool.clone(),
        resolved.policy,
        resolved.session_config,
        Arc::new(SystemClock),
        Arc::new(LogNotifier),
    );
    tracing::info!(
        cooldown_days = resolved.policy.cooldown.num_days(),
        "cooldown policy loaded"
    );

    let result = api::run_serve(state, &bind, port).await;
    db_pool.close().await;
    result
}

fn cmd_token_issue(
    cli_db_url: Option<&str>,
    user_id: Uuid,
    role: PartyRole,
    ttl_hours: i64,
) -> anyhow::Result<()> {
    if ttl_hours <= 0 {
        anyhow::bail!("--ttl-hours must be positive, got {ttl_hours}");
    }
    let resolved = CoachlineConfig::resolve(cli_db_url)?;
    let expires_at = Duration::try_hours(ttl_hours)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .context("token expiry is out of range")?;

    let token = issue_token(&resolved.session_config, user_id, role, expires_at);
    println!("{token}");
    eprintln!("expires {}", expires_at.to_rfc3339());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { db_url, force } => {
            cmd_init(&db_url, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Serve { bind, port } => {
            cmd_serve(cli.database_url.as_deref(), bind, port).await?;
        }
        Commands::Token { command } => match command {
            TokenCommands::Issue {
                user_id,
                role,
                ttl_hours,
            } => {
                cmd_token_issue(cli.database_url.as_deref(), user_id, role, ttl_hours)?;
            }
        },
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "coachline",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}
