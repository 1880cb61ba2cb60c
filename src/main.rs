use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use pulsekeeper::accounts::{self, AccountSources};
use pulsekeeper::config::Settings;
use pulsekeeper::keepalive::{self, probe::HttpPlatformProbe, RunSource};
use pulsekeeper::store::{RunStatus, SqliteKv, StatusStore};

#[derive(Parser)]
#[command(
    name = "pulsekeeper",
    about = "Multi-account keep-alive pinger with a web dashboard",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (API server + dashboard + cron scheduler)
    Serve {
        /// Bind address
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,

        /// Sqlite status store path (falls back to PULSEKEEPER_STORE; omit
        /// both to run without persistence)
        #[arg(long)]
        store: Option<String>,
    },

    /// Run one keep-alive pass and print the outcome
    Run {
        /// Only process the account with this id
        #[arg(long)]
        account: Option<String>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,

        /// Persist the run into this sqlite status store
        #[arg(long)]
        store: Option<String>,
    },

    /// List the resolved account registry
    Accounts {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Show stored run history
    History {
        /// Sqlite status store path (falls back to PULSEKEEPER_STORE)
        #[arg(long)]
        store: Option<String>,

        /// Show at most this many runs
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind, store } => {
            let mut settings = Settings::from_env();
            if store.is_some() {
                settings.store_path = store;
            }
            tracing::info!(%bind, "Starting PulseKeeper daemon");
            pulsekeeper::serve(&bind, settings).await?;
        }
        Commands::Run {
            account,
            json,
            store,
        } => {
            let mut settings = Settings::from_env();
            if store.is_some() {
                settings.store_path = store;
            }

            let sources = AccountSources::from_env();
            let registry = accounts::resolve(&sources);
            let store = open_store(&settings)?;
            let probe = HttpPlatformProbe::new(settings.status_url.clone());

            let summary = keepalive::run(
                &registry,
                &probe,
                &store,
                RunSource::Manual,
                account.as_deref(),
            )
            .await;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                for line in &summary.logs {
                    println!("{}", line);
                }
                if !summary.results.is_empty() {
                    println!();
                    println!("{:<8} | {:<24} | {:<6} | Duration", "ID", "Name", "Status");
                    println!("{:-<8}-|-{:-<24}-|-{:-<6}-|-{:-<10}", "", "", "", "");
                    for result in &summary.results {
                        let status = if result.success { "OK" } else { "FAIL" };
                        println!(
                            "{:<8} | {:<24} | {:<6} | {}ms",
                            result.id, result.name, status, result.duration
                        );
                    }
                }
            }

            if !summary.success {
                std::process::exit(1);
            }
        }
        Commands::Accounts { json } => {
            let registry = accounts::resolve(&AccountSources::from_env());
            if json {
                println!("{}", serde_json::to_string_pretty(&registry)?);
            } else if registry.is_empty() {
                println!("No accounts configured.");
            } else {
                println!("{:<8} | {:<24} | App URL", "ID", "Name");
                println!("{:-<8}-|-{:-<24}-|-{:-<30}", "", "", "");
                for account in &registry {
                    println!(
                        "{:<8} | {:<24} | {}",
                        account.id,
                        account.name,
                        account.app_url.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Commands::History { store, limit } => {
            let mut settings = Settings::from_env();
            if store.is_some() {
                settings.store_path = store;
            }
            let Some(path) = settings.store_path.as_deref() else {
                anyhow::bail!("no status store configured; pass --store or set PULSEKEEPER_STORE");
            };

            let kv = SqliteKv::open(path)?;
            let store = StatusStore::new(Some(Arc::new(kv)), settings.history_limit);
            let history = store.history().await;

            if history.is_empty() {
                println!("No runs recorded yet.");
            } else {
                for entry in history.iter().take(limit) {
                    let label = match entry.status {
                        RunStatus::Success => "success",
                        RunStatus::Error => "error",
                    };
                    println!("{} [{}]", entry.time, label);
                    for message in &entry.messages {
                        println!("  {}", message);
                    }
                    println!();
                }
            }
        }
    }

    Ok(())
}

fn open_store(settings: &Settings) -> Result<StatusStore> {
    match settings.store_path.as_deref() {
        Some(path) => {
            let kv = SqliteKv::open(path)?;
            Ok(StatusStore::new(
                Some(Arc::new(kv)),
                settings.history_limit,
            ))
        }
        None => Ok(StatusStore::unbound()),
    }
}
