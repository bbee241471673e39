//! synd-dist - Publish posts to connected social media accounts

use clap::{Parser, Subcommand};
use libsyndicast::config::{resolve_config_path, resolve_db_path, Config};
use libsyndicast::credentials::{store_from_config, CredentialStore};
use libsyndicast::logging::LoggingConfig;
use libsyndicast::{ClientFactory, Database, Dispatcher, Distribution, PublishOutcome, Result};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "synd-dist")]
#[command(version, about = "Publish posts to connected social media accounts")]
#[command(long_about = r#"Publish a stored post to one or more connected accounts and manage
the resulting distributions.

Each target account gets one distribution record. All accounts are
published concurrently; a failure on one never affects the others.

EXAMPLES:
    # Publish a post to two accounts
    synd-dist publish 6f1c... --accounts 0b6f...,9d1c...

    # JSON output for scripting
    synd-dist publish 6f1c... --accounts 0b6f... --format json | jq '.distributions[].status'

    # Reset a failed distribution to pending
    synd-dist retry 3e2a...

    # Reset and publish again right away
    synd-dist retry 3e2a... --now

    # Show every distribution of a post
    synd-dist list 6f1c...

    # Supported platforms
    synd-dist platforms

CONFIGURATION:
    Config file:  $SYNDICAST_CONFIG or ~/.config/syndicast/config.toml
    Database:     --db, $SYNDICAST_DB_PATH, or [database].path
    Logging:      $SYNDICAST_LOG_FORMAT (text, json, pretty), $SYNDICAST_LOG_LEVEL

EXIT CODES:
    0 - Success
    1 - At least one distribution failed or could not be saved,
        or credentials could not be read
    2 - Configuration or database error
    3 - Invalid input (unknown post or distribution, illegal retry)
"#)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to the SQLite database (overrides configuration)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish a post to the given accounts
    Publish {
        /// ID of the post to publish
        post_id: String,

        /// Target account IDs (comma-separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        accounts: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Reset a failed distribution to pending
    Retry {
        /// ID of the distribution to retry
        distribution_id: String,

        /// Publish again immediately after resetting
        #[arg(long)]
        now: bool,

        /// Output format
        #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// List the distributions of a post, oldest first
    List {
        /// ID of the post
        post_id: String,

        /// Output format
        #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// List supported platform names
    Platforms,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.verbose).init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let config = load_config(cli.config.as_ref())?;

    if let Command::Platforms = cli.command {
        for name in ClientFactory::from_config(&config)?.supported_platforms() {
            println!("{}", name);
        }
        return Ok(0);
    }

    let dispatcher = build_dispatcher(&config, cli.db.as_deref()).await?;

    match cli.command {
        Command::Publish {
            post_id,
            accounts,
            format,
        } => {
            let outcome = dispatcher.publish(&post_id, &accounts).await?;
            print_outcome(&post_id, &outcome, &format);
            Ok(if outcome.failed().is_empty() && outcome.persist_errors.is_empty() {
                0
            } else {
                1
            })
        }
        Command::Retry {
            distribution_id,
            now,
            format,
        } => {
            let distribution = if now {
                dispatcher.retry(&distribution_id).await?
            } else {
                dispatcher.retry_distribution(&distribution_id).await?
            };
            print_distributions(std::slice::from_ref(&distribution), &format);
            Ok(if distribution.status.is_retryable() { 1 } else { 0 })
        }
        Command::List { post_id, format } => {
            let distributions = dispatcher.list_distributions(&post_id).await?;
            print_distributions(&distributions, &format);
            Ok(0)
        }
        Command::Platforms => Ok(0),
    }
}

/// Explicit path, then `SYNDICAST_CONFIG` or the XDG default.
/// A missing default file means default settings.
fn load_config(explicit: Option<&PathBuf>) -> Result<Config> {
    if let Some(path) = explicit {
        return Config::load_from_path(path);
    }

    let path = resolve_config_path()?;
    if path.exists() {
        Config::load_from_path(&path)
    } else {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        Ok(Config::default_config())
    }
}

async fn build_dispatcher(config: &Config, db_override: Option<&str>) -> Result<Dispatcher> {
    let db_path = resolve_db_path(config, db_override);
    let db = Arc::new(Database::new(&db_path).await?);

    let credentials: Arc<dyn CredentialStore> = Arc::from(store_from_config(&config.credentials));
    tracing::debug!(backend = credentials.backend_name(), "Using credential store");

    let factory = ClientFactory::from_config(config)?;
    Ok(Dispatcher::with_store(db, credentials, factory))
}

fn print_outcome(post_id: &str, outcome: &PublishOutcome, format: &str) {
    if format == "json" {
        let output = json!({
            "post_id": post_id,
            "distributions": outcome.distributions,
            "skipped_count": outcome.skipped_count,
            "persist_errors": outcome.persist_errors,
        });
        println!("{}", output);
        return;
    }

    print_distributions(&outcome.distributions, format);
    if outcome.skipped_count > 0 {
        eprintln!("Skipped {} inactive or unknown account(s)", outcome.skipped_count);
    }
    for unsaved in &outcome.persist_errors {
        eprintln!(
            "Not saved: {} ({}): {}",
            unsaved.distribution_id, unsaved.status, unsaved.error
        );
    }
}

fn print_distributions(distributions: &[Distribution], format: &str) {
    if format == "json" {
        println!("{}", json!(distributions));
        return;
    }

    for d in distributions {
        let detail = match (&d.platform_post_id, &d.error_message) {
            (Some(platform_post_id), _) => platform_post_id.as_str(),
            (None, Some(error)) => error.as_str(),
            (None, None) => "",
        };
        println!("{}\t{}\t{}\t{}", d.id, d.account_id, d.status, detail);
    }
}
