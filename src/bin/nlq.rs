//! Inventory query CLI.

use anyhow::Context;
use clap::{Parser, Subcommand};
use inventory_nlq::guard::sanitize;
use inventory_nlq::sql::SqlValidator;
use inventory_nlq::{Config, QueryEnhancer, QueryService};
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "nlq")]
#[command(about = "Ask the inventory database questions in Turkish or English", long_about = None)]
struct Cli {
    /// JSON config file (default: built-in defaults plus environment)
    #[arg(long, global = true, env = "NLQ_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and print the response as JSON
    Ask {
        /// Natural-language question
        query: String,
    },

    /// Run only the input guard
    Sanitize {
        /// Text to check
        text: String,
    },

    /// Show detected time window and aggregation
    Enhance {
        /// Query text
        text: String,
    },

    /// Run the SQL validator on a statement
    Validate {
        /// SQL statement
        sql: String,
    },
}

fn init_tracing(json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::from_env().context("Invalid environment configuration")?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Commands::Ask { query } => {
            let config = load_config(cli.config.as_ref())?;
            cmd_ask(&config, &query).await?;
        }
        Commands::Sanitize { text } => cmd_sanitize(&text)?,
        Commands::Enhance { text } => cmd_enhance(&text)?,
        Commands::Validate { sql } => cmd_validate(&sql)?,
    }

    Ok(())
}

async fn cmd_ask(config: &Config, query: &str) -> anyhow::Result<()> {
    let service = QueryService::from_config(config).context("Failed to start query service")?;

    match service.process_query(query).await {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.result.is_success() {
                std::process::exit(2);
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Query rejected");
            println!("{}", serde_json::to_string_pretty(&json!({ "error": e.user_message() }))?);
            std::process::exit(1);
        }
    }
    Ok(())
}

fn cmd_sanitize(text: &str) -> anyhow::Result<()> {
    match sanitize(text) {
        Ok(clean) => println!("{}", serde_json::to_string_pretty(&json!({ "sanitized": clean }))?),
        Err(reason) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "rejected": reason.to_string() }))?
            );
            std::process::exit(1);
        }
    }
    Ok(())
}

fn cmd_enhance(text: &str) -> anyhow::Result<()> {
    let (enhanced, metadata) = QueryEnhancer::enhance(text);
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "enhanced_query": enhanced,
            "query_enhancement": metadata,
        }))?
    );
    Ok(())
}

fn cmd_validate(sql: &str) -> anyhow::Result<()> {
    match SqlValidator::validate(sql) {
        Ok(validated) => {
            let tables = SqlValidator::referenced_tables(validated.as_str()).unwrap_or_default();
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "valid": true, "sql": validated.as_str(), "tables": tables }))?
            );
        }
        Err(rejection) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "valid": false,
                    "error": rejection.to_string(),
                    "rejection": rejection,
                }))?
            );
            std::process::exit(1);
        }
    }
    Ok(())
}
