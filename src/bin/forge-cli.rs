use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde_json::Value;

use forge_worker::config::{load_config, ConfigError};

#[derive(Parser)]
#[command(name = "forge-cli")]
#[command(about = "Management CLI for forge-worker", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8787", env = "FORGE_URL")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the worker's aggregated health
    Health,
    /// Load and validate a configuration file
    CheckConfig {
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Health => {
            let res = reqwest::Client::new()
                .get(format!("{}/health", cli.url.trim_end_matches('/')))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::CheckConfig { path } => check_config(&path),
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let request_id = res
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let json: Value = res.json().await?;
    if !status.is_success() {
        eprintln!("Error: worker returned status {}", status);
    }
    println!("{}", serde_json::to_string_pretty(&json)?);
    if let Some(id) = request_id {
        eprintln!("request id: {id}");
    }
    if !status.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn check_config(path: &Path) {
    match load_config(path) {
        Ok(config) => {
            println!("{} is valid", path.display());
            println!("  listener: {}", config.listener.bind_address);
            println!("  database: {}", config.database.url);
            println!("  storage:  {:?} ({})", config.storage.driver, config.storage.root);
            println!("  queue:    {} (max retries {})", config.queue.name, config.queue.max_retries);
        }
        Err(ConfigError::Validation(errors)) => {
            eprintln!("{} has {} problem(s):", path.display(), errors.len());
            for error in errors {
                eprintln!("  - {error}");
            }
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
