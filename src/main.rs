use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use cristalix_skins::config::Config;
use cristalix_skins::roster::load_roster;
use cristalix_skins::Resolver;

/// Resolve Cristalix player names to player ids and skin URLs.
///
/// Lookups go through a headless browser to get past the API's bot
/// protection, falling back to plain HTTP when the browser is unavailable.
#[derive(Parser)]
#[command(name = "cristalix-skins", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a batch of player names
    Resolve {
        /// Player names to resolve
        names: Vec<String>,

        /// Also read names from a roster file (one per line)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Print the result as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Look up a single player
    Lookup {
        /// The player name
        name: String,
    },

    /// Serve the JSON skin API
    #[cfg(feature = "web")]
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "1337")]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("cristalix_skins=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let resolver = Arc::new(Resolver::from_config(&config)?);

    let outcome = run(cli.command, &config, Arc::clone(&resolver)).await;

    // Always release the browser, even if the command failed
    resolver.shutdown().await;
    outcome
}

async fn run(command: Commands, config: &Config, resolver: Arc<Resolver>) -> Result<()> {
    match command {
        Commands::Resolve { names, file, json } => {
            let mut usernames = names;
            if let Some(path) = file.as_deref().or(config.roster_path.as_deref()) {
                usernames.extend(load_roster(path).await?);
            }
            if usernames.is_empty() {
                anyhow::bail!("No player names given. Pass names or --file <roster>.");
            }

            let skins = resolver.resolve_many(&usernames).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&skins)?);
            } else {
                let mut names: Vec<&String> = skins.keys().collect();
                names.sort();
                for name in names {
                    let skin = &skins[name];
                    println!("{:<20} {}  {}", name.bold(), skin.id, skin.texture_url.dimmed());
                }
                let mut seen = HashSet::new();
                let missing: Vec<&String> = usernames
                    .iter()
                    .filter(|n| !n.is_empty() && !skins.contains_key(n.as_str()))
                    .filter(|n| seen.insert(n.as_str()))
                    .collect();
                for name in &missing {
                    println!("{:<20} {}", name.bold(), "not found".red());
                }
                println!(
                    "\nResolved {} of {} names",
                    skins.len(),
                    skins.len() + missing.len()
                );
            }

            let stats = resolver.stats();
            info!(
                upstream_calls = stats.upstream_calls,
                failed_chunks = stats.failed_chunks,
                fallbacks = stats.fallbacks,
                "Resolve finished"
            );
        }

        Commands::Lookup { name } => match resolver.resolve_one(&name).await {
            Some(profile) => {
                println!("{}", name.bold());
                println!("  id:   {}", profile.player_id);
                println!("  skin: {}", profile.texture_url);
            }
            None => {
                println!("{} {}", name.bold(), "not found".red());
            }
        },

        #[cfg(feature = "web")]
        Commands::Serve { port, bind } => {
            let state = cristalix_skins::web::AppState::new(resolver, config.roster_path.clone());
            cristalix_skins::web::run_server(state, port, &bind).await?;
        }
    }

    Ok(())
}
