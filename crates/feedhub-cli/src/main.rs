use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feedhub_core::{storage::{Database, Repository}, AppConfig};

mod commands;

#[derive(Parser)]
#[command(name = "feedhub")]
#[command(author, version, about = "Periodic feed fetcher with a live-resizable worker pool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the fetch scheduler until interrupted
    Fetch,
    /// Register a feed after checking that it can be fetched
    Add {
        /// Unique name for the feed
        #[arg(short, long)]
        name: String,
        /// Feed URL
        #[arg(short, long)]
        url: String,
    },
    /// List registered feeds, newest first
    List {
        /// Number of feeds to show (0 shows all)
        #[arg(short = 'n', long, default_value_t = 0, allow_negative_numbers = true)]
        num: i64,
    },
    /// Delete a feed and its articles
    Delete {
        #[arg(short, long)]
        name: String,
    },
    /// Show the latest articles of a feed
    Articles {
        #[arg(short, long)]
        feed_name: String,
        /// Number of articles to show
        #[arg(short = 'n', long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=20))]
        num: u8,
    },
    /// Store a new fetch interval, e.g. 30s, 5m, 2h, 1d
    SetInterval {
        #[arg(short, long)]
        duration: String,
    },
    /// Store a new worker count
    SetWorkers {
        #[arg(value_parser = clap::value_parser!(u16).range(1..=100))]
        count: u16,
    },
    /// Show whether a fetch process is running and the stored scheduler config
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Initialize database
    let db = Arc::new(Database::new(&config).await?);

    let result = match cli.command {
        Commands::Fetch => commands::fetch::run(db.clone(), &config).await,
        Commands::Add { name, url } => commands::add::run(&db, &config, &name, &url).await,
        Commands::List { num } => commands::list::run(&db, num).await,
        Commands::Delete { name } => commands::delete::run(&db, &name).await,
        Commands::Articles { feed_name, num } => {
            commands::articles::run(&db, &feed_name, num.into()).await
        }
        Commands::SetInterval { duration } => {
            commands::config::set_interval(&db, &config, &duration).await
        }
        Commands::SetWorkers { count } => {
            commands::config::set_workers(&db, &config, count.into()).await
        }
        Commands::Status => commands::status::run(&db).await,
    };

    if let Err(e) = db.close().await {
        tracing::warn!("Failed to close database: {}", e);
    }

    result
}
