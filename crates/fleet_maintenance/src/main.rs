//! Fleet Predictive Maintenance
//!
//! A machine learning-based tool for predicting remaining distance until
//! maintenance across a shared-vehicle fleet, with a hybrid weekly
//! issue-count forecast.

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::CONFIG;
use database::{create_pool, run_migrations};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;

/// Fleet Predictive Maintenance
#[derive(Parser)]
#[command(name = "fleet-maint")]
#[command(about = "ML-based remaining-distance prediction and issue forecasting for vehicle fleets")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the dataset, train a model and refresh per-vehicle predictions
    Train {
        /// Number of training epochs for the linear engine
        #[arg(short, long, default_value = "200")]
        epochs: usize,

        /// Learning rate for the linear engine
        #[arg(short, long, default_value = "0.05")]
        learning_rate: f64,

        /// Skip the boosted engine and train linear only
        #[arg(long)]
        no_boosted: bool,

        /// How many of the most at-risk vehicles to print
        #[arg(short, long, default_value = "20")]
        top: usize,
    },

    /// Show current per-vehicle predictions and the latest model
    Predictions,

    /// Hybrid weekly issue-count forecast
    Forecast {
        /// Number of weeks to project forward
        #[arg(short = 'w', long)]
        horizon_weeks: Option<usize>,
    },

    /// Run database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let pool = create_pool(&CONFIG.database_url).await?;

    match cli.command {
        Commands::Train {
            epochs,
            learning_rate,
            no_boosted,
            top,
        } => {
            commands::train::run(&pool, epochs, learning_rate, no_boosted, top).await?;
        }
        Commands::Predictions => {
            commands::predictions::run(&pool).await?;
        }
        Commands::Forecast { horizon_weeks } => {
            let horizon = horizon_weeks.unwrap_or(CONFIG.forecast_horizon_weeks);
            commands::forecast::run(&pool, horizon).await?;
        }
        Commands::Migrate => {
            run_migrations(&pool).await?;
            info!("Migrations completed successfully");
        }
    }

    Ok(())
}
