use std::sync::LazyLock;

use anyhow::Context;

/// Default trailing window of trip history fed into dataset builds, in days.
const DEFAULT_TRIP_LOOKBACK_DAYS: i64 = 365;

/// Default forecast horizon, in weeks.
const DEFAULT_FORECAST_HORIZON_WEEKS: usize = 12;

pub static CONFIG: LazyLock<Config> =
    LazyLock::new(|| Config::from_env().expect("Failed to create config"));

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Trailing window of trip history loaded for training, in days
    pub trip_lookback_days: i64,

    /// Default forecast horizon, in weeks
    pub forecast_horizon_weeks: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `DATABASE_URL`: `PostgreSQL` connection string
    ///
    /// Optional environment variables:
    /// - `TRIP_LOOKBACK_DAYS`: trip history window for training (default: 365)
    /// - `FORECAST_HORIZON_WEEKS`: default forecast horizon (default: 12)
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or a
    /// numeric variable fails to parse.
    fn from_env() -> anyhow::Result<Self> {
        // Load .env file
        dotenvy::dotenv().ok();

        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL environment variable not set")?;

        let trip_lookback_days = match std::env::var("TRIP_LOOKBACK_DAYS") {
            Ok(raw) => raw
                .parse::<i64>()
                .context("TRIP_LOOKBACK_DAYS is not a valid integer")?,
            Err(_) => DEFAULT_TRIP_LOOKBACK_DAYS,
        };

        let forecast_horizon_weeks = match std::env::var("FORECAST_HORIZON_WEEKS") {
            Ok(raw) => raw
                .parse::<usize>()
                .context("FORECAST_HORIZON_WEEKS is not a valid integer")?,
            Err(_) => DEFAULT_FORECAST_HORIZON_WEEKS,
        };

        Ok(Self {
            database_url,
            trip_lookback_days,
            forecast_horizon_weeks,
        })
    }
}
