//! Forecast command - hybrid weekly issue-count projection.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use database::{IssueRepository, PredictionRepository, TripRepository, VehicleRepository};
use dataset_builder::VehicleRegistry;
use forecaster::{forecast, HoltForecaster};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

/// Runs the forecast command.
///
/// Combines the time-series forecast over historical weekly issue counts
/// with simulated issues from each vehicle's predicted remaining distance
/// and its trailing-30-day usage rate.
///
/// # Errors
///
/// Returns an error if the database queries fail. A failed time-series fit
/// is not an error; the forecast degrades to a flat baseline.
pub async fn run(pool: &PgPool, horizon_weeks: usize) -> Result<()> {
    let issues = IssueRepository::list_all(pool).await?;
    let recent_trips = TripRepository::list_since(pool, 30).await?;
    let vehicles = VehicleRepository::list_all(pool).await?;
    let predictions = PredictionRepository::list_all(pool).await?;

    info!(
        issues = issues.len(),
        recent_trips = recent_trips.len(),
        predictions = predictions.len(),
        horizon_weeks,
        "Building hybrid forecast"
    );

    let registry =
        VehicleRegistry::from_entries(vehicles.iter().map(|v| (v.id, v.name.as_str())));

    // Trailing-30-day distance per vehicle for the weekly-rate estimate.
    let mut distance_30d: BTreeMap<Uuid, f64> = BTreeMap::new();
    for trip in &recent_trips {
        let Some(vehicle_id) = trip
            .vehicle_name
            .as_deref()
            .and_then(|name| registry.resolve(name))
        else {
            continue;
        };
        let distance = trip
            .distance_km
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(0.0);
        *distance_30d.entry(vehicle_id).or_insert(0.0) += distance;
    }
    let distance_30d: Vec<(Uuid, f64)> = distance_30d.into_iter().collect();

    let issue_times: Vec<DateTime<Utc>> = issues.iter().map(|i| i.reported_at).collect();
    let prediction_pairs: Vec<(Uuid, f64)> = predictions
        .iter()
        .map(|p| (p.vehicle_id, p.predicted_km_until_maintenance))
        .collect();

    let result = forecast(
        &issue_times,
        &distance_30d,
        &prediction_pairs,
        horizon_weeks,
        Utc::now().date_naive(),
        &HoltForecaster::default(),
    );

    if result.degraded {
        println!("Time-series fit unavailable (degenerate history); showing flat baseline plus simulated at-risk issues.");
        println!();
    }

    println!(
        "{:<12} {:>9} {:>8} {:>8} {:>10} {:>9}",
        "Week", "Expected", "Lower", "Upper", "Simulated", "Combined"
    );
    for point in &result.points {
        println!(
            "{:<12} {:>9.2} {:>8.2} {:>8.2} {:>10} {:>9.2}",
            point.week_start, point.expected, point.lower, point.upper, point.simulated,
            point.combined
        );
    }

    println!();
    println!("{}", serde_json::to_string_pretty(&result.next_period)?);

    Ok(())
}
