//! Train command - the full build + train + predict cycle.

use anyhow::{Context, Result};
use database::{
    CreateMaintenanceModel, IssueRepository, ModelRepository, PredictionRepository,
    TripRepository, VehicleRepository,
};
use dataset_builder::{build_dataset, IssueEvent, TripRecord, VehicleRegistry};
use ml_model::{predict_latest, train, TrainError, TrainingConfig};
use sqlx::PgPool;
use tracing::{info, warn};

/// Runs the train command.
///
/// Loads the trailing trip window, issue history and vehicle registry from
/// the database, builds the labeled dataset, trains a model, persists the
/// artifact and upserts a fresh prediction for every vehicle with a latest
/// feature row. Per-vehicle persistence is best-effort: an upsert failure is
/// logged and the batch continues.
///
/// # Errors
///
/// Returns an error if data loading fails or fewer labeled rows exist than
/// training requires.
pub async fn run(
    pool: &PgPool,
    epochs: usize,
    learning_rate: f64,
    no_boosted: bool,
    top: usize,
) -> Result<()> {
    info!("Starting training run");

    let lookback_days = i32::try_from(config::CONFIG.trip_lookback_days).unwrap_or(365);
    let trips = TripRepository::list_since(pool, lookback_days).await?;
    let issues = IssueRepository::list_all(pool).await?;
    let vehicles = VehicleRepository::list_all(pool).await?;

    info!(
        trips = trips.len(),
        issues = issues.len(),
        vehicles = vehicles.len(),
        "Loaded fleet history"
    );

    let registry =
        VehicleRegistry::from_entries(vehicles.iter().map(|v| (v.id, v.name.as_str())));

    let trip_records: Vec<TripRecord> = trips
        .into_iter()
        .map(|t| TripRecord {
            vehicle_name: t.vehicle_name,
            trip_date: t.trip_date,
            distance_km: t.distance_km,
            duration_min: t.duration_min,
            avg_speed_kmh: t.avg_speed_kmh,
        })
        .collect();
    let issue_events: Vec<IssueEvent> = issues
        .into_iter()
        .map(|i| IssueEvent {
            vehicle_id: i.vehicle_id,
            reported_at: i.reported_at,
        })
        .collect();

    let dataset = build_dataset(&trip_records, &issue_events, &registry);
    if dataset.unresolved_trips > 0 {
        warn!(
            unresolved = dataset.unresolved_trips,
            "Some trips did not resolve to a registered vehicle and were skipped"
        );
    }
    info!(
        rows = dataset.len(),
        vehicles_with_latest = dataset.latest_by_vehicle.len(),
        "Dataset built"
    );

    let training_config = TrainingConfig {
        epochs,
        learning_rate,
        use_boosted: !no_boosted,
        ..TrainingConfig::default()
    };

    let artifact = match train(&dataset.rows, &training_config) {
        Ok(artifact) => artifact,
        Err(TrainError::InsufficientData { rows, required }) => {
            anyhow::bail!("Not enough labeled data to train: {rows} rows, need at least {required}");
        }
        Err(error) => return Err(error.into()),
    };

    // Persist the artifact; the newest row is authoritative for inference.
    let params = serde_json::to_value(&artifact).context("Failed to serialize model artifact")?;
    let metrics = serde_json::to_value(artifact.metrics)
        .context("Failed to serialize training metrics")?;
    let model = ModelRepository::create(
        pool,
        CreateMaintenanceModel {
            engine: artifact.engine.as_str().to_string(),
            params,
            metrics: Some(metrics.clone()),
            row_count: i32::try_from(artifact.row_count).unwrap_or(i32::MAX),
        },
    )
    .await?;

    // Predict for every vehicle with a latest feature row and upsert.
    let predictions = predict_latest(&artifact, &dataset.latest_by_vehicle);
    let mut persisted = 0usize;
    for (vehicle_id, predicted_km) in &predictions {
        match PredictionRepository::upsert(pool, *vehicle_id, *predicted_km).await {
            Ok(()) => persisted += 1,
            Err(error) => {
                warn!(%vehicle_id, %error, "Failed to persist prediction; continuing");
            }
        }
    }

    info!(
        model_id = %model.id,
        engine = %model.engine,
        predictions = predictions.len(),
        persisted,
        "Training complete"
    );

    let mut ranked = predictions;
    ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    println!("Model {} ({})", model.id, model.engine);
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    println!();
    println!("Most at-risk vehicles (lowest predicted km until maintenance):");
    println!("  {:<38} {:>12}", "Vehicle", "Predicted km");
    for (vehicle_id, predicted_km) in ranked.iter().take(top) {
        println!("  {vehicle_id:<38} {predicted_km:>12.2}");
    }

    Ok(())
}
