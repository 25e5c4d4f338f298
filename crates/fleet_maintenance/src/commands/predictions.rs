//! Predictions command - read-only view of current per-vehicle predictions.

use anyhow::Result;
use database::{ModelRepository, PredictionRepository};
use sqlx::PgPool;
use tracing::info;

/// Runs the predictions command.
///
/// Prints all persisted predictions (most at-risk first) together with the
/// metadata of the model that produced them.
///
/// # Errors
///
/// Returns an error if the database queries fail.
pub async fn run(pool: &PgPool) -> Result<()> {
    let predictions = PredictionRepository::list_all(pool).await?;
    let model = ModelRepository::find_latest(pool).await?;

    info!(predictions = predictions.len(), "Loaded predictions");

    let view = serde_json::json!({
        "predictions": predictions
            .iter()
            .map(|p| serde_json::json!({
                "vehicle_id": p.vehicle_id,
                "predicted_km_until_maintenance": p.predicted_km_until_maintenance,
                "updated_at": p.updated_at,
            }))
            .collect::<Vec<_>>(),
        "model": model.map(|m| serde_json::json!({
            "id": m.id,
            "engine": m.engine,
            "metrics": m.metrics,
            "row_count": m.row_count,
            "created_at": m.created_at,
        })),
    });

    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
