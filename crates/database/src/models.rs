//! Database model types.

use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// A vehicle in the registry. The display name is what telemetry rows carry;
/// the id is the canonical identifier everything else links to.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Vehicle {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A raw trip telemetry row as recorded by the external analytics collaborator.
///
/// The vehicle linkage is by display name only; rows whose name does not
/// resolve against the registry are skipped at dataset build time.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Trip {
    pub id: Uuid,
    pub vehicle_name: Option<String>,
    pub trip_date: DateTime<Utc>,
    pub distance_km: Option<f64>,
    pub duration_min: Option<f64>,
    pub avg_speed_kmh: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// A reported maintenance/safety issue for a vehicle.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReportedIssue {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub reported_at: DateTime<Utc>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Trained model metadata stored in the database.
///
/// `params` holds the full serialized artifact (weights or booster, feature
/// statistics, transform metadata); `engine`, `metrics` and `row_count` are
/// broken out for queryability.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MaintenanceModel {
    pub id: Uuid,
    pub engine: String,
    pub params: serde_json::Value,
    pub metrics: Option<serde_json::Value>,
    pub row_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Per-vehicle remaining-distance prediction, one row per vehicle.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VehiclePrediction {
    pub vehicle_id: Uuid,
    pub predicted_km_until_maintenance: f64,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new model record.
#[derive(Debug, Clone)]
pub struct CreateMaintenanceModel {
    pub engine: String,
    pub params: serde_json::Value,
    pub metrics: Option<serde_json::Value>,
    pub row_count: i32,
}
