//! Repository functions for database operations.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    CreateMaintenanceModel, MaintenanceModel, ReportedIssue, Trip, Vehicle, VehiclePrediction,
};

/// Repository for trip telemetry operations.
pub struct TripRepository;

impl TripRepository {
    /// Lists trips whose date falls within the trailing `days` window,
    /// oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn list_since(pool: &PgPool, days: i32) -> Result<Vec<Trip>, sqlx::Error> {
        sqlx::query_as::<_, Trip>(
            r"
            SELECT id, vehicle_name, trip_date, distance_km, duration_min, avg_speed_kmh, created_at
            FROM trips
            WHERE trip_date >= NOW() - make_interval(days => $1)
            ORDER BY trip_date
            ",
        )
        .bind(days)
        .fetch_all(pool)
        .await
    }
}

/// Repository for reported-issue operations.
pub struct IssueRepository;

impl IssueRepository {
    /// Lists all reported issues, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<ReportedIssue>, sqlx::Error> {
        sqlx::query_as::<_, ReportedIssue>(
            r"
            SELECT id, vehicle_id, reported_at, description, created_at
            FROM reported_issues
            ORDER BY reported_at
            ",
        )
        .fetch_all(pool)
        .await
    }
}

/// Repository for the vehicle registry.
pub struct VehicleRepository;

impl VehicleRepository {
    /// Lists all registered vehicles.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Vehicle>, sqlx::Error> {
        sqlx::query_as::<_, Vehicle>(
            r"
            SELECT id, name, created_at
            FROM vehicles
            ORDER BY name
            ",
        )
        .fetch_all(pool)
        .await
    }
}

/// Repository for trained-model metadata.
pub struct ModelRepository;

impl ModelRepository {
    /// Creates a new model record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn create(
        pool: &PgPool,
        input: CreateMaintenanceModel,
    ) -> Result<MaintenanceModel, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, MaintenanceModel>(
            r"
            INSERT INTO maintenance_models (id, engine, params, metrics, row_count)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, engine, params, metrics, row_count, created_at
            ",
        )
        .bind(id)
        .bind(input.engine)
        .bind(input.params)
        .bind(input.metrics)
        .bind(input.row_count)
        .fetch_one(pool)
        .await
    }

    /// Gets the most recently trained model, which is authoritative for
    /// inference.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn find_latest(pool: &PgPool) -> Result<Option<MaintenanceModel>, sqlx::Error> {
        sqlx::query_as::<_, MaintenanceModel>(
            r"
            SELECT id, engine, params, metrics, row_count, created_at
            FROM maintenance_models
            ORDER BY created_at DESC
            LIMIT 1
            ",
        )
        .fetch_optional(pool)
        .await
    }
}

/// Repository for per-vehicle predictions.
pub struct PredictionRepository;

impl PredictionRepository {
    /// Upserts the prediction for a vehicle. Later training runs supersede
    /// earlier ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn upsert(
        pool: &PgPool,
        vehicle_id: Uuid,
        predicted_km: f64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            INSERT INTO maintenance_predictions (vehicle_id, predicted_km_until_maintenance, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (vehicle_id) DO UPDATE
            SET predicted_km_until_maintenance = EXCLUDED.predicted_km_until_maintenance,
                updated_at = NOW()
            ",
        )
        .bind(vehicle_id)
        .bind(predicted_km)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Lists all predictions, most at-risk (lowest remaining distance) first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<VehiclePrediction>, sqlx::Error> {
        sqlx::query_as::<_, VehiclePrediction>(
            r"
            SELECT vehicle_id, predicted_km_until_maintenance, updated_at
            FROM maintenance_predictions
            ORDER BY predicted_km_until_maintenance
            ",
        )
        .fetch_all(pool)
        .await
    }
}
